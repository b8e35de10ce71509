use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use log::warn;

use crate::document::GlbDocument;
use crate::scene::Scene;

/// A fully parsed model ready to be installed in the viewer.
#[derive(Debug)]
pub struct LoadedModel {
    pub generation: u64,
    pub document: GlbDocument,
    pub scene: Scene,
}

/// Terminal state of the newest load request.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(Box<LoadedModel>),
    Failed {
        generation: u64,
        label: String,
        error: String,
    },
}

/// Opens and parses a model file in one step.
pub fn load_sync(path: &Path) -> Result<(GlbDocument, Scene)> {
    let document = GlbDocument::open(path)
        .with_context(|| format!("failed to open model {}", path.display()))?;
    let scene = Scene::from_document(&document)?;
    Ok((document, scene))
}

struct Completed {
    generation: u64,
    label: String,
    result: Result<(GlbDocument, Scene)>,
}

/// Loads models on background threads. Every request supersedes the ones
/// before it: a result is only surfaced if its generation is still the
/// newest when it arrives; anything older is discarded. In-flight parses
/// are never cancelled, their results just lose the race.
pub struct ModelLoader {
    sender: Sender<Completed>,
    receiver: Receiver<Completed>,
    newest: u64,
    pending: bool,
    threads: Vec<JoinHandle<()>>,
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelLoader {
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Self {
            sender,
            receiver,
            newest: 0,
            pending: false,
            threads: Vec::new(),
        }
    }

    /// Starts loading `path`, superseding any in-flight request. Returns the
    /// request's generation.
    pub fn request(&mut self, path: PathBuf) -> u64 {
        self.newest += 1;
        self.pending = true;
        let generation = self.newest;
        let label = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let sender = self.sender.clone();
        let handle = thread::spawn(move || {
            let result = load_sync(&path);
            // The receiver half only goes away when the loader is dropped.
            let _ = sender.send(Completed {
                generation,
                label,
                result,
            });
        });
        self.threads.push(handle);
        generation
    }

    /// True while the newest request has not produced an outcome yet.
    pub fn is_loading(&self) -> bool {
        self.pending
    }

    /// Drains finished loads. Returns the outcome of the newest request if
    /// it arrived this frame; superseded results are logged and dropped.
    pub fn poll(&mut self) -> Option<LoadOutcome> {
        let mut outcome = None;
        while let Ok(completed) = self.receiver.try_recv() {
            if completed.generation != self.newest {
                warn!(
                    "discarding superseded load of {} (generation {} < {})",
                    completed.label, completed.generation, self.newest
                );
                continue;
            }
            self.pending = false;
            outcome = Some(match completed.result {
                Ok((document, scene)) => LoadOutcome::Loaded(Box::new(LoadedModel {
                    generation: completed.generation,
                    document,
                    scene,
                })),
                Err(error) => LoadOutcome::Failed {
                    generation: completed.generation,
                    label: completed.label,
                    error: format!("{error:#}"),
                },
            });
        }
        self.reap_finished_threads();
        outcome
    }

    fn reap_finished_threads(&mut self) {
        let mut running = Vec::new();
        for handle in self.threads.drain(..) {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                running.push(handle);
            }
        }
        self.threads = running;
    }
}

impl Drop for ModelLoader {
    fn drop(&mut self) {
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::test_fixtures::build_glb;
    use crate::gltf::test_fixtures::{triangle_bin, triangle_json};
    use std::io::Write;
    use std::time::{Duration, Instant};
    use tempfile::NamedTempFile;

    fn write_triangle_glb() -> NamedTempFile {
        let bin = triangle_bin();
        let bytes = build_glb(&triangle_json("Tri"), Some(&bin));
        let mut tmp = NamedTempFile::new().expect("tmp file");
        tmp.write_all(&bytes).expect("write glb");
        tmp
    }

    fn poll_until_outcome(loader: &mut ModelLoader) -> LoadOutcome {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(outcome) = loader.poll() {
                return outcome;
            }
            assert!(Instant::now() < deadline, "load did not complete in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn loads_a_model_in_the_background() {
        let tmp = write_triangle_glb();
        let mut loader = ModelLoader::new();
        let generation = loader.request(tmp.path().to_path_buf());
        assert!(loader.is_loading());

        match poll_until_outcome(&mut loader) {
            LoadOutcome::Loaded(model) => {
                assert_eq!(model.generation, generation);
                assert_eq!(model.scene.objects.len(), 1);
            }
            LoadOutcome::Failed { error, .. } => panic!("load failed: {error}"),
        }
        assert!(!loader.is_loading());
    }

    #[test]
    fn missing_file_fails_with_context() {
        let mut loader = ModelLoader::new();
        loader.request(PathBuf::from("/definitely/not/here.glb"));
        match poll_until_outcome(&mut loader) {
            LoadOutcome::Failed { error, .. } => assert!(error.contains("failed to open")),
            LoadOutcome::Loaded(_) => panic!("expected a failure"),
        }
    }

    #[test]
    fn newer_request_supersedes_the_older_one() {
        let tmp = write_triangle_glb();
        let mut loader = ModelLoader::new();
        loader.request(PathBuf::from("/definitely/not/here.glb"));
        let newest = loader.request(tmp.path().to_path_buf());

        // Only the newest generation may surface, no matter how the two
        // threads interleave.
        match poll_until_outcome(&mut loader) {
            LoadOutcome::Loaded(model) => assert_eq!(model.generation, newest),
            LoadOutcome::Failed { generation, error, .. } => {
                assert_eq!(generation, newest, "stale failure surfaced: {error}");
                panic!("newest load should have succeeded: {error}");
            }
        }
        // The stale result never shows up afterwards either.
        thread::sleep(Duration::from_millis(20));
        assert!(loader.poll().is_none());
    }
}
