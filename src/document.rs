use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

/// Default file name offered when the document is exported.
pub const EXPORT_FILE_NAME: &str = "model.glb";

const GLB_MAGIC: &[u8; 4] = b"glTF";
const CHUNK_JSON: &[u8; 4] = b"JSON";
const CHUNK_BIN: &[u8; 4] = b"BIN\0";

/// In-memory representation of a binary glTF (`.glb`) file.
///
/// The document keeps the original bytes untouched; material edits made in
/// the viewer never flow back into them. Exporting writes the exact bytes
/// that were read.
#[derive(Debug, Clone)]
pub struct GlbDocument {
    label: String,
    source: Option<PathBuf>,
    data: Arc<[u8]>,
    version: u32,
    json: String,
    binary: Option<ChunkRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChunkRange {
    offset: usize,
    size: usize,
}

impl GlbDocument {
    /// Opens a `.glb` file from disk and eagerly validates the container.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let mut file = File::open(&path_buf)
            .with_context(|| format!("unable to open {}", path_buf.display()))?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .context("unable to read model file into memory")?;

        let label = path_buf
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| EXPORT_FILE_NAME.to_string());
        let mut document = Self::from_bytes(label, data)?;
        document.source = Some(path_buf);
        Ok(document)
    }

    /// Creates a document from bytes already resident in memory.
    pub fn from_bytes(label: impl Into<String>, data: Vec<u8>) -> Result<Self> {
        let storage: Arc<[u8]> = Arc::from(data.into_boxed_slice());
        let (version, json, binary) = parse_container(&storage)?;
        Ok(Self {
            label: label.into(),
            source: None,
            data: storage,
            version,
            json,
            binary,
        })
    }

    /// Returns the glTF container version stored in the header.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the label the document was opened under (usually the file name).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the path the document was opened from, when it came from disk.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Returns the raw JSON chunk describing the scene.
    pub fn json(&self) -> &str {
        &self.json
    }

    /// Returns the binary payload chunk, when the container carries one.
    pub fn binary(&self) -> Option<&[u8]> {
        self.binary
            .map(|range| &self.data[range.offset..range.offset + range.size])
    }

    /// Returns the complete, unmodified file bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the size of the original file in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Writes the original bytes, unchanged, to the given destination.
    pub fn export_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut file = File::create(path)
            .with_context(|| format!("unable to create {}", path.display()))?;
        file.write_all(&self.data)
            .with_context(|| format!("unable to write {}", path.display()))?;
        Ok(())
    }
}

fn parse_container(data: &[u8]) -> Result<(u32, String, Option<ChunkRange>)> {
    if data.len() < 12 {
        return Err(anyhow!(
            "file too small to contain a GLB header (len={})",
            data.len()
        ));
    }

    let magic = &data[..4];
    if magic != GLB_MAGIC {
        return Err(anyhow!(
            "invalid GLB magic: expected glTF, found {:?}",
            magic
        ));
    }

    let mut cursor = 4;
    let version = read_u32(data, &mut cursor)?;
    if version != 2 {
        return Err(anyhow!("unsupported GLB container version {version}"));
    }
    let declared_length = read_u32(data, &mut cursor)? as usize;
    if declared_length > data.len() {
        return Err(anyhow!(
            "GLB header declares {declared_length} bytes but the file holds {}",
            data.len()
        ));
    }
    // Trailing bytes past the declared length are ignored, not rejected.
    let end = declared_length.max(12);

    let mut json = None;
    let mut binary = None;
    while cursor + 8 <= end {
        let chunk_length = read_u32(data, &mut cursor)? as usize;
        let chunk_type: [u8; 4] = data[cursor..cursor + 4]
            .try_into()
            .expect("slice length verified above");
        cursor += 4;

        if cursor
            .checked_add(chunk_length)
            .filter(|chunk_end| *chunk_end <= end)
            .is_none()
        {
            return Err(anyhow!(
                "chunk {:?} extends past the container end (offset={cursor}, size={chunk_length})",
                chunk_type
            ));
        }

        match &chunk_type {
            CHUNK_JSON if json.is_none() => {
                let bytes = &data[cursor..cursor + chunk_length];
                let text = std::str::from_utf8(bytes)
                    .map_err(|err| anyhow!("JSON chunk is not valid UTF-8: {err}"))?;
                json = Some(text.trim_end_matches(['\0', ' ']).to_string());
            }
            CHUNK_BIN if binary.is_none() => {
                binary = Some(ChunkRange {
                    offset: cursor,
                    size: chunk_length,
                });
            }
            // Unknown chunk types are skipped per the glTF container rules.
            _ => {}
        }

        // Chunks are padded to 4-byte boundaries.
        cursor += chunk_length;
        cursor += (4 - chunk_length % 4) % 4;
    }

    let json = json.ok_or_else(|| anyhow!("GLB container has no JSON chunk"))?;
    Ok((version, json, binary))
}

fn read_u32(data: &[u8], cursor: &mut usize) -> Result<u32> {
    if *cursor + 4 > data.len() {
        return Err(anyhow!(
            "unexpected end of GLB container while reading 32-bit value"
        ));
    }
    let value = u32::from_le_bytes(
        data[*cursor..*cursor + 4]
            .try_into()
            .expect("slice length verified"),
    );
    *cursor += 4;
    Ok(value)
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    use super::{CHUNK_BIN, CHUNK_JSON, GLB_MAGIC};

    /// Assembles a well-formed GLB container around the given chunks.
    pub fn build_glb(json: &str, binary: Option<&[u8]>) -> Vec<u8> {
        let mut json_bytes = json.as_bytes().to_vec();
        while json_bytes.len() % 4 != 0 {
            json_bytes.push(b' ');
        }

        let mut buffer = Vec::new();
        buffer.extend_from_slice(GLB_MAGIC);
        buffer.extend_from_slice(&2u32.to_le_bytes());
        buffer.extend_from_slice(&0u32.to_le_bytes()); // placeholder for length

        buffer.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
        buffer.extend_from_slice(CHUNK_JSON);
        buffer.extend_from_slice(&json_bytes);

        if let Some(binary) = binary {
            let mut bin_bytes = binary.to_vec();
            while bin_bytes.len() % 4 != 0 {
                bin_bytes.push(0);
            }
            buffer.extend_from_slice(&(bin_bytes.len() as u32).to_le_bytes());
            buffer.extend_from_slice(CHUNK_BIN);
            buffer.extend_from_slice(&bin_bytes);
        }

        let total = buffer.len() as u32;
        buffer[8..12].copy_from_slice(&total.to_le_bytes());
        buffer
    }
}
