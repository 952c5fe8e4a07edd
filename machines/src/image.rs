//! Memory image loading: the SDRAM download step.
//!
//! An [`ImageSet`] holds raw files read from disk (or given programmatically
//! for tests). An [`ImageLayout`] places files at word offsets in the channel
//! store, optionally checking a CRC32 for each, and copies them in.

use std::collections::HashMap;
use std::path::Path;

use jtframe_core::device::Sdram;
use thiserror::Error;
use tracing::debug;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing image file: {0}")]
    MissingFile(String),

    #[error("image {file}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        file: String,
        expected: usize,
        actual: usize,
    },

    #[error("image {file}: CRC32 expected 0x{expected:08X}, got 0x{actual:08X}")]
    ChecksumMismatch {
        file: String,
        expected: u32,
        actual: u32,
    },

    #[error("image {file}: {bytes} bytes at word 0x{word_offset:X} overrun {capacity} words")]
    OutOfRange {
        file: String,
        bytes: usize,
        word_offset: u32,
        capacity: usize,
    },
}

// ---------------------------------------------------------------------------
// ImageSet
// ---------------------------------------------------------------------------

/// A collection of image files keyed by file name.
#[derive(Default)]
pub struct ImageSet {
    files: HashMap<String, Vec<u8>>,
}

impl ImageSet {
    /// Read every regular file in `path` (non-recursive), keyed by file name.
    pub fn from_directory(path: &Path) -> Result<Self, ImageLoadError> {
        let mut files = HashMap::new();
        for entry in std::fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.is_file() {
                let name = file_path
                    .file_name()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string();
                files.insert(name, std::fs::read(&file_path)?);
            }
        }
        Ok(Self { files })
    }

    /// Single file on disk, keyed by its file name.
    pub fn from_file(path: &Path) -> Result<Self, ImageLoadError> {
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        let data = std::fs::read(path)?;
        Ok(Self::from_entries(vec![(name, data)]))
    }

    pub fn from_entries(entries: Vec<(String, Vec<u8>)>) -> Self {
        Self {
            files: entries.into_iter().collect(),
        }
    }

    pub fn from_slices(entries: &[(&str, &[u8])]) -> Self {
        let files = entries
            .iter()
            .map(|(name, data)| (name.to_string(), data.to_vec()))
            .collect();
        Self { files }
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(|v| v.as_slice())
    }

    pub fn require(&self, name: &str) -> Result<&[u8], ImageLoadError> {
        self.get(name)
            .ok_or_else(|| ImageLoadError::MissingFile(name.to_string()))
    }

    /// Sorted file names.
    pub fn file_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.files.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ImageLayout
// ---------------------------------------------------------------------------

/// One file placed in the channel store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImagePart {
    pub file: String,
    /// Destination, in 16-bit channel words.
    pub word_offset: u32,
    /// Expected size in bytes, if fixed.
    pub size: Option<usize>,
    pub crc32: Option<u32>,
}

impl ImagePart {
    pub fn new(file: impl Into<String>, word_offset: u32) -> Self {
        Self {
            file: file.into(),
            word_offset,
            size: None,
            crc32: None,
        }
    }
}

/// Where each image file goes in the channel store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageLayout {
    pub parts: Vec<ImagePart>,
}

impl ImageLayout {
    /// Every file of `set`, back to back from word 0 in file name order,
    /// each starting on a word boundary.
    pub fn sequential(set: &ImageSet) -> Self {
        let mut word_offset = 0u32;
        let mut parts = Vec::new();
        for name in set.file_names() {
            let len = set.get(name).map_or(0, <[u8]>::len);
            parts.push(ImagePart::new(name, word_offset));
            word_offset += len.div_ceil(2) as u32;
        }
        Self { parts }
    }

    /// Check and copy every part into `sdram`. Returns the bytes copied.
    pub fn download(
        &self,
        set: &ImageSet,
        sdram: &mut Sdram,
        verify_checksums: bool,
    ) -> Result<usize, ImageLoadError> {
        let mut total = 0;
        for part in &self.parts {
            let data = set.require(&part.file)?;

            if let Some(expected) = part.size
                && data.len() != expected
            {
                return Err(ImageLoadError::SizeMismatch {
                    file: part.file.clone(),
                    expected,
                    actual: data.len(),
                });
            }

            if verify_checksums && let Some(expected) = part.crc32 {
                let actual = crc32fast::hash(data);
                if actual != expected {
                    return Err(ImageLoadError::ChecksumMismatch {
                        file: part.file.clone(),
                        expected,
                        actual,
                    });
                }
            }

            let capacity = sdram.size_words();
            if part.word_offset as usize + data.len().div_ceil(2) > capacity {
                return Err(ImageLoadError::OutOfRange {
                    file: part.file.clone(),
                    bytes: data.len(),
                    word_offset: part.word_offset,
                    capacity,
                });
            }

            sdram.load(part.word_offset, data);
            debug!(file = %part.file, word_offset = part.word_offset, bytes = data.len(), "image part loaded");
            total += data.len();
        }
        Ok(total)
    }
}
