//! In-memory executable store

use hal::{ImageSource, OpenFile};
use std::collections::HashMap;

/// Named images held in memory
#[derive(Debug, Clone, Default)]
pub struct SimFileSystem {
    files: HashMap<String, Vec<u8>>,
}

impl SimFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an image under `name`, replacing any previous one
    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.files.insert(name.into(), bytes);
    }
}

struct SimOpenFile<'a> {
    bytes: &'a [u8],
}

impl OpenFile for SimOpenFile<'_> {
    fn read_at(&mut self, buf: &mut [u8], offset: usize) -> usize {
        if offset >= self.bytes.len() {
            return 0;
        }
        let available = &self.bytes[offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        n
    }

    fn length(&self) -> usize {
        self.bytes.len()
    }
}

impl ImageSource for SimFileSystem {
    fn open(&self, name: &str) -> Option<Box<dyn OpenFile + '_>> {
        let bytes = self.files.get(name)?;
        Some(Box::new(SimOpenFile {
            bytes: bytes.as_slice(),
        }))
    }
}
