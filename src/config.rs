//! Ledger settings and storage bootstrap
use super::error::LedgerResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_MAX_TEXT_LEN: usize = 1024;
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    path: Option<PathBuf>, // None keeps the database in a temporary directory
    max_text_len: usize,   // per location or note, in bytes
    max_page_size: usize,
    flush_every_ms: Option<u64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_text_len: DEFAULT_MAX_TEXT_LEN,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            flush_every_ms: Some(500),
        }
    }
}

impl LedgerConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }
    pub fn set_max_text_len(mut self, len: usize) -> Self {
        self.max_text_len = len;
        self
    }
    pub fn set_max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = size;
        self
    }
    pub fn set_flush_every_ms(mut self, every: Option<u64>) -> Self {
        self.flush_every_ms = every;
        self
    }
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
    pub fn max_text_len(&self) -> usize {
        self.max_text_len
    }
    pub fn max_page_size(&self) -> usize {
        self.max_page_size
    }
    pub fn flush_every_ms(&self) -> Option<u64> {
        self.flush_every_ms
    }
}

/// Opens the sled database described by `config`.
pub fn open_db(config: &LedgerConfig) -> LedgerResult<Arc<sled::Db>> {
    let sled_config = match config.path() {
        Some(path) => sled::Config::new().path(path),
        None => sled::Config::new().temporary(true),
    }
    .flush_every_ms(config.flush_every_ms());

    Ok(Arc::new(sled_config.open()?))
}
