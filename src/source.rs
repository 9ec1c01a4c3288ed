//! Where the kernel binary comes from.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum KernelSource {
    /// Read from disk during `initialize`.
    Path(PathBuf),
    /// Already in memory.
    Bytes(Arc<[u8]>),
}

impl KernelSource {
    pub(crate) async fn load(&self) -> Result<Arc<[u8]>> {
        let bytes: Arc<[u8]> = match self {
            Self::Path(path) => tokio::fs::read(path)
                .await
                .map_err(|source| Error::KernelLoad {
                    path: path.clone(),
                    source,
                })?
                .into(),
            Self::Bytes(bytes) => Arc::clone(bytes),
        };
        if bytes.is_empty() {
            return Err(Error::EmptyKernel);
        }
        Ok(bytes)
    }
}

impl From<PathBuf> for KernelSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<Vec<u8>> for KernelSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes.into())
    }
}
