//! Chunked archive streaming with byte-level progress

use std::path::Path;
use std::sync::Arc;

use futures_util::stream::{self, Stream};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use srvdeck_core::prelude::*;

/// Default read size for archive chunks (1 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Bytes handed to the transport so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub transferred_bytes: u64,
    pub total_bytes: u64,
}

impl TransferProgress {
    pub fn new(transferred_bytes: u64, total_bytes: u64) -> Self {
        Self {
            transferred_bytes,
            total_bytes,
        }
    }

    /// Whole-number percentage, clamped to 0..=100
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        let pct = self.transferred_bytes.saturating_mul(100) / self.total_bytes;
        pct.min(100) as u8
    }
}

/// Observer invoked once per chunk read from disk
pub type ProgressFn = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// A progress observer that discards every update
pub fn ignore_progress() -> ProgressFn {
    Arc::new(|_| {})
}

/// Open an archive for streaming, returning the handle and its length.
pub async fn open_archive(path: &Path) -> Result<(File, u64)> {
    let file = File::open(path)
        .await
        .with_context(|| format!("Failed to open archive {}", path.display()))?;
    let len = file.metadata().await?.len();
    Ok((file, len))
}

struct ChunkReader {
    file: File,
    sent: u64,
    total: u64,
    chunk_size: usize,
    progress: ProgressFn,
}

/// Stream `file` in `chunk_size` pieces, reporting progress as each chunk
/// is produced. The stream ends after the first read error.
pub fn chunk_stream(
    file: File,
    total: u64,
    chunk_size: usize,
    progress: ProgressFn,
) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + 'static {
    let reader = ChunkReader {
        file,
        sent: 0,
        total,
        chunk_size: chunk_size.max(1),
        progress,
    };

    stream::unfold(Some(reader), |state| async move {
        let mut reader = state?;
        let mut buf = vec![0u8; reader.chunk_size];
        match reader.file.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                reader.sent += n as u64;
                (reader.progress)(TransferProgress::new(reader.sent, reader.total));
                Some((Ok(buf), Some(reader)))
            }
            Err(e) => Some((Err(e), None)),
        }
    })
}
