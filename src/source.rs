//! Input opening: plain XML or zstd-compressed XML, with an optional counter of
//! bytes read from disk for progress reporting.

use crate::util::open_with_backoff;
use anyhow::{Context, Result};
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use zstd::stream::read::Decoder;

/// A `Read` wrapper that counts on-disk (possibly compressed) bytes read.
struct CountingReader<R: Read> {
    inner: R,
    counter: Arc<AtomicU64>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

pub fn is_zstd(path: &Path) -> bool {
    path.extension().map(|e| e.eq_ignore_ascii_case("zst")).unwrap_or(false)
}

/// Size of the input file on disk (0 if unknown).
pub fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Open `path` as a buffered document stream. `*.zst` files are decoded on the fly.
/// When `counter` is set, it accumulates the number of bytes read from disk.
pub fn open_document(
    path: &Path,
    read_buf_bytes: usize,
    counter: Option<Arc<AtomicU64>>,
) -> Result<Box<dyn BufRead>> {
    let file = open_with_backoff(path, 16, 50).with_context(|| format!("open {}", path.display()))?;
    let cap = read_buf_bytes.max(8 * 1024);
    let raw: Box<dyn Read> = match counter {
        Some(counter) => Box::new(CountingReader { inner: file, counter }),
        None => Box::new(file),
    };
    if is_zstd(path) {
        let mut decoder = Decoder::new(raw).with_context(|| format!("zstd init {}", path.display()))?;
        // Large frames need a wide window.
        decoder.window_log_max(31)?;
        Ok(Box::new(BufReader::with_capacity(cap, decoder)))
    } else {
        Ok(Box::new(BufReader::with_capacity(cap, raw)))
    }
}
