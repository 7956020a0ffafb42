use crate::model::ElementKind;
use crate::shape::UnknownValuePolicy;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared stop flag for long runs. Clone it, hand one copy to the run, and
/// call `cancel()` from anywhere to stop consuming input.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// User-facing options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct ETLOptions {
    pub input: PathBuf,                  // .osm or .osm.zst
    pub out_dir: PathBuf,                // CSV relations land here
    pub kinds: Vec<ElementKind>,         // elements shaped by a full run
    pub unknown_policy: UnknownValuePolicy,

    // dry-run sample
    pub sample_every: usize,             // validate every k-th element
    pub sample_limit: usize,             // stop after this many validated elements

    pub progress: bool,                  // show progress bar
    pub progress_label: Option<String>,  // optional label for progress bar
    pub cancel: Option<CancellationToken>,

    // IO tuning
    pub read_buffer_bytes: usize,        // BufReader capacity
    pub write_buffer_bytes: usize,       // BufWriter capacity per relation
}

impl Default for ETLOptions {
    fn default() -> Self {
        Self {
            input: PathBuf::from("map.osm"),
            out_dir: PathBuf::from("."),
            kinds: vec![ElementKind::Node, ElementKind::Way],
            unknown_policy: UnknownValuePolicy::default(),
            sample_every: 10,
            sample_limit: 1_000,
            progress: true,
            progress_label: None,
            cancel: None,
            read_buffer_bytes: 256 * 1024,
            write_buffer_bytes: 64 * 1024,
        }
    }
}

impl ETLOptions {
    pub fn with_input(mut self, path: impl AsRef<Path>) -> Self {
        self.input = path.as_ref().to_path_buf();
        self
    }
    pub fn with_out_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.out_dir = dir.as_ref().to_path_buf();
        self
    }
    /// Relations are never selected here; they have no relational shape.
    pub fn with_kinds(mut self, kinds: &[ElementKind]) -> Self {
        self.kinds = kinds.iter().copied().filter(|k| *k != ElementKind::Relation).collect();
        self
    }
    pub fn with_unknown_policy(mut self, policy: UnknownValuePolicy) -> Self {
        self.unknown_policy = policy;
        self
    }
    pub fn with_sample(mut self, every: usize, limit: usize) -> Self {
        self.sample_every = every.max(1);
        self.sample_limit = limit.max(1);
        self
    }
    pub fn with_progress(mut self, yes: bool) -> Self {
        self.progress = yes;
        self
    }
    pub fn with_progress_label(mut self, label: impl Into<String>) -> Self {
        self.progress_label = Some(label.into());
        self
    }
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
    pub fn with_io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self {
        self.read_buffer_bytes = read_bytes.max(8 * 1024);
        self.write_buffer_bytes = write_bytes.max(8 * 1024);
        self
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(CancellationToken::is_cancelled).unwrap_or(false)
    }
}
