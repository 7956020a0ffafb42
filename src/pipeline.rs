use crate::config::{CancellationToken, ETLOptions};
use crate::error::{EtlError, ValidationError};
use crate::model::{ElementKind, OsmElement};
use crate::normalize::NormalizationRules;
use crate::progress::{make_count_progress, make_progress_bar_labeled};
use crate::sample::write_sample;
use crate::schema::{validate, Schema};
use crate::shape::{ShapeStats, Shaper, UnknownValuePolicy};
use crate::sinks::{RelationWriters, RowCounts};
use crate::source::{file_size, open_document};
use crate::stream::ElementStream;
use crate::util::init_tracing_once;
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Fluent entry point: configure once, then dry-run, run, or sample.
#[derive(Clone)]
pub struct OsmETL {
    pub(crate) opts: ETLOptions,
    rules: Arc<NormalizationRules>,
    schema: Arc<Schema>,
}

/// Outcome of the dry-run validation pass over a bounded sample.
#[derive(Debug, Default)]
pub struct DryRunReport {
    /// Elements shaped and validated.
    pub checked: u64,
    pub failures: Vec<ValidationError>,
    pub stats: ShapeStats,
}

impl DryRunReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Outcome of a full run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub elements: u64,
    pub counts: RowCounts,
    pub stats: ShapeStats,
    /// True when a cancellation token stopped the run early.
    pub cancelled: bool,
    pub outputs: Vec<PathBuf>,
}

impl Default for OsmETL {
    fn default() -> Self {
        Self::new()
    }
}

impl OsmETL {
    pub fn new() -> Self {
        Self {
            opts: ETLOptions::default(),
            rules: Arc::new(NormalizationRules::default()),
            schema: Arc::new(Schema::osm()),
        }
    }

    // -------- Builder methods --------
    pub fn input(mut self, path: impl AsRef<Path>) -> Self { self.opts = self.opts.with_input(path); self }
    pub fn out_dir(mut self, dir: impl AsRef<Path>) -> Self { self.opts = self.opts.with_out_dir(dir); self }
    pub fn kinds(mut self, kinds: &[ElementKind]) -> Self { self.opts = self.opts.with_kinds(kinds); self }
    pub fn unknown_values(mut self, policy: UnknownValuePolicy) -> Self { self.opts = self.opts.with_unknown_policy(policy); self }
    pub fn sample(mut self, every: usize, limit: usize) -> Self { self.opts = self.opts.with_sample(every, limit); self }
    pub fn progress(mut self, yes: bool) -> Self { self.opts = self.opts.with_progress(yes); self }
    pub fn progress_label(mut self, label: impl Into<String>) -> Self { self.opts = self.opts.with_progress_label(label); self }
    pub fn cancellation(mut self, token: CancellationToken) -> Self { self.opts = self.opts.with_cancellation(token); self }
    pub fn io_buffers(mut self, read_bytes: usize, write_bytes: usize) -> Self { self.opts = self.opts.with_io_buffers(read_bytes, write_bytes); self }
    pub fn rules(mut self, rules: NormalizationRules) -> Self { self.rules = Arc::new(rules); self }
    pub fn schema(mut self, schema: Schema) -> Self { self.schema = Arc::new(schema); self }

    pub fn options(&self) -> &ETLOptions {
        &self.opts
    }

    /// Lazy, forward-only stream of the configured element kinds.
    pub fn elements(&self) -> Result<ElementStream<Box<dyn BufRead>>> {
        let input = open_document(&self.opts.input, self.opts.read_buffer_bytes, None)?;
        Ok(ElementStream::new(input, &self.opts.kinds))
    }

    /// Dry run: shape every k-th element (up to the sample limit) and validate
    /// it against the schema. Nothing is written. Every failing record is
    /// reported; missing required attributes abort the pass.
    pub fn validate_sample(&self) -> Result<DryRunReport> {
        init_tracing_once();
        let opts = &self.opts;
        let shaper = Shaper::new(&self.rules, opts.unknown_policy);
        let pb = opts
            .progress
            .then(|| make_count_progress(opts.sample_limit as u64, "Validating sample"));

        let mut report = DryRunReport::default();
        for (i, item) in self.elements()?.enumerate() {
            if report.checked as usize >= opts.sample_limit || opts.is_cancelled() {
                break;
            }
            let raw = item.with_context(|| format!("reading {}", opts.input.display()))?;
            if i % opts.sample_every != 0 {
                continue;
            }
            let element = OsmElement::try_from(&raw)?;
            let shaped = shaper
                .shape(&element, &mut report.stats)
                .with_context(|| format!("shaping {} {}", element.kind(), element.id()))?;
            if let Err(e) = validate(&shaped, &self.schema) {
                tracing::warn!("{}", e);
                report.failures.push(e);
            }
            report.checked += 1;
            if let Some(pb) = &pb { pb.inc(1); }
        }

        if let Some(pb) = pb { pb.finish_with_message("done"); }
        tracing::info!(
            checked = report.checked,
            failures = report.failures.len(),
            "dry-run validation finished"
        );
        Ok(report)
    }

    /// Full run: stream the whole document, shape each element, and write the
    /// five CSV relations under `out_dir`. Per-record validation is skipped.
    ///
    /// On error the partial output is flushed and left under `*.inprogress`
    /// names; the error names the offending element.
    pub fn process_map(&self) -> Result<RunSummary> {
        init_tracing_once();
        let opts = &self.opts;
        tracing::info!(input = %opts.input.display(), out = %opts.out_dir.display(), "starting full run");

        let counter = Arc::new(AtomicU64::new(0));
        let input = open_document(&opts.input, opts.read_buffer_bytes, Some(counter.clone()))?;
        let pb = opts
            .progress
            .then(|| make_progress_bar_labeled(file_size(&opts.input), opts.progress_label.as_deref()));

        let mut writers = RelationWriters::create(&opts.out_dir, opts.write_buffer_bytes)?;
        let mut summary = RunSummary::default();

        let driven = self.drive(ElementStream::new(input, &opts.kinds), &mut writers, &mut summary, &counter, pb.as_ref());
        if let Err(e) = driven {
            if let Err(flush_err) = writers.flush_all() {
                tracing::warn!(error = %flush_err, "flushing partial output failed");
            }
            if let Some(pb) = pb { pb.abandon_with_message("failed"); }
            tracing::error!(error = %e, "run aborted; partial output left as *.inprogress");
            return Err(e);
        }

        let (outputs, counts) = writers.finalize()?;
        summary.outputs = outputs;
        summary.counts = counts;
        if let Some(pb) = pb { pb.finish_with_message("done"); }

        let c = &summary.counts;
        tracing::info!(
            nodes = c.nodes,
            nodes_tags = c.node_tags,
            ways = c.ways,
            ways_nodes = c.way_nodes,
            ways_tags = c.way_tags,
            malformed_keys = summary.stats.malformed_keys,
            unknown_values = summary.stats.unknown_values,
            cancelled = summary.cancelled,
            "run finished"
        );
        Ok(summary)
    }

    /// Dry run on the sample, then the full run if the sample is clean.
    /// A dirty sample fails with [`EtlError::SchemaValidation`] listing every
    /// failing record.
    pub fn run(&self) -> Result<RunSummary> {
        let report = self.validate_sample()?;
        if !report.is_clean() {
            return Err(EtlError::SchemaValidation { checked: report.checked, failures: report.failures }.into());
        }
        self.process_map()
    }

    /// Write every k-th element of interest (nodes, ways, relations) to a
    /// standalone `<osm>` document for manual inspection.
    pub fn write_sample(&self, output: &Path) -> Result<u64> {
        init_tracing_once();
        write_sample(&self.opts.input, output, self.opts.sample_every, self.opts.read_buffer_bytes)
    }

    fn drive<R: BufRead>(
        &self,
        stream: ElementStream<R>,
        writers: &mut RelationWriters,
        summary: &mut RunSummary,
        counter: &AtomicU64,
        pb: Option<&ProgressBar>,
    ) -> Result<()> {
        let shaper = Shaper::new(&self.rules, self.opts.unknown_policy);
        let mut last: Option<(ElementKind, i64)> = None;
        let mut last_bytes = 0u64;

        for item in stream {
            if self.opts.is_cancelled() {
                tracing::warn!(elements = summary.elements, "run cancelled; closing outputs");
                summary.cancelled = true;
                break;
            }
            let raw = item.with_context(|| match last {
                Some((kind, id)) => format!("reading {} after {} {}", self.opts.input.display(), kind, id),
                None => format!("reading {}", self.opts.input.display()),
            })?;
            let element = OsmElement::try_from(&raw)?;
            let shaped = shaper
                .shape(&element, &mut summary.stats)
                .with_context(|| format!("shaping {} {}", element.kind(), element.id()))?;
            writers
                .write_record(&shaped)
                .with_context(|| format!("writing {} {}", element.kind(), element.id()))?;
            summary.elements += 1;
            last = Some((element.kind(), element.id()));

            if let Some(pb) = pb {
                let cur = counter.load(Ordering::Relaxed);
                if cur > last_bytes {
                    pb.inc(cur - last_bytes);
                    last_bytes = cur;
                }
            }
        }
        Ok(())
    }
}
