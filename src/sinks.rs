//! The five CSV output relations.
//!
//! File layout:
//!   <dir>/<name>.csv.inprogress   (while writing)
//!   <dir>/<name>.csv              (after `finalize()`)
//!
//! Rows go to the `.inprogress` files; only `finalize()` promotes them, so a
//! failed run never leaves a truncated file under a final name.

use crate::model::{NodeRow, ShapedRecord, TagRow, WayNodeRow, WayRow};
use crate::util::{create_with_backoff, promote_file};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub const NODES_FILE: &str = "nodes.csv";
pub const NODE_TAGS_FILE: &str = "nodes_tags.csv";
pub const WAYS_FILE: &str = "ways.csv";
pub const WAY_NODES_FILE: &str = "ways_nodes.csv";
pub const WAY_TAGS_FILE: &str = "ways_tags.csv";

/// Rows written per relation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub nodes: u64,
    pub node_tags: u64,
    pub ways: u64,
    pub way_nodes: u64,
    pub way_tags: u64,
}

impl RowCounts {
    pub fn total(&self) -> u64 {
        self.nodes + self.node_tags + self.ways + self.way_nodes + self.way_tags
    }
}

struct Sink {
    writer: csv::Writer<BufWriter<File>>,
    tmp: PathBuf,
    dest: PathBuf,
}

impl Sink {
    fn create(dir: &Path, name: &str, header: &[&str], write_buf: usize) -> Result<Self> {
        let dest = dir.join(name);
        let tmp = dir.join(format!("{}.inprogress", name));
        let f = create_with_backoff(&tmp, 16, 50).with_context(|| format!("create {}", tmp.display()))?;
        // Header is written explicitly so empty relations still carry one.
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(BufWriter::with_capacity(write_buf, f));
        writer.write_record(header)?;
        Ok(Self { writer, tmp, dest })
    }

    fn write<T: Serialize>(&mut self, row: &T) -> Result<()> {
        self.writer
            .serialize(row)
            .with_context(|| format!("write {}", self.tmp.display()))
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush().with_context(|| format!("flush {}", self.tmp.display()))
    }
}

/// Writers for nodes, nodes_tags, ways, ways_nodes, ways_tags.
pub struct RelationWriters {
    nodes: Sink,
    node_tags: Sink,
    ways: Sink,
    way_nodes: Sink,
    way_tags: Sink,
    counts: RowCounts,
}

impl RelationWriters {
    pub fn create(dir: &Path, write_buf: usize) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("create dir {}", dir.display()))?;
        let tag_header = ["id", "key", "value", "type"];
        Ok(Self {
            nodes: Sink::create(
                dir,
                NODES_FILE,
                &["id", "lat", "lon", "user", "uid", "version", "changeset", "timestamp"],
                write_buf,
            )?,
            node_tags: Sink::create(dir, NODE_TAGS_FILE, &tag_header, write_buf)?,
            ways: Sink::create(
                dir,
                WAYS_FILE,
                &["id", "user", "uid", "version", "changeset", "timestamp"],
                write_buf,
            )?,
            way_nodes: Sink::create(dir, WAY_NODES_FILE, &["id", "node_id", "position"], write_buf)?,
            way_tags: Sink::create(dir, WAY_TAGS_FILE, &tag_header, write_buf)?,
            counts: RowCounts::default(),
        })
    }

    /// Route every row of `record` to its relation.
    pub fn write_record(&mut self, record: &ShapedRecord) -> Result<()> {
        match record {
            ShapedRecord::Node { node, tags } => {
                self.write_node(node)?;
                self.write_tags(tags, true)?;
            }
            ShapedRecord::Way { way, nodes, tags } => {
                self.write_way(way)?;
                for n in nodes {
                    self.write_way_node(n)?;
                }
                self.write_tags(tags, false)?;
            }
        }
        Ok(())
    }

    fn write_node(&mut self, row: &NodeRow) -> Result<()> {
        self.nodes.write(row)?;
        self.counts.nodes += 1;
        Ok(())
    }

    fn write_way(&mut self, row: &WayRow) -> Result<()> {
        self.ways.write(row)?;
        self.counts.ways += 1;
        Ok(())
    }

    fn write_way_node(&mut self, row: &WayNodeRow) -> Result<()> {
        self.way_nodes.write(row)?;
        self.counts.way_nodes += 1;
        Ok(())
    }

    fn write_tags(&mut self, rows: &[TagRow], node: bool) -> Result<()> {
        let (sink, count) = if node {
            (&mut self.node_tags, &mut self.counts.node_tags)
        } else {
            (&mut self.way_tags, &mut self.counts.way_tags)
        };
        for row in rows {
            sink.write(row)?;
            *count += 1;
        }
        Ok(())
    }

    pub fn counts(&self) -> RowCounts {
        self.counts
    }

    fn sinks_mut(&mut self) -> [&mut Sink; 5] {
        [&mut self.nodes, &mut self.node_tags, &mut self.ways, &mut self.way_nodes, &mut self.way_tags]
    }

    /// Flush everything written so far without promoting. Used on error paths:
    /// the partial output stays under the `.inprogress` names.
    pub fn flush_all(&mut self) -> Result<()> {
        for s in self.sinks_mut() {
            s.flush()?;
        }
        Ok(())
    }

    /// Flush, close, and promote every relation to its final name.
    /// Returns the final paths and the row counts.
    pub fn finalize(mut self) -> Result<(Vec<PathBuf>, RowCounts)> {
        self.flush_all()?;
        let counts = self.counts;
        let mut out = Vec::with_capacity(5);
        for sink in [self.nodes, self.node_tags, self.ways, self.way_nodes, self.way_tags] {
            let Sink { writer, tmp, dest } = sink;
            // Close the handle before renaming.
            drop(writer);
            promote_file(&tmp, &dest)?;
            out.push(dest);
        }
        Ok((out, counts))
    }
}
