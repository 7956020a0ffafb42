//! Sample extraction: copy every k-th top-level element into a small,
//! standalone OSM document.

use crate::model::{ElementKind, RawElement};
use crate::source::open_document;
use crate::stream::ElementStream;
use crate::util::create_with_backoff;
use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::io::{BufWriter, Write};
use std::path::Path;

const ALL_KINDS: [ElementKind; 3] = [ElementKind::Node, ElementKind::Way, ElementKind::Relation];

/// Write every `every`-th node/way/relation of `input` to `output`.
/// Returns the number of elements written.
pub fn write_sample(input: &Path, output: &Path, every: usize, read_buf_bytes: usize) -> Result<u64> {
    let every = every.max(1);
    let doc = open_document(input, read_buf_bytes, None)?;
    let file = create_with_backoff(output, 16, 50).with_context(|| format!("create {}", output.display()))?;
    let mut xml = Writer::new_with_indent(BufWriter::new(file), b' ', 2);

    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    xml.write_event(Event::Start(BytesStart::new("osm")))?;

    let mut written = 0u64;
    for (i, item) in ElementStream::new(doc, &ALL_KINDS).enumerate() {
        let el = item.with_context(|| format!("reading {}", input.display()))?;
        if i % every == 0 {
            write_element(&mut xml, &el)?;
            written += 1;
        }
    }

    xml.write_event(Event::End(BytesEnd::new("osm")))?;
    xml.into_inner().flush().with_context(|| format!("flush {}", output.display()))?;
    tracing::info!(written, every, output = %output.display(), "sample written");
    Ok(written)
}

/// Serialize one element (and its direct children) back to XML.
pub fn write_element<W: Write>(xml: &mut Writer<W>, el: &RawElement) -> Result<()> {
    let mut start = BytesStart::new(el.kind.as_str());
    for (k, v) in &el.attrs {
        start.push_attribute((k.as_str(), v.as_str()));
    }
    if el.children.is_empty() {
        xml.write_event(Event::Empty(start))?;
        return Ok(());
    }
    xml.write_event(Event::Start(start))?;
    for child in &el.children {
        let mut c = BytesStart::new(child.name.as_str());
        for (k, v) in &child.attrs {
            c.push_attribute((k.as_str(), v.as_str()));
        }
        xml.write_event(Event::Empty(c))?;
    }
    xml.write_event(Event::End(BytesEnd::new(el.kind.as_str())))?;
    Ok(())
}
