//! Streaming element reader: a forward-only iterator over the top-level
//! elements of interest in an OSM XML document.
//!
//! Only the element currently being assembled is held in memory. Its direct
//! children are collected as attribute lists; deeper content is skipped.
//! Ownership of each element passes to the caller on yield, so peak memory is
//! bounded by the largest single element, not by the document.

use crate::error::EtlError;
use crate::model::{ElementKind, RawChild, RawElement};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{self, BufRead};

pub struct ElementStream<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    kinds: Vec<ElementKind>,
    current: Option<RawElement>,
    // nesting depth below `current`
    depth: usize,
    done: bool,
}

impl<R: BufRead> ElementStream<R> {
    pub fn new(input: R, kinds: &[ElementKind]) -> Self {
        let mut reader = Reader::from_reader(input);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::with_capacity(16 * 1024),
            kinds: kinds.to_vec(),
            current: None,
            depth: 0,
            done: false,
        }
    }

    fn advance(&mut self) -> Result<Option<RawElement>, EtlError> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(e) => {
                    if let Some(cur) = self.current.as_mut() {
                        if self.depth == 0 {
                            cur.children.push(child_of(&e)?);
                        }
                        self.depth += 1;
                    } else if let Some(kind) = wanted(&self.kinds, &e) {
                        self.current = Some(RawElement { kind, attrs: attrs_of(&e)?, children: Vec::new() });
                        self.depth = 0;
                    }
                }
                Event::Empty(e) => {
                    if let Some(cur) = self.current.as_mut() {
                        if self.depth == 0 {
                            cur.children.push(child_of(&e)?);
                        }
                    } else if let Some(kind) = wanted(&self.kinds, &e) {
                        return Ok(Some(RawElement { kind, attrs: attrs_of(&e)?, children: Vec::new() }));
                    }
                }
                Event::End(_) => {
                    if self.current.is_some() {
                        if self.depth == 0 {
                            return Ok(self.current.take());
                        }
                        self.depth -= 1;
                    }
                }
                Event::Eof => {
                    if let Some(cur) = self.current.take() {
                        let msg = format!("document ended inside <{}>", cur.kind);
                        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, msg).into());
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl<R: BufRead> Iterator for ElementStream<R> {
    type Item = Result<RawElement, EtlError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.advance() {
            Ok(Some(el)) => Some(Ok(el)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

fn wanted(kinds: &[ElementKind], e: &BytesStart<'_>) -> Option<ElementKind> {
    ElementKind::from_name(e.name().as_ref()).filter(|k| kinds.contains(k))
}

fn attrs_of(e: &BytesStart<'_>) -> Result<Vec<(String, String)>, EtlError> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        out.push((key, value));
    }
    Ok(out)
}

fn child_of(e: &BytesStart<'_>) -> Result<RawChild, EtlError> {
    Ok(RawChild {
        name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
        attrs: attrs_of(e)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6">
  <bounds minlat="33.9" minlon="-81.2" maxlat="34.1" maxlon="-80.9"/>
  <node id="1" lat="34.0" lon="-81.0" user="a" uid="1" version="1" changeset="1" timestamp="2010-01-01T00:00:00Z"/>
  <node id="2" lat="34.1" lon="-81.1" user="a" uid="1" version="1" changeset="1" timestamp="2010-01-01T00:00:00Z">
    <tag k="amenity" v="cafe &amp; bar"/>
  </node>
  <way id="3" user="b" uid="2" version="1" changeset="2" timestamp="2010-01-01T00:00:00Z">
    <nd ref="1"/>
    <nd ref="2"/>
    <tag k="highway" v="residential"/>
  </way>
  <relation id="4" user="b" uid="2" version="1" changeset="2" timestamp="2010-01-01T00:00:00Z">
    <member type="way" ref="3" role="outer"/>
  </relation>
</osm>"#;

    #[test]
    fn yields_only_requested_kinds_in_order() {
        let stream = ElementStream::new(DOC.as_bytes(), &[ElementKind::Node, ElementKind::Way]);
        let got: Vec<RawElement> = stream.collect::<Result<_, _>>().unwrap();
        let ids: Vec<(ElementKind, &str)> = got.iter().map(|e| (e.kind, e.attr("id").unwrap())).collect();
        assert_eq!(ids, vec![(ElementKind::Node, "1"), (ElementKind::Node, "2"), (ElementKind::Way, "3")]);

        assert!(got[0].children.is_empty());
        assert_eq!(got[1].children[0].attr("v"), Some("cafe & bar"));
        let refs: Vec<&str> = got[2].children_named("nd").filter_map(|c| c.attr("ref")).collect();
        assert_eq!(refs, vec!["1", "2"]);
    }

    #[test]
    fn relation_children_are_collected_when_selected() {
        let stream = ElementStream::new(DOC.as_bytes(), &[ElementKind::Relation]);
        let got: Vec<RawElement> = stream.collect::<Result<_, _>>().unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].children[0].name, "member");
    }

    #[test]
    fn truncated_document_is_an_error() {
        let doc = r#"<osm><way id="1" user="a" uid="1" version="1" changeset="1" timestamp="t"><nd ref="1"/>"#;
        let mut stream = ElementStream::new(doc.as_bytes(), &[ElementKind::Way]);
        assert!(matches!(stream.next(), Some(Err(_))));
        assert!(stream.next().is_none());
    }
}
