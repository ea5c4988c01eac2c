//! Token stream over CIB XML with an explicit element depth counter.
//!
//! Every decoder receives the start tag of its element and must leave the
//! stream positioned after the matching end tag. `children` and `skip` find
//! that end tag by depth, never by name: rules nest rules, so the first
//! `</rule>` after a `<rule>` is not necessarily its own.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{CibError, CibResult};

/// An owned start tag with its attributes.
#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub name: String,
    attrs: Vec<(String, String)>,
    /// `<name/>`: no children and no end tag.
    pub empty: bool,
    /// Number of open elements, this one included.
    pub depth: usize,
    /// Byte offsets of the start tag in the source.
    offset: usize,
    tag_end: usize,
}

impl Element {
    fn from_start(start: &BytesStart<'_>, empty: bool, depth: usize, span: (usize, usize)) -> CibResult<Self> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| CibError::Decode(format!("in <{name}>: {e}")))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| CibError::Decode(format!("in <{name} {key}>: {e}")))?
                .into_owned();
            attrs.push((key, value));
        }
        Ok(Self {
            name,
            attrs,
            empty,
            depth,
            offset: span.0,
            tag_end: span.1,
        })
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Remove and return an attribute, marking it as understood.
    pub fn take(&mut self, name: &str) -> Option<String> {
        let index = self.attrs.iter().position(|(key, _)| key == name)?;
        Some(self.attrs.remove(index).1)
    }

    /// Drop attributes that are known but not modeled.
    pub fn ignore(&mut self, names: &[&str]) {
        self.attrs.retain(|(key, _)| !names.contains(&key.as_str()));
    }

    /// Take every remaining attribute, in document order.
    pub fn take_all(&mut self) -> Vec<(String, String)> {
        std::mem::take(&mut self.attrs)
    }

    /// Attributes not taken by the decoder, namespace declarations excluded.
    pub fn leftover(&self) -> impl Iterator<Item = &str> {
        self.attrs
            .iter()
            .map(|(key, _)| key.as_str())
            .filter(|key| *key != "xmlns" && !key.starts_with("xmlns:"))
    }
}

pub(crate) enum Token {
    Start(Element),
    End,
    Eof,
}

pub(crate) struct XmlStream<'a> {
    reader: Reader<&'a [u8]>,
    source: &'a str,
    depth: usize,
}

impl<'a> XmlStream<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            reader: Reader::from_str(source),
            source,
            depth: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn next(&mut self) -> CibResult<Token> {
        loop {
            let event = self.reader.read_event().map_err(|e| self.error(e))?;
            match event {
                Event::Start(start) => {
                    self.depth += 1;
                    let span = self.tag_span();
                    return Ok(Token::Start(Element::from_start(&start, false, self.depth, span)?));
                }
                Event::Empty(start) => {
                    let span = self.tag_span();
                    return Ok(Token::Start(Element::from_start(&start, true, self.depth + 1, span)?));
                }
                Event::End(_) => {
                    self.depth = self.depth.checked_sub(1).ok_or_else(|| {
                        CibError::Decode("end tag without matching start tag".to_string())
                    })?;
                    return Ok(Token::End);
                }
                Event::Eof => return Ok(Token::Eof),
                _ => continue,
            }
        }
    }

    /// The document element.
    pub fn root(&mut self) -> CibResult<Element> {
        loop {
            match self.next()? {
                Token::Start(element) => return Ok(element),
                Token::End => continue,
                Token::Eof => return Err(CibError::Decode("document has no root element".into())),
            }
        }
    }

    /// Hand each child start tag of `parent` to `visit`, then consume the end
    /// tag of `parent`. A child the visitor leaves open is skipped.
    pub fn children<F>(&mut self, parent: &Element, mut visit: F) -> CibResult<()>
    where
        F: FnMut(&mut Self, Element) -> CibResult<()>,
    {
        if parent.empty {
            return Ok(());
        }
        loop {
            match self.next()? {
                Token::Start(child) => {
                    let child_depth = child.depth;
                    let child_empty = child.empty;
                    visit(self, child)?;
                    if !child_empty && self.depth >= child_depth {
                        self.skip_to(child_depth)?;
                    }
                }
                Token::End => {
                    if self.depth < parent.depth {
                        return Ok(());
                    }
                }
                Token::Eof => {
                    return Err(CibError::Decode(format!(
                        "unexpected end of document inside <{}>",
                        parent.name
                    )));
                }
            }
        }
    }

    /// Consume `element` and everything below it.
    pub fn skip(&mut self, element: &Element) -> CibResult<()> {
        if element.empty {
            return Ok(());
        }
        self.skip_to(element.depth)
    }

    fn skip_to(&mut self, depth: usize) -> CibResult<()> {
        while self.depth >= depth {
            if let Token::Eof = self.next()? {
                return Err(CibError::Decode(
                    "unexpected end of document while skipping".into(),
                ));
            }
        }
        Ok(())
    }

    /// Consume `element` and return its full source text, tags included.
    pub fn capture(&mut self, element: &Element) -> CibResult<&'a str> {
        self.skip(element)?;
        let end = self.position();
        self.source
            .get(element.offset..end)
            .ok_or_else(|| CibError::Decode("captured span out of bounds".into()))
    }

    /// The start tag of `element` rewritten as an empty element.
    pub fn self_closed(&self, element: &Element) -> String {
        let tag = self.source.get(element.offset..element.tag_end).unwrap_or_default();
        match tag.strip_suffix("/>").or_else(|| tag.strip_suffix('>')) {
            Some(open) => format!("{}/>", open.trim_end()),
            None => tag.to_string(),
        }
    }

    /// Offsets of the tag just read. `<` cannot appear inside attribute
    /// values, so the last one before the tag end opens the tag.
    fn tag_span(&self) -> (usize, usize) {
        let end = self.position();
        let start = self
            .source
            .get(..end)
            .and_then(|before| before.rfind('<'))
            .unwrap_or(0);
        (start, end)
    }

    /// Byte offset just past the last event read.
    pub fn position(&self) -> usize {
        self.reader.buffer_position() as usize
    }

    fn error(&self, err: quick_xml::Error) -> CibError {
        CibError::Decode(format!("at byte {}: {err}", self.position()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names_at_depth_two(xml: &str) -> Vec<String> {
        let mut stream = XmlStream::new(xml);
        let root = stream.root().unwrap();
        let mut names = Vec::new();
        stream
            .children(&root, |stream, child| {
                names.push(child.name.clone());
                stream.skip(&child)
            })
            .unwrap();
        names
    }

    #[test]
    fn test_children_stop_at_own_end_tag() {
        let xml = r#"<rule id="a"><rule id="b"><rule id="c"/></rule><expression id="e"/></rule>"#;
        assert_eq!(names_at_depth_two(xml), vec!["rule", "expression"]);
    }

    #[test]
    fn test_unconsumed_child_is_skipped() {
        let xml = "<a><b><c/><c><d/></c></b><e/></a>";
        let mut stream = XmlStream::new(xml);
        let root = stream.root().unwrap();
        let mut names = Vec::new();
        stream
            .children(&root, |_, child| {
                names.push(child.name);
                Ok(())
            })
            .unwrap();
        assert_eq!(names, vec!["b", "e"]);
        assert_eq!(stream.depth(), 0);
    }

    #[test]
    fn test_attributes_take_and_leftover() {
        let mut stream =
            XmlStream::new(r#"<nvpair xmlns="x" id="n1" name="a" value="&lt;b&gt;" future="1"/>"#);
        let mut element = stream.root().unwrap();
        assert!(element.empty);
        assert_eq!(element.take("value").as_deref(), Some("<b>"));
        assert_eq!(element.take("id").as_deref(), Some("n1"));
        element.ignore(&["name"]);
        assert_eq!(element.leftover().collect::<Vec<_>>(), vec!["future"]);
    }

    #[test]
    fn test_truncated_document_is_an_error() {
        let mut stream = XmlStream::new("<cib><configuration><nodes>");
        let root = stream.root().unwrap();
        let err = stream.skip(&root).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_mismatched_end_tag_is_an_error() {
        let mut stream = XmlStream::new("<cib><status></cib>");
        let root = stream.root().unwrap();
        assert!(stream.skip(&root).is_err());
    }

    #[test]
    fn test_capture_returns_source_text() {
        let xml = r#"<envelope>
            <!-- a < b -->
            <diff format="2"><version/></diff>
        </envelope>"#;
        let mut stream = XmlStream::new(xml);
        let root = stream.root().unwrap();
        let mut captured = String::new();
        stream
            .children(&root, |stream, child| {
                captured = stream.capture(&child)?.to_string();
                Ok(())
            })
            .unwrap();
        assert_eq!(captured, r#"<diff format="2"><version/></diff>"#);
    }

    #[test]
    fn test_self_closed_tag() {
        let xml = r#"<cib epoch="3" admin_epoch="0"><configuration/></cib>"#;
        let mut stream = XmlStream::new(xml);
        let root = stream.root().unwrap();
        assert_eq!(stream.self_closed(&root), r#"<cib epoch="3" admin_epoch="0"/>"#);
        assert_eq!(root.attr("epoch"), Some("3"));
    }
}
