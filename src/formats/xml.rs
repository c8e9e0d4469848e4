//! XML decoder for the `ql:XPath` reference formulation.
//!
//! The supported expression language is a child-axis path subset of
//! XPath: the iterator selects elements with an absolute path like
//! `/people/person`; references are relative paths into the iterated
//! element, with a final `@name` segment addressing an attribute and `.`
//! addressing the element's own text.

use std::io::{BufReader, Read};
use std::sync::Arc;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{Result, RmlError};
use crate::record::SourceRecord;

use super::{DecoderFactory, RecordDecoder, Sequencer, SharedRecord};

/// Factory for [`XmlDecoder`].
#[derive(Debug, Clone, Copy)]
pub struct XmlDecoderFactory;

impl DecoderFactory for XmlDecoderFactory {
    fn create(
        &self,
        input: Box<dyn Read + Send>,
        iterator: Option<&str>,
        sequencer: Arc<Sequencer>,
    ) -> Result<Box<dyn RecordDecoder>> {
        let iterator = iterator.ok_or_else(|| {
            RmlError::Configuration(
                "XML logical sources require an rml:iterator expression".to_string(),
            )
        })?;
        Ok(Box::new(XmlDecoder::new(input, iterator, sequencer)?))
    }
}

/// A parsed XML element subtree.
#[derive(Debug, Clone, Default)]
pub struct XmlElement {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<XmlElement>,
    text: String,
}

impl XmlElement {
    /// The attribute value, if present.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// The element's own text content, trimmed.
    #[must_use]
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Direct children with the given element name.
    pub fn children_named<'e>(&'e self, name: &'e str) -> impl Iterator<Item = &'e XmlElement> {
        self.children.iter().filter(move |child| child.name == name)
    }
}

/// Decoder iterating the elements selected by a path expression.
///
/// The whole document is parsed up front; XML sources are not streamed.
#[derive(Debug)]
pub struct XmlDecoder {
    elements: std::vec::IntoIter<XmlElement>,
    sequencer: Arc<Sequencer>,
}

impl XmlDecoder {
    /// Parses the document and evaluates the iterator expression.
    ///
    /// # Errors
    ///
    /// Returns an error when the bytes are not well-formed XML.
    pub fn new(
        input: Box<dyn Read + Send>,
        iterator: &str,
        sequencer: Arc<Sequencer>,
    ) -> Result<Self> {
        let root = parse_document(input)?;
        let elements = select_elements(&root, iterator);
        Ok(Self {
            elements: elements.into_iter(),
            sequencer,
        })
    }
}

impl RecordDecoder for XmlDecoder {
    fn next_record(&mut self) -> Result<Option<SharedRecord>> {
        Ok(self.elements.next().map(|element| {
            Arc::new(XmlRecord {
                sequence: self.sequencer.next(),
                element,
            }) as SharedRecord
        }))
    }
}

/// One iterated XML element, with path lookup relative to it.
#[derive(Debug, Clone)]
pub struct XmlRecord {
    sequence: u64,
    element: XmlElement,
}

impl SourceRecord for XmlRecord {
    fn sequence(&self) -> u64 {
        self.sequence
    }

    fn lookup(&self, reference: &str) -> Option<Vec<String>> {
        if reference == "." {
            let text = self.element.text();
            return Some(if text.is_empty() {
                Vec::new()
            } else {
                vec![text.to_string()]
            });
        }

        let mut elements = vec![&self.element];
        let segments: Vec<&str> = reference
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();

        for (position, segment) in segments.iter().enumerate() {
            if let Some(attribute) = segment.strip_prefix('@') {
                // attributes terminate a path
                if position + 1 != segments.len() {
                    return None;
                }
                let values: Vec<String> = elements
                    .iter()
                    .filter_map(|element| element.attribute(attribute))
                    .map(ToString::to_string)
                    .collect();
                // an attribute no matched element carries does not resolve
                return if values.is_empty() { None } else { Some(values) };
            }
            elements = elements
                .iter()
                .flat_map(|element| element.children_named(segment))
                .collect();
            if elements.is_empty() {
                // the path names no element of this record
                return None;
            }
        }

        Some(
            elements
                .iter()
                .map(|element| element.text())
                .filter(|text| !text.is_empty())
                .map(ToString::to_string)
                .collect(),
        )
    }
}

/// Parses a document into its root element.
fn parse_document(input: Box<dyn Read + Send>) -> Result<XmlElement> {
    let mut reader = Reader::from_reader(BufReader::new(input));
    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| RmlError::Parse(e.to_string()))?
        {
            Event::Start(start) => {
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    let text = text.unescape().map_err(|e| RmlError::Parse(e.to_string()))?;
                    top.text.push_str(&text);
                }
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    RmlError::Parse("unbalanced closing tag".to_string())
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(RmlError::Parse("unclosed element at end of input".to_string()));
    }
    root.ok_or_else(|| RmlError::Parse("document has no root element".to_string()))
}

fn element_from_start(start: &quick_xml::events::BytesStart<'_>) -> Result<XmlElement> {
    let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| RmlError::Parse(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).to_string();
        let value = attribute
            .unescape_value()
            .map_err(|e| RmlError::Parse(e.to_string()))?
            .to_string();
        attributes.push((key, value));
    }
    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
        text: String::new(),
    })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err(RmlError::Parse(
            "multiple root elements in document".to_string(),
        ))
    }
}

/// Evaluates the iterator path from the document root. An absolute path
/// names the root element in its first segment; a relative path descends
/// from the root element.
fn select_elements(root: &XmlElement, iterator: &str) -> Vec<XmlElement> {
    let segments: Vec<&str> = iterator
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    let mut elements: Vec<&XmlElement> = if iterator.starts_with('/') {
        match segments.first() {
            Some(&first) if first == root.name => vec![root],
            _ => Vec::new(),
        }
    } else {
        vec![root]
    };

    let rest = if iterator.starts_with('/') {
        &segments[1.min(segments.len())..]
    } else {
        &segments[..]
    };

    for segment in rest {
        elements = elements
            .iter()
            .flat_map(|element| element.children_named(segment))
            .collect();
    }

    elements.into_iter().cloned().collect()
}
