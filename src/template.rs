//! Template expression parsing.
//!
//! A template is a sequence of literal text and `{reference}` holes, for
//! example `http://example.org/person/{id}`. The characters `{`, `}`, and
//! `\` can be escaped as `\{`, `\}`, and `\\`.

use std::fmt;

use crate::error::{Result, RmlError};

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Literal text, emitted verbatim.
    Text(String),
    /// A reference hole, looked up against the source record.
    Reference(String),
}

/// A parsed template expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parses a template string into segments.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unterminated `{`, a stray `}`,
    /// an empty `{}` hole, or a trailing backslash.
    pub fn parse(input: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = input.chars();

        loop {
            match chars.next() {
                None => break,
                Some('\\') => match chars.next() {
                    Some(c @ ('{' | '}' | '\\')) => text.push(c),
                    Some(c) => {
                        return Err(RmlError::Configuration(format!(
                            "invalid escape '\\{c}' in template '{input}'"
                        )));
                    }
                    None => {
                        return Err(RmlError::Configuration(format!(
                            "trailing backslash in template '{input}'"
                        )));
                    }
                },
                Some('{') => {
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    let mut reference = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('\\') => match chars.next() {
                                Some(c @ ('{' | '}' | '\\')) => reference.push(c),
                                _ => {
                                    return Err(RmlError::Configuration(format!(
                                        "invalid escape in template '{input}'"
                                    )));
                                }
                            },
                            Some('{') => {
                                return Err(RmlError::Configuration(format!(
                                    "nested '{{' in template '{input}'"
                                )));
                            }
                            Some(c) => reference.push(c),
                            None => {
                                return Err(RmlError::Configuration(format!(
                                    "unterminated '{{' in template '{input}'"
                                )));
                            }
                        }
                    }
                    if reference.is_empty() {
                        return Err(RmlError::Configuration(format!(
                            "empty reference in template '{input}'"
                        )));
                    }
                    segments.push(Segment::Reference(reference));
                }
                Some('}') => {
                    return Err(RmlError::Configuration(format!(
                        "stray '}}' in template '{input}'"
                    )));
                }
                Some(c) => text.push(c),
            }
        }

        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        Ok(Self { segments })
    }

    /// The parsed segments in order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The reference names used by this template, in order of appearance.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Reference(r) => Some(r.as_str()),
            Segment::Text(_) => None,
        })
    }

    /// Returns true if the template contains at least one reference hole.
    #[must_use]
    pub fn has_references(&self) -> bool {
        self.references().next().is_some()
    }
}

fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        if matches!(c, '{' | '}' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
}

impl fmt::Display for Template {
    /// Renders the template back to its source form, re-escaping special
    /// characters.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(t) => escape_into(&mut out, t),
                Segment::Reference(r) => {
                    out.push('{');
                    escape_into(&mut out, r);
                    out.push('}');
                }
            }
        }
        f.write_str(&out)
    }
}
