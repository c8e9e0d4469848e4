//! RDF graph wrapper used for mapping documents and collected output.
//!
//! This module provides RDF parsing and serialization using the oxrdfio
//! library, wrapped in a higher-level API tailored for reading mapping
//! documents and collecting mapped output. Lookup methods index the graph
//! by subject so the mapping loader can walk entity descriptions without
//! scanning.

use std::io::{Read, Write};

use oxrdf::{BlankNode, Literal, NamedNode, NamedOrBlankNode, Quad, Triple};
use oxrdfio::{JsonLdProfileSet, RdfFormat as OxRdfFormat, RdfParser, RdfSerializer};

use crate::error::{Result, RmlError};
use crate::term::{Statement, Term};

/// Concrete RDF serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RdfFormat {
    /// Turtle format (text/turtle) - Compact, human-friendly
    #[default]
    Turtle,
    /// N-Triples format (application/n-triples) - Simple, line-based
    NTriples,
    /// RDF/XML format (application/rdf+xml) - Most compatible with legacy systems
    RdfXml,
    /// JSON-LD format (application/ld+json) - Modern, readable, web-friendly
    JsonLd,
}

impl RdfFormat {
    /// Returns the MIME type for this RDF format.
    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        match self {
            Self::Turtle => "text/turtle",
            Self::NTriples => "application/n-triples",
            Self::RdfXml => "application/rdf+xml",
            Self::JsonLd => "application/ld+json",
        }
    }

    /// Returns the typical file extension for this RDF format.
    #[must_use]
    pub const fn file_extension(&self) -> &'static str {
        match self {
            Self::Turtle => "ttl",
            Self::NTriples => "nt",
            Self::RdfXml => "rdf",
            Self::JsonLd => "jsonld",
        }
    }
}

/// An in-memory RDF graph of [`Term`] triples.
///
/// Used both for the mapping document handed to the loader and for the
/// output of [`map_to_graph`](crate::mapper::RmlMapper::map_to_graph).
/// Insertion order is preserved; duplicates are kept.
#[derive(Debug, Clone, Default)]
pub struct MappingGraph {
    triples: Vec<(Term, Term, Term)>,
}

impl MappingGraph {
    /// Creates a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a triple to the graph.
    pub fn add(&mut self, subject: Term, predicate: Term, object: Term) {
        self.triples.push((subject, predicate, object));
    }

    /// Adds a statement, discarding any named graph component.
    pub fn add_statement(&mut self, statement: Statement) {
        self.triples
            .push((statement.subject, statement.predicate, statement.object));
    }

    /// Returns the number of triples in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// Returns true if the graph is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Returns an iterator over the triples.
    pub fn triples(&self) -> impl Iterator<Item = &(Term, Term, Term)> {
        self.triples.iter()
    }

    /// All objects of triples with the given subject and predicate IRI,
    /// in insertion order.
    #[must_use]
    pub fn objects_of(&self, subject: &Term, predicate: &str) -> Vec<&Term> {
        self.triples
            .iter()
            .filter(|(s, p, _)| s == subject && p.as_iri() == Some(predicate))
            .map(|(_, _, o)| o)
            .collect()
    }

    /// The single object of (subject, predicate), if there is exactly one.
    #[must_use]
    pub fn object_of(&self, subject: &Term, predicate: &str) -> Option<&Term> {
        let mut objects = self.objects_of(subject, predicate).into_iter();
        let first = objects.next()?;
        if objects.next().is_some() {
            return None;
        }
        Some(first)
    }

    /// All distinct subjects that have at least one triple with the given
    /// predicate IRI, in first-appearance order.
    #[must_use]
    pub fn subjects_with(&self, predicate: &str) -> Vec<&Term> {
        let mut seen = Vec::new();
        for (s, p, _) in &self.triples {
            if p.as_iri() == Some(predicate) && !seen.contains(&s) {
                seen.push(s);
            }
        }
        seen
    }

    /// Returns true if the triple (subject, predicate, any) exists.
    #[must_use]
    pub fn has_predicate(&self, subject: &Term, predicate: &str) -> bool {
        self.triples
            .iter()
            .any(|(s, p, _)| s == subject && p.as_iri() == Some(predicate))
    }

    /// Serializes the graph to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self, format: RdfFormat) -> Result<String> {
        let mut output = Vec::new();
        self.serialize_to_writer(&mut output, format)?;
        String::from_utf8(output).map_err(|e| RmlError::Parse(e.to_string()))
    }

    /// Serializes the graph to a writer in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize_to_writer<W: Write>(&self, writer: W, format: RdfFormat) -> Result<()> {
        let ox_format = to_oxrdf_format(format);
        let mut serializer = RdfSerializer::from_format(ox_format).for_writer(writer);

        for (s, p, o) in &self.triples {
            let ox_triple = to_oxrdf_triple(s, p, o)?;
            serializer
                .serialize_triple(&ox_triple)
                .map_err(|e| RmlError::Io(std::io::Error::other(e.to_string())))?;
        }

        serializer
            .finish()
            .map_err(|e| RmlError::Io(std::io::Error::other(e.to_string())))?;

        Ok(())
    }

    /// Parses an RDF graph from a reader in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn parse_from_reader<R: Read>(reader: R, format: RdfFormat) -> Result<Self> {
        let ox_format = to_oxrdf_format(format);
        let parser = RdfParser::from_format(ox_format).for_reader(reader);

        let mut graph = Self::new();

        for result in parser {
            let quad = result.map_err(|e| RmlError::Parse(e.to_string()))?;
            let (s, p, o) = from_oxrdf_quad(&quad);
            graph.add(s, p, o);
        }

        Ok(graph)
    }

    /// Parses an RDF graph from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails.
    pub fn parse(input: &str, format: RdfFormat) -> Result<Self> {
        Self::parse_from_reader(input.as_bytes(), format)
    }

    /// The triples as a sorted, deduplicated vector, with blank node labels
    /// rewritten in first-occurrence order.
    ///
    /// Two graphs produced by the deterministic mapping serializer are
    /// equal iff their canonical forms are equal. This is not a general
    /// graph isomorphism check; it relies on deterministic triple ordering
    /// from the producer.
    #[must_use]
    pub fn canonical_triples(&self) -> Vec<(Term, Term, Term)> {
        let mut labels: Vec<(String, String)> = Vec::new();
        let mut relabel = |term: &Term| -> Term {
            match term {
                Term::BlankNode(id) => {
                    if let Some((_, fresh)) = labels.iter().find(|(old, _)| old == id) {
                        Term::BlankNode(fresh.clone())
                    } else {
                        let fresh = format!("c{}", labels.len());
                        labels.push((id.clone(), fresh.clone()));
                        Term::BlankNode(fresh)
                    }
                }
                other => other.clone(),
            }
        };

        let mut canonical: Vec<(Term, Term, Term)> = self
            .triples
            .iter()
            .map(|(s, p, o)| (relabel(s), relabel(p), relabel(o)))
            .collect();
        canonical.sort_by(|a, b| format!("{} {} {}", a.0, a.1, a.2).cmp(&format!("{} {} {}", b.0, b.1, b.2)));
        canonical.dedup();
        canonical
    }
}

impl FromIterator<Statement> for MappingGraph {
    fn from_iter<I: IntoIterator<Item = Statement>>(iter: I) -> Self {
        let mut graph = Self::new();
        for statement in iter {
            graph.add_statement(statement);
        }
        graph
    }
}

/// Converts our [`RdfFormat`] to oxrdfio's format.
fn to_oxrdf_format(format: RdfFormat) -> OxRdfFormat {
    match format {
        RdfFormat::Turtle => OxRdfFormat::Turtle,
        RdfFormat::NTriples => OxRdfFormat::NTriples,
        RdfFormat::RdfXml => OxRdfFormat::RdfXml,
        RdfFormat::JsonLd => OxRdfFormat::JsonLd {
            profile: JsonLdProfileSet::default(),
        },
    }
}

/// Converts a [`Term`] triple to an oxrdf Triple.
fn to_oxrdf_triple(subject: &Term, predicate: &Term, object: &Term) -> Result<Triple> {
    let subject = match subject {
        Term::Iri(iri) => NamedOrBlankNode::NamedNode(
            NamedNode::new(iri).map_err(|e| RmlError::Parse(format!("Invalid IRI: {e}")))?,
        ),
        Term::BlankNode(id) => NamedOrBlankNode::BlankNode(
            BlankNode::new(id)
                .map_err(|e| RmlError::Parse(format!("Invalid blank node ID: {e}")))?,
        ),
        Term::Literal { .. } => {
            return Err(RmlError::Parse(
                "Literals cannot be triple subjects".into(),
            ));
        }
    };

    let predicate = match predicate {
        Term::Iri(iri) => NamedNode::new(iri)
            .map_err(|e| RmlError::Parse(format!("Invalid predicate IRI: {e}")))?,
        _ => {
            return Err(RmlError::Parse(
                "Predicates must be IRIs".into(),
            ));
        }
    };

    let object = to_oxrdf_term(object)?;

    Ok(Triple::new(subject, predicate, object))
}

/// Converts a [`Term`] to an oxrdf object term.
pub(crate) fn to_oxrdf_term(term: &Term) -> Result<oxrdf::Term> {
    Ok(match term {
        Term::Iri(iri) => oxrdf::Term::NamedNode(
            NamedNode::new(iri).map_err(|e| RmlError::Parse(format!("Invalid IRI: {e}")))?,
        ),
        Term::BlankNode(id) => oxrdf::Term::BlankNode(
            BlankNode::new(id)
                .map_err(|e| RmlError::Parse(format!("Invalid blank node ID: {e}")))?,
        ),
        Term::Literal {
            value,
            language,
            datatype,
        } => {
            let lit = if let Some(lang) = language {
                Literal::new_language_tagged_literal(value, lang)
                    .map_err(|e| RmlError::Parse(format!("Invalid language tag: {e}")))?
            } else if let Some(dt) = datatype {
                let dt_node = NamedNode::new(dt)
                    .map_err(|e| RmlError::Parse(format!("Invalid datatype IRI: {e}")))?;
                Literal::new_typed_literal(value, dt_node)
            } else {
                Literal::new_simple_literal(value)
            };
            oxrdf::Term::Literal(lit)
        }
    })
}

/// Converts an oxrdf Quad back to a [`Term`] triple.
fn from_oxrdf_quad(quad: &Quad) -> (Term, Term, Term) {
    let subject = match &quad.subject {
        NamedOrBlankNode::NamedNode(n) => Term::Iri(n.as_str().to_string()),
        NamedOrBlankNode::BlankNode(b) => Term::BlankNode(b.as_str().to_string()),
    };

    let predicate = Term::Iri(quad.predicate.as_str().to_string());

    let object = from_oxrdf_term(&quad.object);

    (subject, predicate, object)
}

/// Converts an oxrdf term to a [`Term`].
pub(crate) fn from_oxrdf_term(term: &oxrdf::Term) -> Term {
    match term {
        oxrdf::Term::NamedNode(n) => Term::Iri(n.as_str().to_string()),
        oxrdf::Term::BlankNode(b) => Term::BlankNode(b.as_str().to_string()),
        oxrdf::Term::Literal(lit) => {
            let value = lit.value().to_string();
            let language = lit.language().map(String::from);
            let datatype = if language.is_none()
                && lit.datatype().as_str() != "http://www.w3.org/2001/XMLSchema#string"
            {
                Some(lit.datatype().as_str().to_string())
            } else {
                None
            };
            Term::Literal {
                value,
                language,
                datatype,
            }
        }
    }
}
