//! The in-memory mapping model.
//!
//! These types describe one parsed mapping document: a set of
//! [`TriplesMap`]s, each with a [`LogicalSource`], a [`SubjectMap`], and
//! any number of [`PredicateObjectMap`]s. Entities are frozen once loaded;
//! execution never mutates them.
//!
//! Every entity carries the `resource` (IRI or blank node) that identified
//! it in the mapping graph. Structural equality compares resources and
//! attributes; [`LogicalSource`] equality deliberately ignores the
//! resource so that triples maps declaring the same source by value share
//! one pipeline.

use std::hash::{Hash, Hasher};

use crate::template::Template;
use crate::term::Term;

/// The kind of RDF term a term map produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermType {
    /// Named nodes.
    Iri,
    /// Blank nodes.
    BlankNode,
    /// Literals.
    Literal,
}

/// The value-producing core shared by all term maps.
///
/// Exactly one of the four fields is set in a well-formed mapping; the
/// loader and the mapper builder reject anything else.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TermMapSpec {
    /// A constant term, emitted for every record.
    pub constant: Option<Term>,
    /// A reference into the source record.
    pub reference: Option<String>,
    /// A template over source record references.
    pub template: Option<Template>,
    /// A function call over nested term maps.
    pub function: Option<Box<FunctionMap>>,
}

impl TermMapSpec {
    /// A spec producing a constant term.
    #[must_use]
    pub fn constant(term: Term) -> Self {
        Self {
            constant: Some(term),
            ..Self::default()
        }
    }

    /// A spec reading one source reference.
    #[must_use]
    pub fn reference(reference: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
            ..Self::default()
        }
    }

    /// A spec expanding a template.
    #[must_use]
    pub fn template(template: Template) -> Self {
        Self {
            template: Some(template),
            ..Self::default()
        }
    }

    /// A spec evaluating a function.
    #[must_use]
    pub fn function(function: FunctionMap) -> Self {
        Self {
            function: Some(Box::new(function)),
            ..Self::default()
        }
    }

    /// Returns true if no value source is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constant.is_none()
            && self.reference.is_none()
            && self.template.is_none()
            && self.function.is_none()
    }

    /// The number of value sources set. A well-formed spec has exactly one
    /// (or zero, for term maps a mapping omits entirely).
    #[must_use]
    pub fn value_source_count(&self) -> usize {
        usize::from(self.constant.is_some())
            + usize::from(self.reference.is_some())
            + usize::from(self.template.is_some())
            + usize::from(self.function.is_some())
    }
}

/// A function call over nested term maps.
///
/// The function IRI is resolved through the mapper's function registry at
/// compile time; each argument is itself a term map evaluated against the
/// same record.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionMap {
    /// The resource identifying this function map in the mapping graph.
    pub resource: Term,
    /// The IRI of the function to execute.
    pub function: String,
    /// The arguments, as (parameter IRI, value term map) pairs.
    pub arguments: Vec<FunctionArgument>,
}

/// One argument of a [`FunctionMap`].
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionArgument {
    /// The parameter IRI this argument binds.
    pub parameter: String,
    /// The term map producing the argument values.
    pub spec: TermMapSpec,
}

/// How a logical source names its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceRef {
    /// An opaque reference string handed to the source resolvers,
    /// typically a relative file path.
    Reference(String),
    /// A named input stream bound at map time; `None` means the single
    /// unnamed input.
    Stream(Option<String>),
}

impl SourceRef {
    /// The resolver lookup key for this source.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Reference(r) => r,
            Self::Stream(Some(name)) => name,
            Self::Stream(None) => "",
        }
    }
}

/// The input stream description of a triples map.
#[derive(Debug, Clone)]
pub struct LogicalSource {
    /// The resource identifying this logical source in the mapping graph.
    pub resource: Term,
    /// The source reference, resolved to bytes at run time.
    pub source: SourceRef,
    /// The reference formulation IRI selecting the decoder.
    pub reference_formulation: String,
    /// Optional iterator expression, e.g. a path into a hierarchical
    /// document.
    pub iterator: Option<String>,
}

impl PartialEq for LogicalSource {
    /// Equality by value: two logical sources are the same pipeline when
    /// source, formulation, and iterator agree, regardless of which graph
    /// resource declared them.
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
            && self.reference_formulation == other.reference_formulation
            && self.iterator == other.iterator
    }
}

impl Eq for LogicalSource {}

impl Hash for LogicalSource {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
        self.reference_formulation.hash(state);
        self.iterator.hash(state);
    }
}

/// A term map producing graph IRIs.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphMap {
    /// The resource identifying this graph map in the mapping graph.
    pub resource: Term,
    /// The value-producing core. Generated terms are always IRIs.
    pub spec: TermMapSpec,
}

/// The term map producing subjects, with declared classes and graphs.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectMap {
    /// The resource identifying this subject map in the mapping graph.
    pub resource: Term,
    /// The value-producing core.
    pub spec: TermMapSpec,
    /// Explicit term type; `None` means the default (IRI).
    pub term_type: Option<TermType>,
    /// Classes emitted as `rdf:type` triples for every generated subject.
    pub classes: Vec<Term>,
    /// Graph maps scoping every triple of this triples map.
    pub graph_maps: Vec<GraphMap>,
}

impl SubjectMap {
    /// Returns true if this subject map can produce terms, i.e. it has at
    /// least one value source.
    #[must_use]
    pub fn can_generate(&self) -> bool {
        !self.spec.is_empty()
    }
}

/// A term map producing predicates. Generated terms are always IRIs.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateMap {
    /// The resource identifying this predicate map in the mapping graph.
    pub resource: Term,
    /// The value-producing core.
    pub spec: TermMapSpec,
}

/// A term map producing objects.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMap {
    /// The resource identifying this object map in the mapping graph.
    pub resource: Term,
    /// The value-producing core.
    pub spec: TermMapSpec,
    /// Explicit term type; `None` applies the default rule: literal when a
    /// reference, language, or datatype is declared, IRI otherwise.
    pub term_type: Option<TermType>,
    /// Datatype IRI for generated literals.
    pub datatype: Option<Term>,
    /// Language tag for generated literals.
    pub language: Option<String>,
}

impl ObjectMap {
    /// The effective term type after applying the default rule.
    #[must_use]
    pub fn effective_term_type(&self) -> TermType {
        if let Some(tt) = self.term_type {
            return tt;
        }
        if self.spec.reference.is_some() || self.datatype.is_some() || self.language.is_some() {
            TermType::Literal
        } else {
            TermType::Iri
        }
    }
}

/// Paired expressions evaluated against child and parent records; a join
/// matches when every condition's values are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinCondition {
    /// Expression evaluated against the child record.
    pub child: String,
    /// Expression evaluated against the parent record.
    pub parent: String,
}

/// An object map whose values are the subjects of another triples map,
/// optionally filtered by join conditions.
#[derive(Debug, Clone, PartialEq)]
pub struct RefObjectMap {
    /// The resource identifying this map in the mapping graph.
    pub resource: Term,
    /// The resource of the parent triples map.
    pub parent_triples_map: Term,
    /// Join conditions; empty means a product over parent subjects that
    /// share the child's logical source.
    pub join_conditions: Vec<JoinCondition>,
}

/// An entry in a predicate-object map's object position.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectEntry {
    /// An ordinary object map evaluated against the child record.
    Map(ObjectMap),
    /// A reference to another triples map's subjects, resolved through the
    /// join engine.
    Ref(RefObjectMap),
}

/// A group of predicate maps, object maps, and graph maps.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateObjectMap {
    /// The resource identifying this map in the mapping graph.
    pub resource: Term,
    /// The predicate maps; each generated predicate combines with each
    /// generated object.
    pub predicate_maps: Vec<PredicateMap>,
    /// The object maps and referencing object maps.
    pub objects: Vec<ObjectEntry>,
    /// Graph maps scoping the triples of this group, combined with the
    /// subject map's graph maps.
    pub graph_maps: Vec<GraphMap>,
}

/// One mapping rule: a logical source, a subject map, and the
/// predicate-object maps producing the triples that share each subject.
#[derive(Debug, Clone, PartialEq)]
pub struct TriplesMap {
    /// The resource identifying this triples map in the mapping graph.
    pub resource: Term,
    /// The input stream description.
    pub logical_source: LogicalSource,
    /// The subject map.
    pub subject_map: SubjectMap,
    /// The predicate-object maps.
    pub predicate_object_maps: Vec<PredicateObjectMap>,
}

impl TriplesMap {
    /// Returns true if this triples map can produce any output: its
    /// subject map has at least one value source.
    #[must_use]
    pub fn is_mappable(&self) -> bool {
        self.subject_map.can_generate()
    }

    /// The resource as a display string, used in diagnostics.
    #[must_use]
    pub fn id(&self) -> String {
        match &self.resource {
            Term::Iri(iri) => iri.clone(),
            other => other.to_string(),
        }
    }
}

/// Builder for [`TriplesMap`], mirroring the shape of a mapping document.
#[derive(Debug, Clone)]
pub struct TriplesMapBuilder {
    resource: Term,
    logical_source: Option<LogicalSource>,
    subject_map: Option<SubjectMap>,
    predicate_object_maps: Vec<PredicateObjectMap>,
}

impl TriplesMapBuilder {
    /// Starts a builder for the given triples map resource.
    #[must_use]
    pub fn new(resource: Term) -> Self {
        Self {
            resource,
            logical_source: None,
            subject_map: None,
            predicate_object_maps: Vec::new(),
        }
    }

    /// Sets the logical source.
    #[must_use]
    pub fn logical_source(mut self, source: LogicalSource) -> Self {
        self.logical_source = Some(source);
        self
    }

    /// Sets the subject map.
    #[must_use]
    pub fn subject_map(mut self, subject_map: SubjectMap) -> Self {
        self.subject_map = Some(subject_map);
        self
    }

    /// Adds a predicate-object map.
    #[must_use]
    pub fn predicate_object_map(mut self, pom: PredicateObjectMap) -> Self {
        self.predicate_object_maps.push(pom);
        self
    }

    /// Finishes the builder.
    ///
    /// Returns `None` when the logical source or subject map is missing.
    #[must_use]
    pub fn build(self) -> Option<TriplesMap> {
        Some(TriplesMap {
            resource: self.resource,
            logical_source: self.logical_source?,
            subject_map: self.subject_map?,
            predicate_object_maps: self.predicate_object_maps,
        })
    }
}

impl SubjectMap {
    /// A subject map with the given spec and no classes or graphs.
    #[must_use]
    pub fn with_spec(resource: Term, spec: TermMapSpec) -> Self {
        Self {
            resource,
            spec,
            term_type: None,
            classes: Vec::new(),
            graph_maps: Vec::new(),
        }
    }
}

impl ObjectMap {
    /// An object map with the given spec and default typing.
    #[must_use]
    pub fn with_spec(resource: Term, spec: TermMapSpec) -> Self {
        Self {
            resource,
            spec,
            term_type: None,
            datatype: None,
            language: None,
        }
    }
}

impl PredicateMap {
    /// A predicate map producing the given constant IRI.
    #[must_use]
    pub fn constant(resource: Term, iri: impl Into<String>) -> Self {
        Self {
            resource,
            spec: TermMapSpec::constant(Term::iri(iri)),
        }
    }
}
