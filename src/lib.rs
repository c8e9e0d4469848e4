#![warn(missing_docs)]

//! # rmlx: RML Mapping Engine
//!
//! A Rust library for executing [RML](https://rml.io/) (RDF Mapping
//! Language) mappings: declarative documents that describe how CSV, JSON,
//! and XML sources materialize into RDF triples. RML is a superset of
//! W3C R2RML that generalizes beyond relational sources.
//!
//! ## Quick Start
//!
//! ```ignore
//! use rmlx::{RdfFormat, RmlMapper};
//! use std::collections::HashMap;
//!
//! # fn main() -> rmlx::Result<()> {
//! let mapping = std::fs::read_to_string("mapping.ttl")?;
//! let mapper = RmlMapper::builder()
//!     .with_mapping(&mapping, RdfFormat::Turtle)?
//!     .build()?;
//!
//! let mut inputs = HashMap::new();
//! inputs.insert("people".to_string(), std::fs::read("people.csv")?);
//!
//! for statement in mapper.map_with_named_inputs(inputs)? {
//!     println!("{}", statement?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## How a run works
//!
//! Building a mapper compiles every term map into a *term generator* (a
//! pure function from a source record to RDF terms) and groups triples
//! maps by logical source. Running it binds each logical source to a byte
//! stream, decodes records once per source, and fans them out to all
//! triples maps sharing that source over bounded channels; the slowest
//! consumer throttles the decoder. Referencing object maps are deferred
//! through the join engine until both sides have completed.
//!
//! ## Modules
//!
//! - [`term`] — RDF value model (`Term`, `Statement`)
//! - [`model`] — the mapping model (`TriplesMap`, `SubjectMap`, ...)
//! - [`graph`] — RDF graph wrapper with parsing and serialization
//! - [`loader`] / [`serializer`] — mapping graph round-trip
//! - [`template`] — `{reference}` template parsing
//! - [`encode`] — Unicode normalization and IRI percent-encoding
//! - [`generator`] — term generator compilation
//! - [`functions`] — user-defined function registry
//! - [`record`] — source records handed to generators
//! - [`formats`] — CSV, JSON, and XML decoders
//! - [`resolver`] — source reference resolution
//! - [`pipeline`] — per-source dataflow
//! - [`join`] — join stores and the join engine
//! - [`mapper`] — the orchestrator
//! - [`config`] — execution options
//! - [`vocab`] — the RR/RML/QL/CARML vocabularies
//! - [`error`] — error types

pub mod config;
pub mod encode;
pub mod error;
pub mod formats;
pub mod functions;
pub mod generator;
pub mod graph;
pub mod join;
pub mod loader;
pub mod mapper;
pub mod model;
pub mod pipeline;
pub mod record;
pub mod resolver;
pub mod serializer;
pub mod template;
pub mod term;
pub mod vocab;

pub use config::MapperConfig;
pub use encode::NormalizationForm;
pub use error::{Result, RmlError};
pub use functions::{FunctionArgs, FunctionRegistry};
pub use graph::{MappingGraph, RdfFormat};
pub use mapper::{RmlMapper, RmlMapperBuilder, StatementIter};
pub use model::{
    GraphMap, JoinCondition, LogicalSource, ObjectEntry, ObjectMap, PredicateMap,
    PredicateObjectMap, RefObjectMap, SourceRef, SubjectMap, TermMapSpec, TermType, TriplesMap,
};
pub use record::{FieldRecord, SourceRecord};
pub use resolver::{CompositeResolver, FileResolver, NamedInputResolver, SourceResolver};
pub use term::{Statement, Term};
