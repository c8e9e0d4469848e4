//! Error types for RML mapping operations.
//!
//! This module provides the [`RmlError`] type for all mapping operations
//! and the [`Result`] convenience type.

use thiserror::Error;

/// Error type for all RML mapping operations.
///
/// The variants follow the failure taxonomy of the engine: configuration
/// problems surface at build time, source and decoder problems are fatal to
/// one pipeline, term generation problems are contained to one record
/// unless strict mode is enabled.
#[derive(Error, Debug)]
pub enum RmlError {
    /// Invalid mapper configuration: missing decoder binding, no mappable
    /// triples map, or a malformed mapping entity.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No registered resolver matched a logical source reference.
    #[error("Could not resolve source reference '{0}'")]
    SourceResolution(String),

    /// Source bytes were invalid for the declared reference formulation.
    /// Fatal to the owning pipeline; sibling pipelines are unaffected.
    #[error("Decoder error in source '{source_name}': {message}")]
    Decoder {
        /// The logical source whose decoder failed.
        source_name: String,
        /// What went wrong.
        message: String,
    },

    /// A term map could not produce a term from a record. Per-record and
    /// non-fatal by default; strict mode promotes it to fatal.
    #[error("Term generation error: {0}")]
    TermGeneration(String),

    /// A function term map referenced an unregistered function IRI, or the
    /// function rejected its arguments.
    #[error("Function evaluation error for <{function}>: {message}")]
    FunctionEvaluation {
        /// The function IRI that failed to resolve or execute.
        function: String,
        /// What went wrong.
        message: String,
    },

    /// I/O failure in a spillable join store. Fatal.
    #[error("Join store error: {0}")]
    JoinStore(String),

    /// The orchestrator-level timeout elapsed before mapping completed.
    #[error("Mapping timed out after {0:?}")]
    MappingTimeout(std::time::Duration),

    /// Error during parsing or serialization of an RDF document.
    #[error("RDF parse error: {0}")]
    Parse(String),

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for [`std::result::Result`] with [`RmlError`].
pub type Result<T> = std::result::Result<T, RmlError>;
