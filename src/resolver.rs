//! Resolving declarative source references to byte streams.
//!
//! A logical source names its bytes with an opaque reference; resolvers
//! turn that reference into a readable stream. A composite resolver tries
//! its children in insertion order and returns the first match, so
//! callers can layer named inputs over a file system root.

use std::collections::HashMap;
use std::fmt;
use std::io::{Cursor, Read};
use std::path::PathBuf;

use crate::error::Result;

/// A readable source byte stream.
pub type ByteStream = Box<dyn Read + Send>;

/// Trait for resolving a source reference to a byte stream.
///
/// Resolvers are pure with respect to the mapping; they may perform I/O.
/// Returning `Ok(None)` means "not mine", letting a composite resolver
/// try the next one.
pub trait SourceResolver: Send + Sync {
    /// Attempts to resolve a reference.
    ///
    /// # Errors
    ///
    /// Returns an error only for I/O failures on a reference this
    /// resolver owns; an unknown reference is `Ok(None)`.
    fn resolve(&self, reference: &str) -> Result<Option<ByteStream>>;
}

/// Resolves references as paths under a base directory.
#[derive(Debug, Clone)]
pub struct FileResolver {
    base: PathBuf,
}

impl FileResolver {
    /// Creates a resolver rooted at the given base path.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl SourceResolver for FileResolver {
    fn resolve(&self, reference: &str) -> Result<Option<ByteStream>> {
        let path = self.base.join(reference);
        if !path.is_file() {
            return Ok(None);
        }
        let file = std::fs::File::open(path)?;
        Ok(Some(Box::new(file)))
    }
}

/// Resolves references by exact name from an in-memory map.
///
/// This backs the named input stream surface: callers bind logical names
/// to byte buffers before running the mapper.
#[derive(Debug, Clone, Default)]
pub struct NamedInputResolver {
    inputs: HashMap<String, Vec<u8>>,
}

impl NamedInputResolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a name to a byte buffer, replacing any previous binding.
    pub fn bind(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.inputs.insert(name.into(), bytes.into());
    }

    /// The number of bound inputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    /// Returns true when no inputs are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

impl SourceResolver for NamedInputResolver {
    fn resolve(&self, reference: &str) -> Result<Option<ByteStream>> {
        Ok(self
            .inputs
            .get(reference)
            .map(|bytes| Box::new(Cursor::new(bytes.clone())) as ByteStream))
    }
}

/// Tries registered resolvers in insertion order; first match wins.
#[derive(Default)]
pub struct CompositeResolver {
    resolvers: Vec<Box<dyn SourceResolver>>,
}

impl CompositeResolver {
    /// Creates an empty composite.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a resolver.
    pub fn push<R: SourceResolver + 'static>(&mut self, resolver: R) {
        self.resolvers.push(Box::new(resolver));
    }

    /// The number of registered resolvers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Returns true when no resolvers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl fmt::Debug for CompositeResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeResolver")
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

impl SourceResolver for CompositeResolver {
    fn resolve(&self, reference: &str) -> Result<Option<ByteStream>> {
        for resolver in &self.resolvers {
            if let Some(stream) = resolver.resolve(reference)? {
                return Ok(Some(stream));
            }
        }
        Ok(None)
    }
}
