//! The mapper orchestrator.
//!
//! [`RmlMapper`] owns the loaded mapping, the decoder and function
//! registries, the source resolvers, and the join store providers. Each
//! `map*` call compiles the (optionally filtered) triples maps into
//! pipelines, binds every pipeline to a resolved byte stream, and runs
//! them concurrently; the result is an iterator over statements.
//!
//! Compilation is the pure phase: all term generators are built before
//! any byte is read. Generators are compiled once per term map per run
//! and shared by the run's threads; they are discarded with the run.

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use tracing::{debug, warn};

use crate::config::MapperConfig;
use crate::error::{Result, RmlError};
use crate::formats::{DecoderFactory, DecoderRegistry, Sequencer};
use crate::functions::{FunctionArgs, FunctionRegistry};
use crate::generator::GeneratorOptions;
use crate::graph::{MappingGraph, RdfFormat};
use crate::join::{
    ChildSideJoinStoreProvider, JoinEngine, MemoryChildStoreProvider, MemoryParentStoreProvider,
    ParentSideJoinConditionStoreProvider,
};
use crate::loader;
use crate::model::{SourceRef, TriplesMap};
use crate::pipeline::{compile_pipelines, spawn_pipelines, PipelineRun};
use crate::record::SourceRecord;
use crate::resolver::{ByteStream, CompositeResolver, SourceResolver};
use crate::term::{Statement, Term};

/// An iterator over the statements produced by a mapper run.
///
/// Dropping the iterator cancels the run: pipelines release their byte
/// streams and join stores release their entries.
#[derive(Debug)]
pub struct StatementIter {
    receiver: Receiver<Result<Statement>>,
    cancel: Arc<AtomicBool>,
}

impl Iterator for StatementIter {
    type Item = Result<Statement>;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

impl Drop for StatementIter {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

/// Builder for [`RmlMapper`].
pub struct RmlMapperBuilder {
    config: MapperConfig,
    triples_maps: Vec<TriplesMap>,
    functions: FunctionRegistry,
    decoders: DecoderRegistry,
    resolvers: CompositeResolver,
    child_provider: Arc<dyn ChildSideJoinStoreProvider>,
    parent_provider: Arc<dyn ParentSideJoinConditionStoreProvider>,
}

impl std::fmt::Debug for RmlMapperBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RmlMapperBuilder")
            .field("triples_maps", &self.triples_maps.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for RmlMapperBuilder {
    fn default() -> Self {
        Self {
            config: MapperConfig::default(),
            triples_maps: Vec::new(),
            functions: FunctionRegistry::new(),
            decoders: DecoderRegistry::with_defaults(),
            resolvers: CompositeResolver::new(),
            child_provider: Arc::new(MemoryChildStoreProvider),
            parent_provider: Arc::new(MemoryParentStoreProvider),
        }
    }
}

impl RmlMapperBuilder {
    /// Starts a builder with default configuration and the built-in
    /// decoders.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the mapper configuration.
    #[must_use]
    pub fn with_config(mut self, config: MapperConfig) -> Self {
        self.config = config;
        self
    }

    /// Adds pre-built triples maps.
    #[must_use]
    pub fn with_triples_maps(mut self, maps: Vec<TriplesMap>) -> Self {
        self.triples_maps.extend(maps);
        self
    }

    /// Loads triples maps from a mapping graph.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the graph describes malformed
    /// entities.
    pub fn with_mapping_graph(mut self, graph: &MappingGraph) -> Result<Self> {
        self.triples_maps.extend(loader::load(graph)?);
        Ok(self)
    }

    /// Parses a mapping document and loads its triples maps.
    ///
    /// # Errors
    ///
    /// Returns an error when the document does not parse or describes
    /// malformed entities.
    pub fn with_mapping(self, input: &str, format: RdfFormat) -> Result<Self> {
        let graph = MappingGraph::parse(input, format)?;
        self.with_mapping_graph(&graph)
    }

    /// Registers a user-defined function.
    #[must_use]
    pub fn with_function<F>(mut self, iri: impl Into<String>, function: F) -> Self
    where
        F: Fn(&FunctionArgs) -> Result<Vec<Term>> + Send + Sync + 'static,
    {
        self.functions.register(iri, function);
        self
    }

    /// Registers a decoder factory for a reference formulation.
    #[must_use]
    pub fn with_decoder<F: DecoderFactory + 'static>(
        mut self,
        formulation: impl Into<String>,
        factory: F,
    ) -> Self {
        self.decoders.register(formulation, factory);
        self
    }

    /// Appends a source resolver; resolvers are tried in insertion order.
    #[must_use]
    pub fn with_source_resolver<R: SourceResolver + 'static>(mut self, resolver: R) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Replaces the child-side join store provider.
    #[must_use]
    pub fn with_child_store_provider(
        mut self,
        provider: Arc<dyn ChildSideJoinStoreProvider>,
    ) -> Self {
        self.child_provider = provider;
        self
    }

    /// Replaces the parent-side join condition store provider.
    #[must_use]
    pub fn with_parent_store_provider(
        mut self,
        provider: Arc<dyn ParentSideJoinConditionStoreProvider>,
    ) -> Self {
        self.parent_provider = provider;
        self
    }

    /// Validates the configuration and compiles the mapper.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no mappable triples map exists,
    /// a referenced reference formulation has no registered decoder, or a
    /// term map fails to compile (e.g. an unregistered function IRI).
    pub fn build(self) -> Result<RmlMapper> {
        if self.triples_maps.is_empty() {
            return Err(RmlError::Configuration(
                "mapping defines no triples maps".to_string(),
            ));
        }

        let mut mappable = Vec::new();
        for map in self.triples_maps {
            if map.is_mappable() {
                mappable.push(map);
            } else {
                warn!(map = %map.id(), "triples map has no subject source; skipped");
            }
        }
        if mappable.is_empty() {
            return Err(RmlError::Configuration(
                "mapping defines no mappable triples maps".to_string(),
            ));
        }

        for map in &mappable {
            let formulation = &map.logical_source.reference_formulation;
            if !self.decoders.contains(formulation) {
                return Err(RmlError::Configuration(format!(
                    "no decoder registered for reference formulation <{formulation}> \
                     required by {}",
                    map.id()
                )));
            }
        }

        let options = GeneratorOptions {
            normalization_form: self.config.normalization_form,
            upper_case_percent_encoding: self.config.iri_upper_case_percent_encoding,
            base_iri: self.config.base_iri.clone(),
            functions: self.functions,
        };

        // Compile everything once so malformed term maps and unregistered
        // functions fail the build, not the run.
        compile_pipelines(&mappable, &options)?;

        Ok(RmlMapper {
            config: self.config,
            options,
            maps: mappable,
            decoders: self.decoders,
            resolvers: Arc::new(self.resolvers),
            child_provider: self.child_provider,
            parent_provider: self.parent_provider,
        })
    }
}

/// Executes a compiled mapping over resolved sources.
pub struct RmlMapper {
    config: MapperConfig,
    options: GeneratorOptions,
    maps: Vec<TriplesMap>,
    decoders: DecoderRegistry,
    resolvers: Arc<CompositeResolver>,
    child_provider: Arc<dyn ChildSideJoinStoreProvider>,
    parent_provider: Arc<dyn ParentSideJoinConditionStoreProvider>,
}

impl std::fmt::Debug for RmlMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RmlMapper")
            .field("triples_maps", &self.maps.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RmlMapper {
    /// Starts a builder.
    #[must_use]
    pub fn builder() -> RmlMapperBuilder {
        RmlMapperBuilder::new()
    }

    /// The mappable triples maps of this mapper.
    #[must_use]
    pub fn triples_maps(&self) -> &[TriplesMap] {
        &self.maps
    }

    /// Maps all sources, resolving references through the configured
    /// resolvers.
    ///
    /// # Errors
    ///
    /// Fails eagerly when a source cannot be resolved or a decoder cannot
    /// be constructed; per-pipeline failures arrive through the iterator.
    pub fn map(&self) -> Result<StatementIter> {
        self.run(HashMap::new(), None)
    }

    /// Maps a restricted set of triples maps, selected by resource IRI.
    ///
    /// # Errors
    ///
    /// Fails when the filter selects no triples map, or as
    /// [`map`](Self::map).
    pub fn map_filtered<I, S>(&self, filter: I) -> Result<StatementIter>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let filter: HashSet<String> = filter.into_iter().map(Into::into).collect();
        self.run(HashMap::new(), Some(&filter))
    }

    /// Maps with the single unnamed input stream bound to `input`.
    ///
    /// # Errors
    ///
    /// Fails as [`map`](Self::map), or when reading `input` fails.
    pub fn map_with_input<R: Read>(&self, mut input: R) -> Result<StatementIter> {
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        let mut inputs = HashMap::new();
        inputs.insert(String::new(), bytes);
        self.run(inputs, None)
    }

    /// Maps with named input streams bound by logical name.
    ///
    /// # Errors
    ///
    /// Fails as [`map`](Self::map).
    pub fn map_with_named_inputs(
        &self,
        inputs: HashMap<String, Vec<u8>>,
    ) -> Result<StatementIter> {
        self.run(inputs, None)
    }

    /// Maps named inputs restricted to a set of triples maps.
    ///
    /// # Errors
    ///
    /// Fails as [`map_filtered`](Self::map_filtered).
    pub fn map_with_named_inputs_filtered<I, S>(
        &self,
        inputs: HashMap<String, Vec<u8>>,
        filter: I,
    ) -> Result<StatementIter>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let filter: HashSet<String> = filter.into_iter().map(Into::into).collect();
        self.run(inputs, Some(&filter))
    }

    /// Evaluates the term generators against a single caller-provided
    /// record, without a decoder. Referencing object maps are skipped:
    /// joins require full source runs.
    ///
    /// # Errors
    ///
    /// Fails on fatal term errors in strict mode.
    pub fn map_item(&self, record: &dyn SourceRecord) -> Result<Vec<Statement>> {
        self.map_item_internal(record, None)
    }

    /// [`map_item`](Self::map_item) restricted to a set of triples maps.
    ///
    /// # Errors
    ///
    /// Fails when the filter selects no triples map, or as
    /// [`map_item`](Self::map_item).
    pub fn map_item_filtered<I, S>(
        &self,
        record: &dyn SourceRecord,
        filter: I,
    ) -> Result<Vec<Statement>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let filter: HashSet<String> = filter.into_iter().map(Into::into).collect();
        self.map_item_internal(record, Some(&filter))
    }

    /// Runs [`map`](Self::map) and collects the stream into a graph,
    /// bounded by the configured timeout.
    ///
    /// Statements in named graphs are collected with their graph
    /// discarded; the engine does not deduplicate, the graph keeps every
    /// statement.
    ///
    /// # Errors
    ///
    /// Fails with a mapping timeout error when the deadline passes, and
    /// propagates the first pipeline error otherwise.
    pub fn map_to_graph(&self) -> Result<MappingGraph> {
        self.collect_with_timeout(self.map()?)
    }

    /// [`map_to_graph`](Self::map_to_graph) with named input streams.
    ///
    /// # Errors
    ///
    /// As [`map_to_graph`](Self::map_to_graph).
    pub fn map_to_graph_with_named_inputs(
        &self,
        inputs: HashMap<String, Vec<u8>>,
    ) -> Result<MappingGraph> {
        self.collect_with_timeout(self.map_with_named_inputs(inputs)?)
    }

    fn collect_with_timeout(&self, iter: StatementIter) -> Result<MappingGraph> {
        let deadline = Instant::now() + self.config.map_to_graph_timeout;
        let mut graph = MappingGraph::new();
        loop {
            match iter.receiver.recv_deadline(deadline) {
                Ok(Ok(statement)) => graph.add_statement(statement),
                Ok(Err(error)) => return Err(error),
                Err(RecvTimeoutError::Timeout) => {
                    iter.cancel.store(true, Ordering::Relaxed);
                    return Err(RmlError::MappingTimeout(self.config.map_to_graph_timeout));
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        Ok(graph)
    }

    fn map_item_internal(
        &self,
        record: &dyn SourceRecord,
        filter: Option<&HashSet<String>>,
    ) -> Result<Vec<Statement>> {
        let maps = self.filtered_maps(filter)?;
        let pipelines = compile_pipelines(&maps, &self.options)?;
        let engine = JoinEngine::in_memory();

        let mut statements = Vec::new();
        for pipeline in &pipelines {
            for mapper in &pipeline.mappers {
                statements.extend(mapper.process_record(record, &engine, self.config.strict)?);
            }
        }
        Ok(statements)
    }

    fn run(
        &self,
        inputs: HashMap<String, Vec<u8>>,
        filter: Option<&HashSet<String>>,
    ) -> Result<StatementIter> {
        let maps = self.filtered_maps(filter)?;
        let pipelines = compile_pipelines(&maps, &self.options)?;
        let sequencer = Arc::new(Sequencer::new());

        let mut runs = Vec::new();
        for pipeline in pipelines {
            let label = match &pipeline.source.source {
                SourceRef::Reference(reference) => reference.clone(),
                SourceRef::Stream(Some(name)) => name.clone(),
                SourceRef::Stream(None) => "<unnamed stream>".to_string(),
            };
            let stream = self.resolve_source(&inputs, &pipeline.source.source)?;
            let factory = self.decoders.get(&pipeline.source.reference_formulation)?;
            let decoder = factory.create(
                stream,
                pipeline.source.iterator.as_deref(),
                Arc::clone(&sequencer),
            )?;
            runs.push(PipelineRun {
                label,
                decoder,
                mappers: pipeline.mappers,
            });
        }

        debug!(pipelines = runs.len(), "starting mapper run");

        let engine = Arc::new(JoinEngine::new(
            Arc::clone(&self.child_provider),
            Arc::clone(&self.parent_provider),
        ));
        let (sender, receiver) = bounded(self.config.channel_capacity.max(1));
        let cancel = Arc::new(AtomicBool::new(false));
        spawn_pipelines(
            runs,
            engine,
            self.config.strict,
            self.config.continue_on_error,
            self.config.channel_capacity,
            sender,
            Arc::clone(&cancel),
        );

        Ok(StatementIter { receiver, cancel })
    }

    fn filtered_maps(&self, filter: Option<&HashSet<String>>) -> Result<Vec<TriplesMap>> {
        let maps: Vec<TriplesMap> = match filter {
            None => self.maps.clone(),
            Some(filter) => self
                .maps
                .iter()
                .filter(|map| filter.contains(&map.id()))
                .cloned()
                .collect(),
        };
        if maps.is_empty() {
            return Err(RmlError::Configuration(
                "filter selects no triples maps".to_string(),
            ));
        }
        Ok(maps)
    }

    fn resolve_source(
        &self,
        inputs: &HashMap<String, Vec<u8>>,
        source: &SourceRef,
    ) -> Result<ByteStream> {
        let name = source.name();
        if let Some(bytes) = inputs.get(name) {
            return Ok(Box::new(std::io::Cursor::new(bytes.clone())));
        }
        match source {
            SourceRef::Stream(_) => Err(RmlError::SourceResolution(format!(
                "no input stream bound for '{name}'"
            ))),
            SourceRef::Reference(reference) => self
                .resolvers
                .resolve(reference)?
                .ok_or_else(|| RmlError::SourceResolution(reference.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RdfFormat;

    const MAPPING: &str = r#"
        @prefix rr: <http://www.w3.org/ns/r2rml#> .
        @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
        @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
        @prefix carml: <http://carml.taxonic.com/carml/> .
        @prefix ex: <http://example.org/> .

        ex:PersonMap
            rml:logicalSource [
                rml:source [ a carml:Stream ; carml:streamName "people" ] ;
                rml:referenceFormulation ql:CSV
            ] ;
            rr:subjectMap [ rr:template "http://example.org/{a}" ] ;
            rr:predicateObjectMap [
                rr:predicate ex:p ;
                rr:objectMap [ rml:reference "b" ]
            ] .
    "#;

    fn mapper() -> RmlMapper {
        RmlMapper::builder()
            .with_mapping(MAPPING, RdfFormat::Turtle)
            .expect("mapping load failed")
            .build()
            .expect("build failed")
    }

    fn named_inputs(csv: &str) -> HashMap<String, Vec<u8>> {
        let mut inputs = HashMap::new();
        inputs.insert("people".to_string(), csv.as_bytes().to_vec());
        inputs
    }

    #[test]
    fn test_map_with_named_inputs() {
        let mapper = mapper();
        let statements: Vec<Statement> = mapper
            .map_with_named_inputs(named_inputs("a,b\n1,2\n3,4\n"))
            .expect("map failed")
            .collect::<Result<_>>()
            .expect("stream failed");

        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0],
            Statement::new(
                Term::iri("http://example.org/1"),
                Term::iri("http://example.org/p"),
                Term::literal("2"),
            )
        );
        assert_eq!(
            statements[1],
            Statement::new(
                Term::iri("http://example.org/3"),
                Term::iri("http://example.org/p"),
                Term::literal("4"),
            )
        );
    }

    #[test]
    fn test_unbound_stream_fails_resolution() {
        let mapper = mapper();
        assert!(matches!(
            mapper.map(),
            Err(RmlError::SourceResolution(_))
        ));
    }

    #[test]
    fn test_empty_source_yields_empty_output() {
        let mapper = mapper();
        let statements: Vec<Statement> = mapper
            .map_with_named_inputs(named_inputs("a,b\n"))
            .expect("map failed")
            .collect::<Result<_>>()
            .expect("stream failed");
        assert!(statements.is_empty());
    }

    #[test]
    fn test_map_to_graph_collects() {
        let mapper = mapper();
        let graph = mapper
            .map_to_graph_with_named_inputs(named_inputs("a,b\n1,2\n"))
            .expect("map_to_graph failed");
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_no_mappable_maps_is_configuration_error() {
        let input = r#"
            @prefix rr: <http://www.w3.org/ns/r2rml#> .
            @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
            @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
            @prefix ex: <http://example.org/> .

            ex:Empty
                rml:logicalSource [ rml:source "x.csv" ; rml:referenceFormulation ql:CSV ] ;
                rr:predicateObjectMap [ rr:predicate ex:p ; rr:object ex:o ] .
        "#;
        let result = RmlMapper::builder()
            .with_mapping(input, RdfFormat::Turtle)
            .expect("mapping load failed")
            .build();
        assert!(matches!(result, Err(RmlError::Configuration(_))));
    }

    #[test]
    fn test_missing_decoder_is_configuration_error() {
        let input = r#"
            @prefix rr: <http://www.w3.org/ns/r2rml#> .
            @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
            @prefix ex: <http://example.org/> .

            ex:M
                rml:logicalSource [
                    rml:source "x.bin" ;
                    rml:referenceFormulation ex:CustomFormat
                ] ;
                rr:subjectMap [ rr:template "http://example.org/{id}" ] .
        "#;
        let result = RmlMapper::builder()
            .with_mapping(input, RdfFormat::Turtle)
            .expect("mapping load failed")
            .build();
        assert!(matches!(result, Err(RmlError::Configuration(_))));
    }

    #[test]
    fn test_map_item() {
        let mapper = mapper();
        let mut record = crate::record::FieldRecord::new(0);
        record.push("a", "9");
        record.push("b", "x");
        let statements = mapper.map_item(&record).expect("map_item failed");
        assert_eq!(statements.len(), 1);
        assert_eq!(statements[0].subject, Term::iri("http://example.org/9"));
    }

    #[test]
    fn test_filter_selecting_nothing_is_error() {
        let mapper = mapper();
        assert!(matches!(
            mapper.map_filtered(["http://example.org/Nope"]),
            Err(RmlError::Configuration(_))
        ));
    }
}
