//! Logical source pipelines.
//!
//! One pipeline exists per distinct logical source. A producer thread
//! owns the decoder and fans each record out to every subscribed triples
//! mapper over bounded channels; one consumer thread per mapper evaluates
//! records in arrival order and pushes statements to the shared output
//! channel. Blocking sends into the slowest mapper's buffer throttle the
//! decoder.
//!
//! Referencing object maps never emit inline: child rows and parent
//! subjects are routed to the join engine, which emits the deferred
//! statements after every pipeline has completed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Sender};
use tracing::{debug, warn};

use crate::error::{Result, RmlError};
use crate::formats::{RecordDecoder, SharedRecord};
use crate::generator::{
    compile_graph_map, compile_object_map, compile_predicate_map, compile_subject_map,
    GeneratorOptions, TermGenerator,
};
use crate::join::{ChildRow, JoinEngine, JoinKey, JoinSlotId};
use crate::model::{LogicalSource, ObjectEntry, TriplesMap};
use crate::record::SourceRecord;
use crate::term::{Statement, Term};
use crate::vocab::{rr, RDF_TYPE};

/// The child side of one referencing object map.
#[derive(Debug)]
pub(crate) struct CompiledRefObjectMap {
    slot: JoinSlotId,
    child_expressions: Vec<String>,
}

/// A compiled predicate-object map.
#[derive(Debug)]
pub(crate) struct CompiledPom {
    predicates: Vec<TermGenerator>,
    objects: Vec<TermGenerator>,
    refs: Vec<CompiledRefObjectMap>,
    graphs: Vec<TermGenerator>,
}

/// A parent-side join registration this triples map must perform for a
/// referencing object map elsewhere in the mapping.
#[derive(Debug)]
pub(crate) struct ParentRegistration {
    slot: JoinSlotId,
    expressions: Vec<String>,
}

/// A triples map compiled to term generators, ready for record
/// evaluation.
#[derive(Debug)]
pub(crate) struct CompiledTriplesMap {
    id: String,
    subject: TermGenerator,
    classes: Vec<Term>,
    subject_graphs: Vec<TermGenerator>,
    poms: Vec<CompiledPom>,
    parent_registrations: Vec<ParentRegistration>,
}

/// All triples maps sharing one logical source.
#[derive(Debug)]
pub(crate) struct CompiledPipeline {
    pub source: LogicalSource,
    pub mappers: Vec<Arc<CompiledTriplesMap>>,
}

/// Compiles mappable triples maps and groups them into pipelines by
/// logical source value. This is the pure phase: no I/O happens here.
pub(crate) fn compile_pipelines(
    maps: &[TriplesMap],
    options: &GeneratorOptions,
) -> Result<Vec<CompiledPipeline>> {
    let mut compiled: Vec<CompiledTriplesMap> = Vec::with_capacity(maps.len());
    for map in maps {
        compiled.push(compile_triples_map(map, options)?);
    }

    // Parent-side registrations: every referencing object map obliges its
    // parent triples map to index generated subjects by join values.
    for map in maps {
        for pom in &map.predicate_object_maps {
            for object in &pom.objects {
                let ObjectEntry::Ref(rom) = object else {
                    continue;
                };
                let Some(parent_index) = maps
                    .iter()
                    .position(|m| m.resource == rom.parent_triples_map)
                else {
                    return Err(RmlError::Configuration(format!(
                        "parent triples map {} is not part of this mapper",
                        rom.parent_triples_map
                    )));
                };
                if rom.join_conditions.is_empty()
                    && maps[parent_index].logical_source != map.logical_source
                {
                    warn!(
                        ref_object_map = %rom.resource,
                        "referencing object map without join conditions over a \
                         different logical source matches nothing"
                    );
                    continue;
                }
                compiled[parent_index]
                    .parent_registrations
                    .push(ParentRegistration {
                        slot: join_slot(rom.resource.to_string(), &rom.parent_triples_map),
                        expressions: rom
                            .join_conditions
                            .iter()
                            .map(|jc| jc.parent.clone())
                            .collect(),
                    });
            }
        }
    }

    let mut pipelines: Vec<CompiledPipeline> = Vec::new();
    for (map, mapper) in maps.iter().zip(compiled) {
        let mapper = Arc::new(mapper);
        match pipelines
            .iter_mut()
            .find(|pipeline| pipeline.source == map.logical_source)
        {
            Some(pipeline) => pipeline.mappers.push(mapper),
            None => pipelines.push(CompiledPipeline {
                source: map.logical_source.clone(),
                mappers: vec![mapper],
            }),
        }
    }

    debug!(
        pipelines = pipelines.len(),
        mappers = maps.len(),
        "compiled pipelines"
    );
    Ok(pipelines)
}

fn compile_triples_map(
    map: &TriplesMap,
    options: &GeneratorOptions,
) -> Result<CompiledTriplesMap> {
    let subject = compile_subject_map(&map.subject_map, options)?;

    let mut subject_graphs = Vec::new();
    for graph_map in &map.subject_map.graph_maps {
        subject_graphs.push(compile_graph_map(graph_map, options)?);
    }

    let mut poms = Vec::new();
    for pom in &map.predicate_object_maps {
        let mut predicates = Vec::new();
        for pm in &pom.predicate_maps {
            predicates.push(compile_predicate_map(pm, options)?);
        }

        let mut objects = Vec::new();
        let mut refs = Vec::new();
        for object in &pom.objects {
            match object {
                ObjectEntry::Map(om) => objects.push(compile_object_map(om, options)?),
                ObjectEntry::Ref(rom) => refs.push(CompiledRefObjectMap {
                    slot: join_slot(rom.resource.to_string(), &rom.parent_triples_map),
                    child_expressions: rom
                        .join_conditions
                        .iter()
                        .map(|jc| jc.child.clone())
                        .collect(),
                }),
            }
        }

        let mut graphs = Vec::new();
        for graph_map in &pom.graph_maps {
            graphs.push(compile_graph_map(graph_map, options)?);
        }

        poms.push(CompiledPom {
            predicates,
            objects,
            refs,
            graphs,
        });
    }

    Ok(CompiledTriplesMap {
        id: map.id(),
        subject,
        classes: map.subject_map.classes.clone(),
        subject_graphs,
        poms,
        parent_registrations: Vec::new(),
    })
}

fn join_slot(ref_object_map: String, parent: &Term) -> JoinSlotId {
    JoinSlotId {
        ref_object_map,
        parent_map: parent.to_string(),
    }
}

impl CompiledTriplesMap {
    /// Evaluates one record: emits this record's statements and routes
    /// join rows and registrations into the engine.
    ///
    /// `rdf:type` statements for a subject precede its predicate-object
    /// statements.
    pub(crate) fn process_record(
        &self,
        record: &dyn SourceRecord,
        engine: &JoinEngine,
        strict: bool,
    ) -> Result<Vec<Statement>> {
        let subjects = self.eval(&self.subject, record, strict)?;
        if subjects.is_empty() {
            return Ok(Vec::new());
        }

        let mut subject_graphs: Vec<Option<Term>> = Vec::new();
        for generator in &self.subject_graphs {
            for term in self.eval(generator, record, strict)? {
                subject_graphs.push(graph_context(term));
            }
        }

        let mut statements = Vec::new();

        let type_graphs: &[Option<Term>] = if subject_graphs.is_empty() {
            &[None]
        } else {
            &subject_graphs
        };
        for subject in &subjects {
            for class in &self.classes {
                for graph in type_graphs {
                    statements.push(Statement::new_in_graph(
                        subject.clone(),
                        Term::iri(RDF_TYPE),
                        class.clone(),
                        graph.clone(),
                    ));
                }
            }
        }

        for pom in &self.poms {
            let mut predicates = Vec::new();
            for generator in &pom.predicates {
                predicates.extend(self.eval(generator, record, strict)?);
            }
            if predicates.is_empty() {
                continue;
            }

            let mut graphs = subject_graphs.clone();
            for generator in &pom.graphs {
                for term in self.eval(generator, record, strict)? {
                    graphs.push(graph_context(term));
                }
            }
            if graphs.is_empty() {
                graphs.push(None);
            }

            let mut objects = Vec::new();
            for generator in &pom.objects {
                objects.extend(self.eval(generator, record, strict)?);
            }

            for subject in &subjects {
                for predicate in &predicates {
                    for object in &objects {
                        for graph in &graphs {
                            statements.push(Statement::new_in_graph(
                                subject.clone(),
                                predicate.clone(),
                                object.clone(),
                                graph.clone(),
                            ));
                        }
                    }
                }
            }

            for rom in &pom.refs {
                // A join expression with no value drops the row.
                let Some(key) = eval_join_key(&rom.child_expressions, record) else {
                    continue;
                };
                engine.push_child(
                    &rom.slot,
                    ChildRow {
                        subjects: subjects.clone(),
                        predicates: predicates.clone(),
                        graphs: graphs.clone(),
                        key,
                    },
                )?;
            }
        }

        for registration in &self.parent_registrations {
            let Some(key) = eval_join_key(&registration.expressions, record) else {
                continue;
            };
            engine.register_parent(&registration.slot, &key, &subjects)?;
        }

        Ok(statements)
    }

    fn eval(
        &self,
        generator: &TermGenerator,
        record: &dyn SourceRecord,
        strict: bool,
    ) -> Result<Vec<Term>> {
        match generator.generate(record) {
            Ok(terms) => Ok(terms),
            Err(e @ (RmlError::TermGeneration(_) | RmlError::FunctionEvaluation { .. }))
                if !strict =>
            {
                warn!(map = %self.id, error = %e, "term treated as absent");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

/// A generated graph term as an output context; the `rr:defaultGraph`
/// constant selects the default graph.
fn graph_context(term: Term) -> Option<Term> {
    if term.as_iri() == Some(rr::DEFAULT_GRAPH) {
        None
    } else {
        Some(term)
    }
}

fn eval_join_key(expressions: &[String], record: &dyn SourceRecord) -> Option<JoinKey> {
    let mut key = Vec::with_capacity(expressions.len());
    for expression in expressions {
        let Some(values) = record.lookup(expression) else {
            // a data error: the row is dropped, the run continues
            warn!(expression = %expression, "join expression does not resolve; row dropped");
            return None;
        };
        if values.is_empty() {
            return None;
        }
        key.push(values);
    }
    Some(key)
}

/// One pipeline bound to a decoder, ready to run.
pub(crate) struct PipelineRun {
    pub label: String,
    pub decoder: Box<dyn RecordDecoder>,
    pub mappers: Vec<Arc<CompiledTriplesMap>>,
}

/// Spawns all pipelines plus a coordinator that performs the join phase
/// and closes the output channel when everything has completed.
///
/// Cancellation: consumers observe the shared flag and the output channel
/// disconnect; producers observe closed mapper channels. Dropping the
/// receiving end of `output` therefore winds down every thread.
pub(crate) fn spawn_pipelines(
    runs: Vec<PipelineRun>,
    engine: Arc<JoinEngine>,
    strict: bool,
    continue_on_error: bool,
    capacity: usize,
    output: Sender<Result<Statement>>,
    cancel: Arc<AtomicBool>,
) {
    let mut producers = Vec::new();
    let mut consumers = Vec::new();

    for run in runs {
        let mut senders: Vec<Sender<SharedRecord>> = Vec::new();

        for mapper in run.mappers {
            let (tx, rx) = bounded::<SharedRecord>(capacity.max(1));
            senders.push(tx);

            let engine = Arc::clone(&engine);
            let output = output.clone();
            let cancel = Arc::clone(&cancel);
            consumers.push(thread::spawn(move || {
                for record in rx {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    match mapper.process_record(record.as_ref(), &engine, strict) {
                        Ok(statements) => {
                            let mut disconnected = false;
                            for statement in statements {
                                if output.send(Ok(statement)).is_err() {
                                    disconnected = true;
                                    break;
                                }
                            }
                            if disconnected {
                                break;
                            }
                        }
                        Err(error) => {
                            if !continue_on_error {
                                cancel.store(true, Ordering::Relaxed);
                            }
                            let _ = output.send(Err(error));
                            break;
                        }
                    }
                }
            }));
        }

        let output = output.clone();
        let cancel = Arc::clone(&cancel);
        let label = run.label;
        let mut decoder = run.decoder;
        producers.push(thread::spawn(move || {
            debug!(source = %label, "pipeline started");
            loop {
                if cancel.load(Ordering::Relaxed) {
                    break;
                }
                match decoder.next_record() {
                    Ok(Some(record)) => {
                        let mut any_delivered = false;
                        for sender in &senders {
                            if sender.send(Arc::clone(&record)).is_ok() {
                                any_delivered = true;
                            }
                        }
                        if !any_delivered {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(error) => {
                        // Fatal to this pipeline only; siblings keep
                        // running when continue-on-error is set.
                        let error = RmlError::Decoder {
                            source_name: label.clone(),
                            message: error.to_string(),
                        };
                        if !continue_on_error {
                            cancel.store(true, Ordering::Relaxed);
                        }
                        let _ = output.send(Err(error));
                        break;
                    }
                }
            }
            debug!(source = %label, "pipeline finished");
        }));
    }

    // Coordinator: wait for all sides, then join and close the stream.
    thread::spawn(move || {
        for producer in producers {
            let _ = producer.join();
        }
        for consumer in consumers {
            let _ = consumer.join();
        }
        if !cancel.load(Ordering::Relaxed) {
            match engine.complete() {
                Ok(statements) => {
                    for statement in statements {
                        if output.send(Ok(statement)).is_err() {
                            break;
                        }
                    }
                }
                Err(error) => {
                    let _ = output.send(Err(error));
                }
            }
        }
    });
}
