//! Serializing the mapping model back to an RDF graph.
//!
//! The inverse of the [`loader`](crate::loader): every entity emits
//! `rdf:type` plus its non-default attributes, rooted at its resource.
//! Blank node resources are regenerated deterministically in traversal
//! order, so serializing the same model twice yields the same triples and
//! `serialize(load(g))` is stable across load/serialize cycles.

use std::collections::HashMap;

use crate::graph::MappingGraph;
use crate::model::{
    FunctionMap, GraphMap, ObjectEntry, ObjectMap, PredicateObjectMap, SourceRef, SubjectMap,
    TermMapSpec, TermType, TriplesMap,
};
use crate::term::Term;
use crate::vocab::{carml, fnml, fno, rml, rr, RDF_TYPE};

/// Serializes a set of triples maps to a mapping graph.
#[must_use]
pub fn serialize(maps: &[TriplesMap]) -> MappingGraph {
    Serializer::new(maps).run()
}

struct Serializer<'m> {
    maps: &'m [TriplesMap],
    graph: MappingGraph,
    counter: usize,
    /// Fresh labels for blank triples map resources, shared so that
    /// rr:parentTriplesMap references stay aligned.
    map_labels: HashMap<String, String>,
}

impl<'m> Serializer<'m> {
    fn new(maps: &'m [TriplesMap]) -> Self {
        let mut counter = 0;
        let mut map_labels = HashMap::new();
        for map in maps {
            if let Term::BlankNode(label) = &map.resource {
                map_labels
                    .entry(label.clone())
                    .or_insert_with(|| {
                        let fresh = format!("b{counter}");
                        counter += 1;
                        fresh
                    });
            }
        }
        Self {
            maps,
            graph: MappingGraph::new(),
            counter,
            map_labels,
        }
    }

    fn run(mut self) -> MappingGraph {
        for map in self.maps {
            self.emit_triples_map(map);
        }
        self.graph
    }

    /// A fresh blank node, allocated in traversal order.
    fn fresh_blank(&mut self) -> Term {
        let term = Term::blank(format!("b{}", self.counter));
        self.counter += 1;
        term
    }

    /// The output resource for a triples map: IRIs pass through, blank
    /// labels are rewritten through the shared label table.
    fn map_resource(&self, resource: &Term) -> Term {
        match resource {
            Term::BlankNode(label) => self
                .map_labels
                .get(label)
                .map_or_else(|| resource.clone(), |fresh| Term::blank(fresh.clone())),
            other => other.clone(),
        }
    }

    /// The output resource for a nested entity: IRIs pass through, blank
    /// resources get a fresh deterministic label.
    fn entity_resource(&mut self, resource: &Term) -> Term {
        match resource {
            Term::BlankNode(_) => self.fresh_blank(),
            other => other.clone(),
        }
    }

    fn add(&mut self, s: &Term, p: &str, o: Term) {
        self.graph.add(s.clone(), Term::iri(p), o);
    }

    fn emit_triples_map(&mut self, map: &TriplesMap) {
        let tm = self.map_resource(&map.resource);
        self.add(&tm, RDF_TYPE, Term::iri(rr::TRIPLES_MAP));

        let ls = self.entity_resource(&map.logical_source.resource);
        self.add(&tm, rml::LOGICAL_SOURCE, ls.clone());
        self.add(&ls, RDF_TYPE, Term::iri(rml::LOGICAL_SOURCE_CLASS));
        match &map.logical_source.source {
            SourceRef::Reference(reference) => {
                self.add(&ls, rml::SOURCE, Term::literal(reference.clone()));
            }
            SourceRef::Stream(name) => {
                let stream = self.fresh_blank();
                self.add(&ls, rml::SOURCE, stream.clone());
                self.add(&stream, RDF_TYPE, Term::iri(carml::STREAM));
                if let Some(name) = name {
                    self.add(&stream, carml::STREAM_NAME, Term::literal(name.clone()));
                }
            }
        }
        self.add(
            &ls,
            rml::REFERENCE_FORMULATION,
            Term::iri(map.logical_source.reference_formulation.clone()),
        );
        if let Some(iterator) = &map.logical_source.iterator {
            self.add(&ls, rml::ITERATOR, Term::literal(iterator.clone()));
        }

        self.emit_subject_map(&tm, &map.subject_map);

        for pom in &map.predicate_object_maps {
            self.emit_predicate_object_map(&tm, pom);
        }
    }

    fn emit_subject_map(&mut self, tm: &Term, subject_map: &SubjectMap) {
        if subject_map.spec.is_empty() && subject_map.classes.is_empty() {
            return;
        }
        let sm = self.entity_resource(&subject_map.resource);
        self.add(tm, rr::SUBJECT_MAP, sm.clone());
        self.add(&sm, RDF_TYPE, Term::iri(rr::SUBJECT_MAP_CLASS));
        self.emit_spec(&sm, &subject_map.spec);
        if let Some(term_type) = subject_map.term_type {
            self.emit_term_type(&sm, term_type);
        }
        for class in &subject_map.classes {
            self.add(&sm, rr::CLASS, class.clone());
        }
        for graph_map in &subject_map.graph_maps {
            self.emit_graph_map(&sm, graph_map);
        }
    }

    fn emit_predicate_object_map(&mut self, tm: &Term, pom: &PredicateObjectMap) {
        let node = self.entity_resource(&pom.resource);
        self.add(tm, rr::PREDICATE_OBJECT_MAP, node.clone());
        self.add(&node, RDF_TYPE, Term::iri(rr::PREDICATE_OBJECT_MAP_CLASS));

        for pm in &pom.predicate_maps {
            let pm_node = self.entity_resource(&pm.resource);
            self.add(&node, rr::PREDICATE_MAP, pm_node.clone());
            self.add(&pm_node, RDF_TYPE, Term::iri(rr::PREDICATE_MAP_CLASS));
            self.emit_spec(&pm_node, &pm.spec);
        }

        for object in &pom.objects {
            match object {
                ObjectEntry::Map(om) => self.emit_object_map(&node, om),
                ObjectEntry::Ref(rom) => {
                    let rom_node = self.entity_resource(&rom.resource);
                    self.add(&node, rr::OBJECT_MAP, rom_node.clone());
                    self.add(&rom_node, RDF_TYPE, Term::iri(rr::REF_OBJECT_MAP_CLASS));
                    let parent = self.map_resource(&rom.parent_triples_map);
                    self.add(&rom_node, rr::PARENT_TRIPLES_MAP, parent);
                    for jc in &rom.join_conditions {
                        let jc_node = self.fresh_blank();
                        self.add(&rom_node, rr::JOIN_CONDITION, jc_node.clone());
                        self.add(&jc_node, RDF_TYPE, Term::iri(rr::JOIN));
                        self.add(&jc_node, rr::CHILD, Term::literal(jc.child.clone()));
                        self.add(&jc_node, rr::PARENT, Term::literal(jc.parent.clone()));
                    }
                }
            }
        }

        for graph_map in &pom.graph_maps {
            self.emit_graph_map(&node, graph_map);
        }
    }

    fn emit_object_map(&mut self, pom: &Term, om: &ObjectMap) {
        let node = self.entity_resource(&om.resource);
        self.add(pom, rr::OBJECT_MAP, node.clone());
        self.add(&node, RDF_TYPE, Term::iri(rr::OBJECT_MAP_CLASS));
        self.emit_spec(&node, &om.spec);
        if let Some(term_type) = om.term_type {
            self.emit_term_type(&node, term_type);
        }
        if let Some(datatype) = &om.datatype {
            self.add(&node, rr::DATATYPE, datatype.clone());
        }
        if let Some(language) = &om.language {
            self.add(&node, rr::LANGUAGE, Term::literal(language.clone()));
        }
    }

    fn emit_graph_map(&mut self, owner: &Term, graph_map: &GraphMap) {
        let node = self.entity_resource(&graph_map.resource);
        self.add(owner, rr::GRAPH_MAP, node.clone());
        self.add(&node, RDF_TYPE, Term::iri(rr::GRAPH_MAP_CLASS));
        self.emit_spec(&node, &graph_map.spec);
    }

    fn emit_spec(&mut self, node: &Term, spec: &TermMapSpec) {
        if let Some(constant) = &spec.constant {
            self.add(node, rr::CONSTANT, constant.clone());
        }
        if let Some(reference) = &spec.reference {
            self.add(node, rml::REFERENCE, Term::literal(reference.clone()));
        }
        if let Some(template) = &spec.template {
            self.add(node, rr::TEMPLATE, Term::literal(template.to_string()));
        }
        if let Some(function) = &spec.function {
            self.emit_function_map(node, function);
        }
    }

    fn emit_function_map(&mut self, owner: &Term, function: &FunctionMap) {
        let node = self.entity_resource(&function.resource);
        self.add(owner, fnml::FUNCTION_VALUE, node.clone());
        self.add(&node, RDF_TYPE, Term::iri(fnml::FUNCTION_TERM_MAP));

        let executes_pom = self.fresh_blank();
        self.add(&node, rr::PREDICATE_OBJECT_MAP, executes_pom.clone());
        self.add(
            &executes_pom,
            RDF_TYPE,
            Term::iri(rr::PREDICATE_OBJECT_MAP_CLASS),
        );
        self.add(&executes_pom, rr::PREDICATE, Term::iri(fno::EXECUTES));
        self.add(&executes_pom, rr::OBJECT, Term::iri(function.function.clone()));

        for argument in &function.arguments {
            let pom = self.fresh_blank();
            self.add(&node, rr::PREDICATE_OBJECT_MAP, pom.clone());
            self.add(&pom, RDF_TYPE, Term::iri(rr::PREDICATE_OBJECT_MAP_CLASS));
            self.add(&pom, rr::PREDICATE, Term::iri(argument.parameter.clone()));
            let om = self.fresh_blank();
            self.add(&pom, rr::OBJECT_MAP, om.clone());
            self.add(&om, RDF_TYPE, Term::iri(rr::OBJECT_MAP_CLASS));
            self.emit_spec(&om, &argument.spec);
        }
    }

    fn emit_term_type(&mut self, node: &Term, term_type: TermType) {
        let iri = match term_type {
            TermType::Iri => rr::IRI,
            TermType::BlankNode => rr::BLANK_NODE,
            TermType::Literal => rr::LITERAL,
        };
        self.add(node, rr::TERM_TYPE, Term::iri(iri));
    }
}
