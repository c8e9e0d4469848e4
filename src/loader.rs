//! Loading the mapping model from an RDF graph.
//!
//! The loader walks the mapping graph entity by entity. Each entity kind
//! reads a fixed set of predicates with fixed cardinalities through the
//! `NodeReader` helper; anything else in the graph is ignored without
//! error.
//! An object map is classified as a referencing object map when and only
//! when the graph contains `rr:parentTriplesMap` out of its resource.

use tracing::debug;

use crate::error::{Result, RmlError};
use crate::graph::MappingGraph;
use crate::model::{
    FunctionArgument, FunctionMap, GraphMap, JoinCondition, LogicalSource, ObjectEntry, ObjectMap,
    PredicateMap, PredicateObjectMap, RefObjectMap, SourceRef, SubjectMap, TermMapSpec, TermType,
    TriplesMap,
};
use crate::template::Template;
use crate::term::Term;
use crate::vocab::{carml, fnml, fno, rml, rr};

/// Loads all triples maps described by a mapping graph.
///
/// # Errors
///
/// Returns a configuration error for malformed entities: conflicting value
/// sources on one term map, missing required predicates, unparseable
/// templates, or a `rr:parentTriplesMap` reference that does not resolve
/// to a loaded triples map.
pub fn load(graph: &MappingGraph) -> Result<Vec<TriplesMap>> {
    let resources: Vec<Term> = graph
        .subjects_with(rml::LOGICAL_SOURCE)
        .into_iter()
        .cloned()
        .collect();

    debug!(count = resources.len(), "loading triples maps");

    let mut maps = Vec::with_capacity(resources.len());
    for resource in resources {
        maps.push(load_triples_map(graph, &resource)?);
    }

    // Referencing object maps must point at a triples map we loaded.
    for map in &maps {
        for pom in &map.predicate_object_maps {
            for object in &pom.objects {
                if let ObjectEntry::Ref(rom) = object {
                    if !maps.iter().any(|m| m.resource == rom.parent_triples_map) {
                        return Err(RmlError::Configuration(format!(
                            "parent triples map {} of {} is not defined in the mapping",
                            rom.parent_triples_map, rom.resource
                        )));
                    }
                }
            }
        }
    }

    Ok(maps)
}

fn load_triples_map(graph: &MappingGraph, resource: &Term) -> Result<TriplesMap> {
    let reader = NodeReader::new(graph, resource);

    let source_node = reader.required(rml::LOGICAL_SOURCE)?;
    let logical_source = load_logical_source(graph, source_node)?;

    let subject_map = load_subject_map(graph, resource)?;

    let mut predicate_object_maps = Vec::new();
    for pom_node in reader.all(rr::PREDICATE_OBJECT_MAP) {
        predicate_object_maps.push(load_predicate_object_map(graph, pom_node)?);
    }

    Ok(TriplesMap {
        resource: resource.clone(),
        logical_source,
        subject_map,
        predicate_object_maps,
    })
}

fn load_logical_source(graph: &MappingGraph, node: &Term) -> Result<LogicalSource> {
    let reader = NodeReader::new(graph, node);

    let source = match reader.required(rml::SOURCE)? {
        Term::Literal { value, .. } => SourceRef::Reference(value.clone()),
        stream @ (Term::Iri(_) | Term::BlankNode(_)) => {
            let stream_reader = NodeReader::new(graph, stream);
            let name = stream_reader.literal(carml::STREAM_NAME)?;
            SourceRef::Stream(name)
        }
    };

    let reference_formulation = reader
        .iri(rml::REFERENCE_FORMULATION)?
        .ok_or_else(|| {
            RmlError::Configuration(format!(
                "logical source {node} has no rml:referenceFormulation"
            ))
        })?;

    let iterator = reader.literal(rml::ITERATOR)?;

    Ok(LogicalSource {
        resource: node.clone(),
        source,
        reference_formulation,
        iterator,
    })
}

fn load_subject_map(graph: &MappingGraph, tm: &Term) -> Result<SubjectMap> {
    let reader = NodeReader::new(graph, tm);

    // The rr:subject shortcut declares a constant subject directly on the
    // triples map.
    if let Some(constant) = reader.optional(rr::SUBJECT)? {
        return Ok(SubjectMap {
            resource: tm.clone(),
            spec: TermMapSpec::constant(constant.clone()),
            term_type: None,
            classes: Vec::new(),
            graph_maps: Vec::new(),
        });
    }

    let Some(node) = reader.optional(rr::SUBJECT_MAP)? else {
        // No subject map at all: loadable but never mappable.
        return Ok(SubjectMap {
            resource: tm.clone(),
            spec: TermMapSpec::default(),
            term_type: None,
            classes: Vec::new(),
            graph_maps: Vec::new(),
        });
    };

    let map_reader = NodeReader::new(graph, node);
    let spec = load_spec(graph, node)?;
    let term_type = load_term_type(&map_reader)?;
    if term_type == Some(TermType::Literal) {
        return Err(RmlError::Configuration(format!(
            "subject map {node} cannot have term type rr:Literal"
        )));
    }

    let classes = map_reader
        .all(rr::CLASS)
        .into_iter()
        .cloned()
        .collect::<Vec<_>>();

    let graph_maps = load_graph_maps(graph, node)?;

    Ok(SubjectMap {
        resource: node.clone(),
        spec,
        term_type,
        classes,
        graph_maps,
    })
}

fn load_predicate_object_map(graph: &MappingGraph, node: &Term) -> Result<PredicateObjectMap> {
    let reader = NodeReader::new(graph, node);

    let mut predicate_maps = Vec::new();
    for constant in reader.all(rr::PREDICATE) {
        predicate_maps.push(PredicateMap {
            resource: node.clone(),
            spec: TermMapSpec::constant(constant.clone()),
        });
    }
    for pm_node in reader.all(rr::PREDICATE_MAP) {
        let spec = load_spec(graph, pm_node)?;
        if spec.is_empty() {
            return Err(RmlError::Configuration(format!(
                "predicate map {pm_node} has no value source"
            )));
        }
        predicate_maps.push(PredicateMap {
            resource: pm_node.clone(),
            spec,
        });
    }
    if predicate_maps.is_empty() {
        return Err(RmlError::Configuration(format!(
            "predicate-object map {node} has no predicate map"
        )));
    }

    let mut objects = Vec::new();
    for constant in reader.all(rr::OBJECT) {
        objects.push(ObjectEntry::Map(ObjectMap::with_spec(
            node.clone(),
            TermMapSpec::constant(constant.clone()),
        )));
    }
    for om_node in reader.all(rr::OBJECT_MAP) {
        objects.push(load_object_entry(graph, om_node)?);
    }
    if objects.is_empty() {
        return Err(RmlError::Configuration(format!(
            "predicate-object map {node} has no object map"
        )));
    }

    let graph_maps = load_graph_maps(graph, node)?;

    Ok(PredicateObjectMap {
        resource: node.clone(),
        predicate_maps,
        objects,
        graph_maps,
    })
}

fn load_object_entry(graph: &MappingGraph, node: &Term) -> Result<ObjectEntry> {
    let reader = NodeReader::new(graph, node);

    // The discriminator: presence of rr:parentTriplesMap makes this a
    // referencing object map, whatever else is declared.
    if let Some(parent) = reader.optional(rr::PARENT_TRIPLES_MAP)? {
        let mut join_conditions = Vec::new();
        for jc_node in reader.all(rr::JOIN_CONDITION) {
            let jc_reader = NodeReader::new(graph, jc_node);
            let child = jc_reader.literal(rr::CHILD)?.ok_or_else(|| {
                RmlError::Configuration(format!("join condition {jc_node} has no rr:child"))
            })?;
            let parent_expr = jc_reader.literal(rr::PARENT)?.ok_or_else(|| {
                RmlError::Configuration(format!("join condition {jc_node} has no rr:parent"))
            })?;
            join_conditions.push(JoinCondition {
                child,
                parent: parent_expr,
            });
        }
        return Ok(ObjectEntry::Ref(RefObjectMap {
            resource: node.clone(),
            parent_triples_map: parent.clone(),
            join_conditions,
        }));
    }

    let spec = load_spec(graph, node)?;
    if spec.is_empty() {
        return Err(RmlError::Configuration(format!(
            "object map {node} has no value source"
        )));
    }
    let term_type = load_term_type(&reader)?;
    let datatype = reader.optional(rr::DATATYPE)?.cloned();
    if let Some(dt) = &datatype {
        if !dt.is_iri() {
            return Err(RmlError::Configuration(format!(
                "rr:datatype of {node} must be an IRI"
            )));
        }
    }
    let language = reader.literal(rr::LANGUAGE)?;
    if datatype.is_some() && language.is_some() {
        return Err(RmlError::Configuration(format!(
            "object map {node} declares both rr:datatype and rr:language"
        )));
    }

    Ok(ObjectEntry::Map(ObjectMap {
        resource: node.clone(),
        spec,
        term_type,
        datatype,
        language,
    }))
}

fn load_graph_maps(graph: &MappingGraph, node: &Term) -> Result<Vec<GraphMap>> {
    let reader = NodeReader::new(graph, node);

    let mut graph_maps = Vec::new();
    for constant in reader.all(rr::GRAPH) {
        graph_maps.push(GraphMap {
            resource: node.clone(),
            spec: TermMapSpec::constant(constant.clone()),
        });
    }
    for gm_node in reader.all(rr::GRAPH_MAP) {
        let spec = load_spec(graph, gm_node)?;
        if spec.is_empty() {
            return Err(RmlError::Configuration(format!(
                "graph map {gm_node} has no value source"
            )));
        }
        graph_maps.push(GraphMap {
            resource: gm_node.clone(),
            spec,
        });
    }
    Ok(graph_maps)
}

fn load_spec(graph: &MappingGraph, node: &Term) -> Result<TermMapSpec> {
    let reader = NodeReader::new(graph, node);

    let constant = reader.optional(rr::CONSTANT)?.cloned();
    let reference = reader.literal(rml::REFERENCE)?;
    let template = match reader.literal(rr::TEMPLATE)? {
        Some(text) => Some(Template::parse(&text)?),
        None => None,
    };
    let function = match reader.optional(fnml::FUNCTION_VALUE)? {
        Some(fn_node) => Some(Box::new(load_function_map(graph, fn_node)?)),
        None => None,
    };

    let spec = TermMapSpec {
        constant,
        reference,
        template,
        function,
    };
    if spec.value_source_count() > 1 {
        return Err(RmlError::Configuration(format!(
            "term map {node} declares more than one of constant, reference, template, function"
        )));
    }
    Ok(spec)
}

fn load_function_map(graph: &MappingGraph, node: &Term) -> Result<FunctionMap> {
    let reader = NodeReader::new(graph, node);

    let mut function = None;
    let mut arguments = Vec::new();

    for pom_node in reader.all(rr::PREDICATE_OBJECT_MAP) {
        let pom_reader = NodeReader::new(graph, pom_node);

        let predicate = match pom_reader.optional(rr::PREDICATE)? {
            Some(Term::Iri(iri)) => iri.clone(),
            Some(other) => {
                return Err(RmlError::Configuration(format!(
                    "function parameter predicate of {pom_node} must be an IRI, got {other}"
                )));
            }
            None => {
                let pm_node = pom_reader.required(rr::PREDICATE_MAP)?;
                let pm_spec = load_spec(graph, pm_node)?;
                match pm_spec.constant {
                    Some(Term::Iri(iri)) => iri,
                    _ => {
                        return Err(RmlError::Configuration(format!(
                            "function parameter predicate of {pom_node} must be a constant IRI"
                        )));
                    }
                }
            }
        };

        let value_spec = match pom_reader.optional(rr::OBJECT)? {
            Some(constant) => TermMapSpec::constant(constant.clone()),
            None => {
                let om_node = pom_reader.required(rr::OBJECT_MAP)?;
                load_spec(graph, om_node)?
            }
        };

        if predicate == fno::EXECUTES {
            match value_spec.constant {
                Some(Term::Iri(iri)) => function = Some(iri),
                _ => {
                    return Err(RmlError::Configuration(format!(
                        "fno:executes of {node} must be a constant IRI"
                    )));
                }
            }
        } else {
            arguments.push(FunctionArgument {
                parameter: predicate,
                spec: value_spec,
            });
        }
    }

    let function = function.ok_or_else(|| {
        RmlError::Configuration(format!("function map {node} declares no fno:executes"))
    })?;

    Ok(FunctionMap {
        resource: node.clone(),
        function,
        arguments,
    })
}

fn load_term_type(reader: &NodeReader<'_>) -> Result<Option<TermType>> {
    match reader.iri(rr::TERM_TYPE)? {
        None => Ok(None),
        Some(iri) if iri == rr::IRI => Ok(Some(TermType::Iri)),
        Some(iri) if iri == rr::BLANK_NODE => Ok(Some(TermType::BlankNode)),
        Some(iri) if iri == rr::LITERAL => Ok(Some(TermType::Literal)),
        Some(iri) => Err(RmlError::Configuration(format!(
            "unknown term type <{iri}>"
        ))),
    }
}

/// Cardinality-checked predicate access for one graph node.
struct NodeReader<'g> {
    graph: &'g MappingGraph,
    node: &'g Term,
}

impl<'g> NodeReader<'g> {
    fn new(graph: &'g MappingGraph, node: &'g Term) -> Self {
        Self { graph, node }
    }

    fn all(&self, predicate: &str) -> Vec<&'g Term> {
        self.graph.objects_of(self.node, predicate)
    }

    /// Zero or one object; more than one is a configuration error.
    fn optional(&self, predicate: &str) -> Result<Option<&'g Term>> {
        let mut objects = self.all(predicate).into_iter();
        let first = objects.next();
        if objects.next().is_some() {
            return Err(RmlError::Configuration(format!(
                "multiple values for <{predicate}> on {}",
                self.node
            )));
        }
        Ok(first)
    }

    /// Exactly one object.
    fn required(&self, predicate: &str) -> Result<&'g Term> {
        self.optional(predicate)?.ok_or_else(|| {
            RmlError::Configuration(format!("missing <{predicate}> on {}", self.node))
        })
    }

    /// An optional literal value.
    fn literal(&self, predicate: &str) -> Result<Option<String>> {
        match self.optional(predicate)? {
            None => Ok(None),
            Some(Term::Literal { value, .. }) => Ok(Some(value.clone())),
            Some(other) => Err(RmlError::Configuration(format!(
                "<{predicate}> on {} must be a literal, got {other}",
                self.node
            ))),
        }
    }

    /// An optional IRI value.
    fn iri(&self, predicate: &str) -> Result<Option<String>> {
        match self.optional(predicate)? {
            None => Ok(None),
            Some(Term::Iri(iri)) => Ok(Some(iri.clone())),
            Some(other) => Err(RmlError::Configuration(format!(
                "<{predicate}> on {} must be an IRI, got {other}",
                self.node
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RdfFormat;

    const PEOPLE_MAPPING: &str = r#"
        @prefix rr: <http://www.w3.org/ns/r2rml#> .
        @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
        @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
        @prefix ex: <http://example.org/> .

        ex:PersonMap
            rml:logicalSource [
                rml:source "people.csv" ;
                rml:referenceFormulation ql:CSV
            ] ;
            rr:subjectMap [
                rr:template "http://example.org/person/{id}" ;
                rr:class ex:Person
            ] ;
            rr:predicateObjectMap [
                rr:predicate ex:name ;
                rr:objectMap [ rml:reference "name" ]
            ] .
    "#;

    fn load_turtle(input: &str) -> Result<Vec<TriplesMap>> {
        let graph = MappingGraph::parse(input, RdfFormat::Turtle).expect("parse failed");
        load(&graph)
    }

    #[test]
    fn test_load_simple_mapping() {
        let maps = load_turtle(PEOPLE_MAPPING).expect("load failed");
        assert_eq!(maps.len(), 1);

        let tm = &maps[0];
        assert_eq!(tm.resource, Term::iri("http://example.org/PersonMap"));
        assert_eq!(
            tm.logical_source.source,
            SourceRef::Reference("people.csv".to_string())
        );
        assert_eq!(
            tm.logical_source.reference_formulation,
            crate::vocab::ql::CSV
        );
        assert!(tm.logical_source.iterator.is_none());

        assert!(tm.is_mappable());
        assert_eq!(
            tm.subject_map.classes,
            vec![Term::iri("http://example.org/Person")]
        );

        assert_eq!(tm.predicate_object_maps.len(), 1);
        let pom = &tm.predicate_object_maps[0];
        assert_eq!(
            pom.predicate_maps[0].spec.constant,
            Some(Term::iri("http://example.org/name"))
        );
        match &pom.objects[0] {
            ObjectEntry::Map(om) => {
                assert_eq!(om.spec.reference.as_deref(), Some("name"));
                assert_eq!(om.effective_term_type(), TermType::Literal);
            }
            ObjectEntry::Ref(_) => panic!("expected plain object map"),
        }
    }

    #[test]
    fn test_ref_object_map_discrimination() {
        let input = r#"
            @prefix rr: <http://www.w3.org/ns/r2rml#> .
            @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
            @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
            @prefix ex: <http://example.org/> .

            ex:Child
                rml:logicalSource [ rml:source "child.csv" ; rml:referenceFormulation ql:CSV ] ;
                rr:subjectMap [ rr:template "http://example.org/c/{id}" ] ;
                rr:predicateObjectMap [
                    rr:predicate ex:parent ;
                    rr:objectMap [
                        rr:parentTriplesMap ex:Parent ;
                        rr:joinCondition [ rr:child "pid" ; rr:parent "pid" ]
                    ]
                ] .

            ex:Parent
                rml:logicalSource [ rml:source "parent.csv" ; rml:referenceFormulation ql:CSV ] ;
                rr:subjectMap [ rr:template "http://example.org/p/{pid}" ] .
        "#;
        let maps = load_turtle(input).expect("load failed");
        assert_eq!(maps.len(), 2);

        let child = maps
            .iter()
            .find(|m| m.resource == Term::iri("http://example.org/Child"))
            .expect("child map missing");
        match &child.predicate_object_maps[0].objects[0] {
            ObjectEntry::Ref(rom) => {
                assert_eq!(
                    rom.parent_triples_map,
                    Term::iri("http://example.org/Parent")
                );
                assert_eq!(
                    rom.join_conditions,
                    vec![JoinCondition {
                        child: "pid".to_string(),
                        parent: "pid".to_string(),
                    }]
                );
            }
            ObjectEntry::Map(_) => panic!("expected referencing object map"),
        }
    }

    #[test]
    fn test_dangling_parent_is_error() {
        let input = r#"
            @prefix rr: <http://www.w3.org/ns/r2rml#> .
            @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
            @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
            @prefix ex: <http://example.org/> .

            ex:Child
                rml:logicalSource [ rml:source "child.csv" ; rml:referenceFormulation ql:CSV ] ;
                rr:subjectMap [ rr:template "http://example.org/c/{id}" ] ;
                rr:predicateObjectMap [
                    rr:predicate ex:parent ;
                    rr:objectMap [ rr:parentTriplesMap ex:Nowhere ]
                ] .
        "#;
        assert!(matches!(
            load_turtle(input),
            Err(RmlError::Configuration(_))
        ));
    }

    #[test]
    fn test_conflicting_value_sources_rejected() {
        let input = r#"
            @prefix rr: <http://www.w3.org/ns/r2rml#> .
            @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
            @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
            @prefix ex: <http://example.org/> .

            ex:Broken
                rml:logicalSource [ rml:source "x.csv" ; rml:referenceFormulation ql:CSV ] ;
                rr:subjectMap [
                    rr:template "http://example.org/{id}" ;
                    rr:constant ex:fixed
                ] .
        "#;
        assert!(matches!(
            load_turtle(input),
            Err(RmlError::Configuration(_))
        ));
    }

    #[test]
    fn test_unknown_predicates_ignored() {
        let input = r#"
            @prefix rr: <http://www.w3.org/ns/r2rml#> .
            @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
            @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
            @prefix ex: <http://example.org/> .

            ex:M
                rml:logicalSource [ rml:source "x.csv" ; rml:referenceFormulation ql:CSV ] ;
                rr:subjectMap [ rr:template "http://example.org/{id}" ] ;
                ex:annotation "not part of the vocabulary" .
        "#;
        let maps = load_turtle(input).expect("load failed");
        assert_eq!(maps.len(), 1);
    }

    #[test]
    fn test_stream_source() {
        let input = r#"
            @prefix rr: <http://www.w3.org/ns/r2rml#> .
            @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
            @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
            @prefix carml: <http://carml.taxonic.com/carml/> .
            @prefix ex: <http://example.org/> .

            ex:M
                rml:logicalSource [
                    rml:source [ a carml:Stream ; carml:streamName "people" ] ;
                    rml:referenceFormulation ql:CSV
                ] ;
                rr:subjectMap [ rr:template "http://example.org/{id}" ] .
        "#;
        let maps = load_turtle(input).expect("load failed");
        assert_eq!(
            maps[0].logical_source.source,
            SourceRef::Stream(Some("people".to_string()))
        );
    }

    #[test]
    fn test_subject_shortcut() {
        let input = r#"
            @prefix rr: <http://www.w3.org/ns/r2rml#> .
            @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
            @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
            @prefix ex: <http://example.org/> .

            ex:M
                rml:logicalSource [ rml:source "x.csv" ; rml:referenceFormulation ql:CSV ] ;
                rr:subject ex:TheOne ;
                rr:predicateObjectMap [ rr:predicate ex:p ; rr:object ex:o ] .
        "#;
        let maps = load_turtle(input).expect("load failed");
        assert_eq!(
            maps[0].subject_map.spec.constant,
            Some(Term::iri("http://example.org/TheOne"))
        );
    }

    #[test]
    fn test_function_map_loading() {
        let input = r#"
            @prefix rr: <http://www.w3.org/ns/r2rml#> .
            @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
            @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
            @prefix fnml: <http://semweb.mmlab.be/ns/fnml#> .
            @prefix fno: <https://w3id.org/function/ontology#> .
            @prefix ex: <http://example.org/> .

            ex:M
                rml:logicalSource [ rml:source "x.csv" ; rml:referenceFormulation ql:CSV ] ;
                rr:subjectMap [ rr:template "http://example.org/{id}" ] ;
                rr:predicateObjectMap [
                    rr:predicate ex:p ;
                    rr:objectMap [
                        fnml:functionValue [
                            rr:predicateObjectMap [
                                rr:predicate fno:executes ;
                                rr:object ex:toUpperCase
                            ] ;
                            rr:predicateObjectMap [
                                rr:predicate ex:input ;
                                rr:objectMap [ rml:reference "name" ]
                            ]
                        ]
                    ]
                ] .
        "#;
        let maps = load_turtle(input).expect("load failed");
        let pom = &maps[0].predicate_object_maps[0];
        let ObjectEntry::Map(om) = &pom.objects[0] else {
            panic!("expected object map");
        };
        let function = om.spec.function.as_ref().expect("function map missing");
        assert_eq!(function.function, "http://example.org/toUpperCase");
        assert_eq!(function.arguments.len(), 1);
        assert_eq!(function.arguments[0].parameter, "http://example.org/input");
        assert_eq!(function.arguments[0].spec.reference.as_deref(), Some("name"));
    }
}
