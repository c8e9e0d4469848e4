//! Mapping graph round-trip tests.
//!
//! The contract: `serialize(load(g))` and
//! `serialize(load(serialize(load(g))))` are equal triple sets modulo
//! blank node relabeling, for every valid mapping graph `g`.

use proptest::prelude::*;

use rmlx::graph::{MappingGraph, RdfFormat};
use rmlx::loader::load;
use rmlx::serializer::serialize;
use rmlx::template::Template;
use rmlx::{
    JoinCondition, LogicalSource, ObjectEntry, ObjectMap, PredicateMap, PredicateObjectMap,
    RefObjectMap, SourceRef, SubjectMap, TermMapSpec, TriplesMap,
};
use rmlx::{Term, TermType};

fn roundtrip_is_stable(graph: &MappingGraph) {
    let once = serialize(&load(graph).expect("first load failed"));
    let twice = serialize(&load(&once).expect("second load failed"));
    assert_eq!(
        once.canonical_triples(),
        twice.canonical_triples(),
        "round-trip changed the triple set"
    );
}

#[test]
fn fixture_roundtrip() {
    let fixture = r#"
        @prefix rr: <http://www.w3.org/ns/r2rml#> .
        @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
        @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
        @prefix carml: <http://carml.taxonic.com/carml/> .
        @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
        @prefix ex: <http://example.org/> .

        ex:Person
            rml:logicalSource [
                rml:source [ a carml:Stream ; carml:streamName "people" ] ;
                rml:referenceFormulation ql:JSONPath ;
                rml:iterator "$.people[*]"
            ] ;
            rr:subjectMap [
                rr:template "http://example.org/person/{id}" ;
                rr:class ex:Person ;
                rr:graphMap [ rr:template "http://example.org/graph/{source}" ]
            ] ;
            rr:predicateObjectMap [
                rr:predicateMap [ rr:constant ex:name ] ;
                rr:objectMap [ rml:reference "name" ; rr:language "en" ]
            ] ;
            rr:predicateObjectMap [
                rr:predicateMap [ rr:constant ex:age ] ;
                rr:objectMap [ rml:reference "age" ; rr:datatype xsd:integer ]
            ] ;
            rr:predicateObjectMap [
                rr:predicateMap [ rr:constant ex:knows ] ;
                rr:objectMap [
                    rr:parentTriplesMap ex:Person ;
                    rr:joinCondition [ rr:child "friend" ; rr:parent "id" ]
                ]
            ] .
    "#;
    let graph = MappingGraph::parse(fixture, RdfFormat::Turtle).expect("parse failed");
    roundtrip_is_stable(&graph);
}

#[test]
fn unknown_predicates_are_dropped_not_errors() {
    let fixture = r#"
        @prefix rr: <http://www.w3.org/ns/r2rml#> .
        @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
        @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
        @prefix ex: <http://example.org/> .

        ex:M
            rml:logicalSource [ rml:source "x.csv" ; rml:referenceFormulation ql:CSV ] ;
            rr:subjectMap [ rr:template "http://example.org/{id}" ] ;
            ex:comment "ignored" .

        ex:Unrelated ex:p ex:o .
    "#;
    let graph = MappingGraph::parse(fixture, RdfFormat::Turtle).expect("parse failed");
    let maps = load(&graph).expect("load failed");
    assert_eq!(maps.len(), 1);
    roundtrip_is_stable(&graph);
}

#[test]
fn blank_node_triples_map_resources_keep_parent_links() {
    // Both triples maps are blank nodes; the parent link must survive
    // the serializer's relabeling.
    let source = LogicalSource {
        resource: Term::blank("ls"),
        source: SourceRef::Reference("x.csv".to_string()),
        reference_formulation: "http://semweb.mmlab.be/ns/ql#CSV".to_string(),
        iterator: None,
    };
    let parent = TriplesMap {
        resource: Term::blank("parent"),
        logical_source: source.clone(),
        subject_map: SubjectMap::with_spec(
            Term::blank("ps"),
            TermMapSpec::template(Template::parse("http://example.org/p/{id}").unwrap()),
        ),
        predicate_object_maps: vec![],
    };
    let child = TriplesMap {
        resource: Term::blank("child"),
        logical_source: source,
        subject_map: SubjectMap::with_spec(
            Term::blank("cs"),
            TermMapSpec::template(Template::parse("http://example.org/c/{id}").unwrap()),
        ),
        predicate_object_maps: vec![PredicateObjectMap {
            resource: Term::blank("pom"),
            predicate_maps: vec![PredicateMap::constant(
                Term::blank("pm"),
                "http://example.org/knows",
            )],
            objects: vec![ObjectEntry::Ref(RefObjectMap {
                resource: Term::blank("rom"),
                parent_triples_map: Term::blank("parent"),
                join_conditions: vec![JoinCondition {
                    child: "pid".to_string(),
                    parent: "id".to_string(),
                }],
            })],
            graph_maps: vec![],
        }],
    };

    let graph = serialize(&[child, parent]);
    let reloaded = load(&graph).expect("load failed");
    assert_eq!(reloaded.len(), 2);

    let child = reloaded
        .iter()
        .find(|m| !m.predicate_object_maps.is_empty())
        .expect("child map missing");
    let parent = reloaded
        .iter()
        .find(|m| m.predicate_object_maps.is_empty())
        .expect("parent map missing");
    match &child.predicate_object_maps[0].objects[0] {
        ObjectEntry::Ref(rom) => assert_eq!(rom.parent_triples_map, parent.resource),
        ObjectEntry::Map(_) => panic!("expected referencing object map"),
    }

    roundtrip_is_stable(&graph);
}

// --- property-based round-trips over generated models ---

fn arb_name() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

fn arb_spec() -> impl Strategy<Value = TermMapSpec> {
    prop_oneof![
        arb_name().prop_map(|n| TermMapSpec::constant(Term::iri(format!("http://ex/{n}")))),
        arb_name().prop_map(TermMapSpec::reference),
        arb_name().prop_map(|n| {
            TermMapSpec::template(Template::parse(&format!("http://ex/{{{n}}}")).unwrap())
        }),
    ]
}

fn arb_object_map() -> impl Strategy<Value = ObjectMap> {
    (arb_spec(), prop_oneof![
        Just((None, None)),
        arb_name().prop_map(|l| (Some(l), None)),
        arb_name().prop_map(|d| (None, Some(format!("http://ex/dt/{d}")))),
    ])
        .prop_map(|(spec, (language, datatype))| {
            // language and datatype require literal-producing specs
            let literal_capable = spec.reference.is_some();
            let (language, datatype) = if literal_capable {
                (language, datatype)
            } else {
                (None, None)
            };
            ObjectMap {
                resource: Term::blank("om"),
                spec,
                term_type: None,
                datatype: datatype.map(Term::iri),
                language,
            }
        })
}

fn arb_pom() -> impl Strategy<Value = PredicateObjectMap> {
    (
        prop::collection::vec(arb_name(), 1..3),
        prop::collection::vec(arb_object_map(), 1..3),
    )
        .prop_map(|(predicates, objects)| PredicateObjectMap {
            resource: Term::blank("pom"),
            predicate_maps: predicates
                .into_iter()
                .map(|p| PredicateMap::constant(Term::blank("pm"), format!("http://ex/p/{p}")))
                .collect(),
            objects: objects.into_iter().map(ObjectEntry::Map).collect(),
            graph_maps: vec![],
        })
}

fn arb_triples_map() -> impl Strategy<Value = TriplesMap> {
    (
        arb_name(),
        arb_name(),
        arb_spec(),
        prop::collection::vec(arb_name(), 0..3),
        prop::collection::vec(arb_pom(), 0..3),
        prop::option::of(arb_name()),
    )
        .prop_map(|(id, source, spec, classes, poms, iterator)| TriplesMap {
            resource: Term::iri(format!("http://ex/map/{id}")),
            logical_source: LogicalSource {
                resource: Term::blank("ls"),
                source: SourceRef::Reference(format!("{source}.csv")),
                reference_formulation: "http://semweb.mmlab.be/ns/ql#CSV".to_string(),
                iterator,
            },
            subject_map: SubjectMap {
                resource: Term::blank("sm"),
                spec,
                term_type: None,
                classes: classes
                    .into_iter()
                    .map(|c| Term::iri(format!("http://ex/class/{c}")))
                    .collect(),
                graph_maps: vec![],
            },
            predicate_object_maps: poms,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn generated_models_roundtrip(maps in prop::collection::vec(arb_triples_map(), 1..4)) {
        // distinct resources: equal random ids would merge on load
        let maps: Vec<TriplesMap> = maps
            .into_iter()
            .enumerate()
            .map(|(index, mut map)| {
                let base = map.resource.as_iri().expect("generated maps use IRIs").to_string();
                map.resource = Term::iri(format!("{base}/{index}"));
                map
            })
            .collect();
        let graph = serialize(&maps);
        let reloaded = load(&graph).expect("load failed");
        prop_assert_eq!(maps.len(), reloaded.len());

        let again = serialize(&reloaded);
        prop_assert_eq!(graph.canonical_triples(), again.canonical_triples());
    }

    #[test]
    fn loaded_specs_survive(map in arb_triples_map()) {
        let graph = serialize(&[map.clone()]);
        let reloaded = load(&graph).expect("load failed");
        let back = &reloaded[0];

        prop_assert_eq!(&back.resource, &map.resource);
        prop_assert_eq!(&back.subject_map.spec, &map.subject_map.spec);
        prop_assert_eq!(&back.subject_map.classes, &map.subject_map.classes);
        prop_assert_eq!(&back.logical_source, &map.logical_source);
        prop_assert_eq!(
            back.predicate_object_maps.len(),
            map.predicate_object_maps.len()
        );
    }
}

#[test]
fn explicit_term_types_survive() {
    let map = TriplesMap {
        resource: Term::iri("http://ex/m"),
        logical_source: LogicalSource {
            resource: Term::blank("ls"),
            source: SourceRef::Reference("x.csv".to_string()),
            reference_formulation: "http://semweb.mmlab.be/ns/ql#CSV".to_string(),
            iterator: None,
        },
        subject_map: SubjectMap {
            resource: Term::blank("sm"),
            spec: TermMapSpec::reference("id"),
            term_type: Some(TermType::BlankNode),
            classes: vec![],
            graph_maps: vec![],
        },
        predicate_object_maps: vec![PredicateObjectMap {
            resource: Term::blank("pom"),
            predicate_maps: vec![PredicateMap::constant(Term::blank("pm"), "http://ex/p")],
            objects: vec![ObjectEntry::Map(ObjectMap {
                resource: Term::blank("om"),
                spec: TermMapSpec::reference("v"),
                term_type: Some(TermType::Iri),
                datatype: None,
                language: None,
            })],
            graph_maps: vec![],
        }],
    };

    let reloaded = load(&serialize(&[map])).expect("load failed");
    assert_eq!(reloaded[0].subject_map.term_type, Some(TermType::BlankNode));
    match &reloaded[0].predicate_object_maps[0].objects[0] {
        ObjectEntry::Map(om) => assert_eq!(om.term_type, Some(TermType::Iri)),
        ObjectEntry::Ref(_) => panic!("expected plain object map"),
    }
}
