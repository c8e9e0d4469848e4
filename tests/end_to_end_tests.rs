//! End-to-end mapping tests over in-memory sources.

use std::collections::HashMap;

use rmlx::{RdfFormat, Result, RmlError, RmlMapper, Statement, Term};

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

fn csv_mapper(mapping: &str) -> RmlMapper {
    RmlMapper::builder()
        .with_mapping(mapping, RdfFormat::Turtle)
        .expect("mapping load failed")
        .build()
        .expect("build failed")
}

fn inputs(pairs: &[(&str, &str)]) -> HashMap<String, Vec<u8>> {
    pairs
        .iter()
        .map(|(name, content)| ((*name).to_string(), content.as_bytes().to_vec()))
        .collect()
}

fn collect(mapper: &RmlMapper, bound: HashMap<String, Vec<u8>>) -> Vec<Statement> {
    mapper
        .map_with_named_inputs(bound)
        .expect("map failed")
        .collect::<Result<Vec<_>>>()
        .expect("stream failed")
}

const SIMPLE_CSV_MAPPING: &str = r#"
    @prefix rr: <http://www.w3.org/ns/r2rml#> .
    @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
    @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
    @prefix carml: <http://carml.taxonic.com/carml/> .
    @prefix ex: <http://ex/> .

    ex:M
        rml:logicalSource [
            rml:source [ a carml:Stream ; carml:streamName "data" ] ;
            rml:referenceFormulation ql:CSV
        ] ;
        rr:subjectMap [ rr:template "http://ex/{a}" ] ;
        rr:predicateObjectMap [
            rr:predicate ex:p ;
            rr:objectMap [ rml:reference "b" ]
        ] .
"#;

#[test]
fn simple_csv_mapping_produces_expected_triples() {
    let mapper = csv_mapper(SIMPLE_CSV_MAPPING);
    let statements = collect(&mapper, inputs(&[("data", "a,b\n1,2\n3,4\n")]));

    assert_eq!(
        statements,
        vec![
            Statement::new(
                Term::iri("http://ex/1"),
                Term::iri("http://ex/p"),
                Term::literal("2"),
            ),
            Statement::new(
                Term::iri("http://ex/3"),
                Term::iri("http://ex/p"),
                Term::literal("4"),
            ),
        ]
    );
}

#[test]
fn subject_class_emits_type_triples() {
    let mapping = r#"
        @prefix rr: <http://www.w3.org/ns/r2rml#> .
        @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
        @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
        @prefix carml: <http://carml.taxonic.com/carml/> .
        @prefix ex: <http://ex/> .

        ex:M
            rml:logicalSource [
                rml:source [ a carml:Stream ; carml:streamName "data" ] ;
                rml:referenceFormulation ql:CSV
            ] ;
            rr:subjectMap [ rr:template "http://ex/{a}" ; rr:class ex:T ] ;
            rr:predicateObjectMap [
                rr:predicate ex:p ;
                rr:objectMap [ rml:reference "b" ]
            ] .
    "#;
    let mapper = csv_mapper(mapping);
    let statements = collect(&mapper, inputs(&[("data", "a,b\n1,2\n3,4\n")]));

    let expected_types = [
        Statement::new(
            Term::iri("http://ex/1"),
            Term::iri(RDF_TYPE),
            Term::iri("http://ex/T"),
        ),
        Statement::new(
            Term::iri("http://ex/3"),
            Term::iri(RDF_TYPE),
            Term::iri("http://ex/T"),
        ),
    ];
    for expected in &expected_types {
        assert!(
            statements.contains(expected),
            "missing type triple {expected}"
        );
    }
    assert_eq!(statements.len(), 4);

    // type triples precede the predicate-object triples of their record
    let type_pos = statements
        .iter()
        .position(|s| s.predicate == Term::iri(RDF_TYPE) && s.subject == Term::iri("http://ex/1"))
        .unwrap();
    let pom_pos = statements
        .iter()
        .position(|s| s.predicate == Term::iri("http://ex/p") && s.subject == Term::iri("http://ex/1"))
        .unwrap();
    assert!(type_pos < pom_pos);
}

#[test]
fn unicode_normalization_and_percent_encoding() {
    let mapper = csv_mapper(SIMPLE_CSV_MAPPING);
    let statements = collect(&mapper, inputs(&[("data", "a,b\nh\u{00e9}llo,x\n")]));
    assert_eq!(statements[0].subject, Term::iri("http://ex/h%C3%A9llo"));

    // decomposed input composes under default NFC before encoding
    let statements = collect(&mapper, inputs(&[("data", "a,b\nhe\u{0301}llo,x\n")]));
    assert_eq!(statements[0].subject, Term::iri("http://ex/h%C3%A9llo"));
}

#[test]
fn lower_case_percent_encoding_flag() {
    let mapper = RmlMapper::builder()
        .with_mapping(SIMPLE_CSV_MAPPING, RdfFormat::Turtle)
        .expect("mapping load failed")
        .with_config(
            rmlx::MapperConfig::new().with_iri_upper_case_percent_encoding(false),
        )
        .build()
        .expect("build failed");
    let statements = collect(&mapper, inputs(&[("data", "a,b\nh\u{00e9}llo,x\n")]));
    assert_eq!(statements[0].subject, Term::iri("http://ex/h%c3%a9llo"));
}

#[test]
fn missing_hole_suppresses_object_only() {
    let mapping = r#"
        @prefix rr: <http://www.w3.org/ns/r2rml#> .
        @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
        @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
        @prefix carml: <http://carml.taxonic.com/carml/> .
        @prefix ex: <http://ex/> .

        ex:M
            rml:logicalSource [
                rml:source [ a carml:Stream ; carml:streamName "data" ] ;
                rml:referenceFormulation ql:JSONPath ;
                rml:iterator "$[*]"
            ] ;
            rr:subjectMap [ rr:template "http://ex/{a}" ] ;
            rr:predicateObjectMap [
                rr:predicate ex:p ;
                rr:objectMap [ rr:template "http://ex/{b}" ]
            ] .
    "#;
    let mapper = csv_mapper(mapping);
    let statements = collect(
        &mapper,
        inputs(&[("data", r#"[{"a": 1, "b": null}, {"a": 2, "b": 3}]"#)]),
    );

    // row one loses its object; row two is unaffected
    assert_eq!(
        statements,
        vec![Statement::new(
            Term::iri("http://ex/2"),
            Term::iri("http://ex/p"),
            Term::iri("http://ex/3"),
        )]
    );
}

#[test]
fn empty_source_yields_empty_output() {
    let mapper = csv_mapper(SIMPLE_CSV_MAPPING);
    assert!(collect(&mapper, inputs(&[("data", "a,b\n")])).is_empty());
}

#[test]
fn map_without_poms_yields_only_type_triples() {
    let mapping = r#"
        @prefix rr: <http://www.w3.org/ns/r2rml#> .
        @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
        @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
        @prefix carml: <http://carml.taxonic.com/carml/> .
        @prefix ex: <http://ex/> .

        ex:M
            rml:logicalSource [
                rml:source [ a carml:Stream ; carml:streamName "data" ] ;
                rml:referenceFormulation ql:CSV
            ] ;
            rr:subjectMap [ rr:template "http://ex/{a}" ; rr:class ex:T ] .
    "#;
    let mapper = csv_mapper(mapping);
    let statements = collect(&mapper, inputs(&[("data", "a\n1\n")]));
    assert_eq!(
        statements,
        vec![Statement::new(
            Term::iri("http://ex/1"),
            Term::iri(RDF_TYPE),
            Term::iri("http://ex/T"),
        )]
    );
}

#[test]
fn determinism_same_input_same_output() {
    let mapper = csv_mapper(SIMPLE_CSV_MAPPING);
    let first = collect(&mapper, inputs(&[("data", "a,b\n1,2\n3,4\n5,6\n")]));
    let second = collect(&mapper, inputs(&[("data", "a,b\n1,2\n3,4\n5,6\n")]));
    assert_eq!(first, second);
}

#[test]
fn file_resolver_end_to_end() {
    use std::io::Write;

    let dir = tempfile::tempdir().expect("tempdir failed");
    let mut file = std::fs::File::create(dir.path().join("people.csv")).expect("create failed");
    file.write_all(b"a,b\n1,2\n").expect("write failed");

    let mapping = r#"
        @prefix rr: <http://www.w3.org/ns/r2rml#> .
        @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
        @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
        @prefix ex: <http://ex/> .

        ex:M
            rml:logicalSource [
                rml:source "people.csv" ;
                rml:referenceFormulation ql:CSV
            ] ;
            rr:subjectMap [ rr:template "http://ex/{a}" ] ;
            rr:predicateObjectMap [
                rr:predicate ex:p ;
                rr:objectMap [ rml:reference "b" ]
            ] .
    "#;
    let mapper = RmlMapper::builder()
        .with_mapping(mapping, RdfFormat::Turtle)
        .expect("mapping load failed")
        .with_source_resolver(rmlx::FileResolver::new(dir.path()))
        .build()
        .expect("build failed");

    let statements: Vec<Statement> = mapper
        .map()
        .expect("map failed")
        .collect::<Result<Vec<_>>>()
        .expect("stream failed");
    assert_eq!(statements.len(), 1);
}

#[test]
fn unresolvable_source_is_resolution_error() {
    let mapping = r#"
        @prefix rr: <http://www.w3.org/ns/r2rml#> .
        @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
        @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
        @prefix ex: <http://ex/> .

        ex:M
            rml:logicalSource [
                rml:source "nowhere.csv" ;
                rml:referenceFormulation ql:CSV
            ] ;
            rr:subjectMap [ rr:template "http://ex/{a}" ] .
    "#;
    let mapper = csv_mapper(mapping);
    assert!(matches!(mapper.map(), Err(RmlError::SourceResolution(_))));
}

#[test]
fn decoder_error_terminates_stream_with_error() {
    let mapping = r#"
        @prefix rr: <http://www.w3.org/ns/r2rml#> .
        @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
        @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
        @prefix carml: <http://carml.taxonic.com/carml/> .
        @prefix ex: <http://ex/> .

        ex:M
            rml:logicalSource [
                rml:source [ a carml:Stream ; carml:streamName "data" ] ;
                rml:referenceFormulation ql:JSONPath ;
                rml:iterator "$[*]"
            ] ;
            rr:subjectMap [ rr:template "http://ex/{a}" ] .
    "#;
    let mapper = csv_mapper(mapping);
    let result = mapper.map_with_named_inputs(inputs(&[("data", "this is not json")]));
    // JSON parses up front, so the failure surfaces at decoder creation
    assert!(result.is_err());
}

#[test]
fn language_and_datatype_objects() {
    let mapping = r#"
        @prefix rr: <http://www.w3.org/ns/r2rml#> .
        @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
        @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
        @prefix carml: <http://carml.taxonic.com/carml/> .
        @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .
        @prefix ex: <http://ex/> .

        ex:M
            rml:logicalSource [
                rml:source [ a carml:Stream ; carml:streamName "data" ] ;
                rml:referenceFormulation ql:CSV
            ] ;
            rr:subjectMap [ rr:template "http://ex/{id}" ] ;
            rr:predicateObjectMap [
                rr:predicate ex:name ;
                rr:objectMap [ rml:reference "name" ; rr:language "en" ]
            ] ;
            rr:predicateObjectMap [
                rr:predicate ex:age ;
                rr:objectMap [ rml:reference "age" ; rr:datatype xsd:integer ]
            ] .
    "#;
    let mapper = csv_mapper(mapping);
    let statements = collect(&mapper, inputs(&[("data", "id,name,age\n1,ada,36\n")]));

    assert!(statements.contains(&Statement::new(
        Term::iri("http://ex/1"),
        Term::iri("http://ex/name"),
        Term::literal_with_lang("ada", "en"),
    )));
    assert!(statements.contains(&Statement::new(
        Term::iri("http://ex/1"),
        Term::iri("http://ex/age"),
        Term::typed_literal("36", "http://www.w3.org/2001/XMLSchema#integer"),
    )));
}

#[test]
fn graph_maps_scope_output() {
    let mapping = r#"
        @prefix rr: <http://www.w3.org/ns/r2rml#> .
        @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
        @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
        @prefix carml: <http://carml.taxonic.com/carml/> .
        @prefix ex: <http://ex/> .

        ex:M
            rml:logicalSource [
                rml:source [ a carml:Stream ; carml:streamName "data" ] ;
                rml:referenceFormulation ql:CSV
            ] ;
            rr:subjectMap [
                rr:template "http://ex/{a}" ;
                rr:graphMap [ rr:constant ex:g ]
            ] ;
            rr:predicateObjectMap [
                rr:predicate ex:p ;
                rr:objectMap [ rml:reference "b" ]
            ] .
    "#;
    let mapper = csv_mapper(mapping);
    let statements = collect(&mapper, inputs(&[("data", "a,b\n1,2\n")]));
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].graph, Some(Term::iri("http://ex/g")));
}

#[test]
fn xml_source_end_to_end() {
    let mapping = r#"
        @prefix rr: <http://www.w3.org/ns/r2rml#> .
        @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
        @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
        @prefix carml: <http://carml.taxonic.com/carml/> .
        @prefix ex: <http://ex/> .

        ex:M
            rml:logicalSource [
                rml:source [ a carml:Stream ; carml:streamName "data" ] ;
                rml:referenceFormulation ql:XPath ;
                rml:iterator "/people/person"
            ] ;
            rr:subjectMap [ rr:template "http://ex/{@id}" ] ;
            rr:predicateObjectMap [
                rr:predicate ex:name ;
                rr:objectMap [ rml:reference "name" ]
            ] .
    "#;
    let mapper = csv_mapper(mapping);
    let xml = r#"<people><person id="1"><name>ada</name></person></people>"#;
    let statements = collect(&mapper, inputs(&[("data", xml)]));
    assert_eq!(
        statements,
        vec![Statement::new(
            Term::iri("http://ex/1"),
            Term::iri("http://ex/name"),
            Term::literal("ada"),
        )]
    );
}

#[test]
fn function_term_map_end_to_end() {
    let mapping = r#"
        @prefix rr: <http://www.w3.org/ns/r2rml#> .
        @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
        @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
        @prefix carml: <http://carml.taxonic.com/carml/> .
        @prefix fnml: <http://semweb.mmlab.be/ns/fnml#> .
        @prefix fno: <https://w3id.org/function/ontology#> .
        @prefix ex: <http://ex/> .

        ex:M
            rml:logicalSource [
                rml:source [ a carml:Stream ; carml:streamName "data" ] ;
                rml:referenceFormulation ql:CSV
            ] ;
            rr:subjectMap [ rr:template "http://ex/{id}" ] ;
            rr:predicateObjectMap [
                rr:predicate ex:name ;
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
    let mapper = RmlMapper::builder()
        .with_mapping(mapping, RdfFormat::Turtle)
        .expect("mapping load failed")
        .with_function("http://ex/toUpperCase", |args: &rmlx::FunctionArgs| {
            let input = args.string("http://ex/input").unwrap_or_default();
            Ok(vec![Term::literal(input.to_uppercase())])
        })
        .build()
        .expect("build failed");

    let statements = collect(&mapper, inputs(&[("data", "id,name\n1,ada\n")]));
    assert!(statements.contains(&Statement::new(
        Term::iri("http://ex/1"),
        Term::iri("http://ex/name"),
        Term::literal("ADA"),
    )));
}

#[test]
fn unregistered_function_fails_build() {
    let mapping = r#"
        @prefix rr: <http://www.w3.org/ns/r2rml#> .
        @prefix rml: <http://semweb.mmlab.be/ns/rml#> .
        @prefix ql: <http://semweb.mmlab.be/ns/ql#> .
        @prefix fnml: <http://semweb.mmlab.be/ns/fnml#> .
        @prefix fno: <https://w3id.org/function/ontology#> .
        @prefix ex: <http://ex/> .

        ex:M
            rml:logicalSource [ rml:source "x.csv" ; rml:referenceFormulation ql:CSV ] ;
            rr:subjectMap [ rr:template "http://ex/{id}" ] ;
            rr:predicateObjectMap [
                rr:predicate ex:p ;
                rr:objectMap [
                    fnml:functionValue [
                        rr:predicateObjectMap [
                            rr:predicate fno:executes ;
                            rr:object ex:missing
                        ]
                    ]
                ]
            ] .
    "#;
    let result = RmlMapper::builder()
        .with_mapping(mapping, RdfFormat::Turtle)
        .expect("mapping load failed")
        .build();
    assert!(matches!(result, Err(RmlError::FunctionEvaluation { .. })));
}
