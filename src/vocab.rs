//! Vocabulary definitions for RML mapping documents.
//!
//! This module defines the namespace prefixes and the full predicate and
//! class IRIs the loader and serializer recognize: the R2RML vocabulary
//! (`rr:`), the RML vocabulary (`rml:`), the reference formulation
//! vocabulary (`ql:`), the stream extension vocabulary (`carml:`), and the
//! function mapping vocabularies (`fnml:`, `fno:`).

/// R2RML namespace URI.
pub const RR: &str = "http://www.w3.org/ns/r2rml#";

/// RML namespace URI.
pub const RML: &str = "http://semweb.mmlab.be/ns/rml#";

/// Reference formulation vocabulary namespace URI.
pub const QL: &str = "http://semweb.mmlab.be/ns/ql#";

/// Stream and extension vocabulary namespace URI.
pub const CARML: &str = "http://carml.taxonic.com/carml/";

/// Function mapping language namespace URI.
pub const FNML: &str = "http://semweb.mmlab.be/ns/fnml#";

/// Function ontology namespace URI.
pub const FNO: &str = "https://w3id.org/function/ontology#";

/// RDF namespace URI.
pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// XML Schema namespace URI.
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

/// `rdf:type`.
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// R2RML predicate and class IRIs.
pub mod rr {
    /// `rr:TriplesMap` class.
    pub const TRIPLES_MAP: &str = "http://www.w3.org/ns/r2rml#TriplesMap";
    /// `rr:SubjectMap` class.
    pub const SUBJECT_MAP_CLASS: &str = "http://www.w3.org/ns/r2rml#SubjectMap";
    /// `rr:PredicateMap` class.
    pub const PREDICATE_MAP_CLASS: &str = "http://www.w3.org/ns/r2rml#PredicateMap";
    /// `rr:ObjectMap` class.
    pub const OBJECT_MAP_CLASS: &str = "http://www.w3.org/ns/r2rml#ObjectMap";
    /// `rr:RefObjectMap` class.
    pub const REF_OBJECT_MAP_CLASS: &str = "http://www.w3.org/ns/r2rml#RefObjectMap";
    /// `rr:PredicateObjectMap` class.
    pub const PREDICATE_OBJECT_MAP_CLASS: &str = "http://www.w3.org/ns/r2rml#PredicateObjectMap";
    /// `rr:GraphMap` class.
    pub const GRAPH_MAP_CLASS: &str = "http://www.w3.org/ns/r2rml#GraphMap";
    /// `rr:Join` class.
    pub const JOIN: &str = "http://www.w3.org/ns/r2rml#Join";

    /// `rr:subjectMap`.
    pub const SUBJECT_MAP: &str = "http://www.w3.org/ns/r2rml#subjectMap";
    /// `rr:subject` constant shortcut.
    pub const SUBJECT: &str = "http://www.w3.org/ns/r2rml#subject";
    /// `rr:predicateObjectMap`.
    pub const PREDICATE_OBJECT_MAP: &str = "http://www.w3.org/ns/r2rml#predicateObjectMap";
    /// `rr:predicateMap`.
    pub const PREDICATE_MAP: &str = "http://www.w3.org/ns/r2rml#predicateMap";
    /// `rr:predicate` constant shortcut.
    pub const PREDICATE: &str = "http://www.w3.org/ns/r2rml#predicate";
    /// `rr:objectMap`.
    pub const OBJECT_MAP: &str = "http://www.w3.org/ns/r2rml#objectMap";
    /// `rr:object` constant shortcut.
    pub const OBJECT: &str = "http://www.w3.org/ns/r2rml#object";
    /// `rr:graphMap`.
    pub const GRAPH_MAP: &str = "http://www.w3.org/ns/r2rml#graphMap";
    /// `rr:graph` constant shortcut.
    pub const GRAPH: &str = "http://www.w3.org/ns/r2rml#graph";
    /// `rr:template`.
    pub const TEMPLATE: &str = "http://www.w3.org/ns/r2rml#template";
    /// `rr:constant`.
    pub const CONSTANT: &str = "http://www.w3.org/ns/r2rml#constant";
    /// `rr:termType`.
    pub const TERM_TYPE: &str = "http://www.w3.org/ns/r2rml#termType";
    /// `rr:datatype`.
    pub const DATATYPE: &str = "http://www.w3.org/ns/r2rml#datatype";
    /// `rr:language`.
    pub const LANGUAGE: &str = "http://www.w3.org/ns/r2rml#language";
    /// `rr:class`.
    pub const CLASS: &str = "http://www.w3.org/ns/r2rml#class";
    /// `rr:parentTriplesMap`.
    pub const PARENT_TRIPLES_MAP: &str = "http://www.w3.org/ns/r2rml#parentTriplesMap";
    /// `rr:joinCondition`.
    pub const JOIN_CONDITION: &str = "http://www.w3.org/ns/r2rml#joinCondition";
    /// `rr:child`.
    pub const CHILD: &str = "http://www.w3.org/ns/r2rml#child";
    /// `rr:parent`.
    pub const PARENT: &str = "http://www.w3.org/ns/r2rml#parent";

    /// `rr:defaultGraph`, the graph map constant naming the default graph.
    pub const DEFAULT_GRAPH: &str = "http://www.w3.org/ns/r2rml#defaultGraph";

    /// `rr:IRI` term type.
    pub const IRI: &str = "http://www.w3.org/ns/r2rml#IRI";
    /// `rr:BlankNode` term type.
    pub const BLANK_NODE: &str = "http://www.w3.org/ns/r2rml#BlankNode";
    /// `rr:Literal` term type.
    pub const LITERAL: &str = "http://www.w3.org/ns/r2rml#Literal";
}

/// RML predicate and class IRIs.
pub mod rml {
    /// `rml:LogicalSource` class.
    pub const LOGICAL_SOURCE_CLASS: &str = "http://semweb.mmlab.be/ns/rml#LogicalSource";
    /// `rml:logicalSource`.
    pub const LOGICAL_SOURCE: &str = "http://semweb.mmlab.be/ns/rml#logicalSource";
    /// `rml:source`.
    pub const SOURCE: &str = "http://semweb.mmlab.be/ns/rml#source";
    /// `rml:referenceFormulation`.
    pub const REFERENCE_FORMULATION: &str = "http://semweb.mmlab.be/ns/rml#referenceFormulation";
    /// `rml:iterator`.
    pub const ITERATOR: &str = "http://semweb.mmlab.be/ns/rml#iterator";
    /// `rml:reference`.
    pub const REFERENCE: &str = "http://semweb.mmlab.be/ns/rml#reference";
}

/// Reference formulation IRIs selecting a decoder.
pub mod ql {
    /// Tabular sources decoded row by row.
    pub const CSV: &str = "http://semweb.mmlab.be/ns/ql#CSV";
    /// Hierarchical JSON sources iterated by a JSONPath expression.
    pub const JSON_PATH: &str = "http://semweb.mmlab.be/ns/ql#JSONPath";
    /// XML sources iterated by a path expression.
    pub const XPATH: &str = "http://semweb.mmlab.be/ns/ql#XPath";
}

/// Stream extension IRIs.
pub mod carml {
    /// `carml:Stream` class marking a named input stream source.
    pub const STREAM: &str = "http://carml.taxonic.com/carml/Stream";
    /// `carml:streamName`.
    pub const STREAM_NAME: &str = "http://carml.taxonic.com/carml/streamName";
}

/// Function mapping IRIs.
pub mod fnml {
    /// `fnml:FunctionTermMap` class.
    pub const FUNCTION_TERM_MAP: &str = "http://semweb.mmlab.be/ns/fnml#FunctionTermMap";
    /// `fnml:functionValue`.
    pub const FUNCTION_VALUE: &str = "http://semweb.mmlab.be/ns/fnml#functionValue";
}

/// Function ontology IRIs.
pub mod fno {
    /// `fno:executes` selects the function to invoke.
    pub const EXECUTES: &str = "https://w3id.org/function/ontology#executes";
}

/// Common XSD datatype IRIs.
pub mod xsd {
    /// `xsd:string`.
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    /// `xsd:integer`.
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    /// `xsd:boolean`.
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
}
