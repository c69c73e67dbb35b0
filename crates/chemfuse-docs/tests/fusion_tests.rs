use chemfuse_docs::{
    fuse_records, DocumentOrigin, DuplicateIdPolicy, FusedDocument, FusionConfig, FusionError,
    FusionPipeline,
};
use chemfuse_ingest_obo::{OboGraph, OboNode, OntologyConfig, OntologyDocumentBuilder, OntologyGraph};
use chemfuse_ingest_sdf::CompoundReader;
use serde_json::json;
use std::collections::{BTreeSet, HashSet};

/// One compound block; multi-line values are separated by `\n`.
fn sdf_block(fields: &[(&str, &str)]) -> String {
    let mut block = String::from("\n  Marvin  01010100002D\n\nM  END\n");
    for (tag, value) in fields {
        block.push_str(&format!("> <{tag}>\n{value}\n\n"));
    }
    block.push_str("$$$$");
    block
}

fn sdf_dump(blocks: &[String]) -> String {
    let mut dump = blocks.concat();
    dump.push('\n');
    dump
}

/// `B is_a A`, `C is_a B`, `D` isolated, `E has_part A`.
fn synthetic_obo() -> OboGraph {
    let mut a = OboNode::new("A");
    a.name = Some("X".to_string());
    a.subset = vec!["2_STAR".to_string()];

    let mut b = OboNode::new("B");
    b.is_a = vec!["A".to_string()];

    let mut c = OboNode::new("C");
    c.is_a = vec!["B".to_string()];

    let d = OboNode::new("D");

    let mut e = OboNode::new("E");
    e.relationship = vec!["has_part A".to_string()];

    OboGraph::from_nodes(vec![a, b, c, d, e])
}

fn synthetic_reader() -> CompoundReader {
    CompoundReader::new(sdf_dump(&[
        sdf_block(&[("ChEBI ID", "A"), ("ChEBI Name", "Y")]),
        sdf_block(&[("ChEBI ID", "D"), ("Charge", "0")]),
        sdf_block(&[("ChEBI ID", "Z"), ("Formula", "H2O")]),
    ]))
}

fn collect(pipeline: &FusionPipeline) -> Vec<FusedDocument> {
    pipeline
        .generate_documents()
        .collect::<Result<_, _>>()
        .expect("fused documents")
}

#[test]
fn emits_one_document_per_id_in_either_source() {
    let pipeline =
        FusionPipeline::from_sources(synthetic_reader(), synthetic_obo(), FusionConfig::default());
    let documents = collect(&pipeline);

    let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "D", "Z", "B", "C", "E"]);

    let unique: HashSet<&str> = ids.iter().copied().collect();
    assert_eq!(unique.len(), documents.len());

    let origins: Vec<DocumentOrigin> = documents.iter().map(|d| d.origin).collect();
    assert_eq!(
        origins,
        vec![
            DocumentOrigin::Merged,
            DocumentOrigin::Merged,
            DocumentOrigin::CompoundOnly,
            DocumentOrigin::OntologyOnly,
            DocumentOrigin::OntologyOnly,
            DocumentOrigin::OntologyOnly,
        ]
    );
}

#[test]
fn compound_fields_win_over_ontology_fields() {
    let pipeline =
        FusionPipeline::from_sources(synthetic_reader(), synthetic_obo(), FusionConfig::default());
    let documents = collect(&pipeline);
    let a = &documents[0];

    assert_eq!(a.fields["name"], json!(["Y"]));
    assert_eq!(a.fields["star"], json!(2));
    assert_eq!(a.fields["id"], json!(["A"]));
    assert_eq!(a.fields["num_descendants"], json!(2));
    assert_eq!(a.fields["children"], json!(["B"]));
}

#[test]
fn compound_only_record_is_emitted_unchanged() {
    let pipeline =
        FusionPipeline::from_sources(synthetic_reader(), synthetic_obo(), FusionConfig::default());
    let documents = collect(&pipeline);
    let z = &documents[2];

    assert_eq!(z.fields.len(), 2);
    assert_eq!(z.fields["formula"], json!(["H2O"]));
    assert!(!z.fields.contains_key("num_children"));
}

#[test]
fn non_is_a_edges_do_not_join_families() {
    let pipeline =
        FusionPipeline::from_sources(synthetic_reader(), synthetic_obo(), FusionConfig::default());
    let documents = collect(&pipeline);
    let e = documents.iter().find(|d| d.id == "E").expect("E");

    assert_eq!(e.fields["num_ancestors"], json!(0));
    assert_eq!(e.fields["relationship"], json!({"has_part": ["A"]}));
}

#[test]
fn stats_track_every_branch() {
    let pipeline =
        FusionPipeline::from_sources(synthetic_reader(), synthetic_obo(), FusionConfig::default());
    let mut documents = pipeline.generate_documents();
    for document in documents.by_ref() {
        document.expect("document");
    }
    let stats = documents.stats();
    assert_eq!(stats.merged, 2);
    assert_eq!(stats.compound_only, 1);
    assert_eq!(stats.ontology_only, 3);
    assert_eq!(stats.emitted(), 6);
}

#[test]
fn finalized_documents_use_the_envelope() {
    let pipeline =
        FusionPipeline::from_sources(synthetic_reader(), synthetic_obo(), FusionConfig::default());
    let envelopes: Vec<serde_json::Value> = pipeline
        .documents()
        .map(|doc| serde_json::to_value(doc.expect("document")).expect("json"))
        .collect();

    assert_eq!(envelopes.len(), 6);
    assert_eq!(envelopes[0]["_id"], json!("A"));
    assert_eq!(envelopes[0]["chebi"]["name"], json!("Y"));
    assert_eq!(envelopes[0]["chebi"]["star"], json!(2));
    assert_eq!(envelopes[1]["chebi"]["charge"], json!(0));
    // empty family lists are swept, true counts stay
    assert!(envelopes[1]["chebi"].get("children").is_none());
    assert_eq!(envelopes[1]["chebi"]["num_children"], json!(0));

    let ids: BTreeSet<&str> = envelopes
        .iter()
        .filter_map(|e| e["_id"].as_str())
        .collect();
    assert_eq!(
        ids,
        ["A", "B", "C", "D", "E", "Z"]
            .into_iter()
            .collect::<BTreeSet<&str>>()
    );
}

#[test]
fn capacity_comes_from_configuration() {
    let config = FusionConfig {
        ontology: OntologyConfig {
            family_capacity: 1,
            ..OntologyConfig::default()
        },
        ..FusionConfig::default()
    };
    let pipeline = FusionPipeline::from_sources(synthetic_reader(), synthetic_obo(), config);
    let documents = collect(&pipeline);
    let a = &documents[0];

    assert_eq!(a.fields["num_descendants"], json!(2));
    assert_eq!(a.fields["descendants"].as_array().map(Vec::len), Some(1));
}

fn duplicate_reader() -> CompoundReader {
    CompoundReader::new(sdf_dump(&[
        sdf_block(&[("ChEBI ID", "A"), ("ChEBI Name", "first")]),
        sdf_block(&[("ChEBI ID", "A"), ("ChEBI Name", "second")]),
    ]))
}

#[test]
fn keep_first_skips_repeated_ids() {
    let builder = OntologyDocumentBuilder::new(
        OntologyGraph::from_obo(synthetic_obo()),
        OntologyConfig::default(),
    );
    let reader = duplicate_reader();
    let mut stream = fuse_records(&builder, reader.records(), DuplicateIdPolicy::KeepFirst);
    let documents: Vec<FusedDocument> = stream
        .by_ref()
        .collect::<Result<_, _>>()
        .expect("documents");

    let a: Vec<&FusedDocument> = documents.iter().filter(|d| d.id == "A").collect();
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].fields["name"], json!(["first"]));
    assert_eq!(documents.len(), 5);
    assert_eq!(stream.stats().duplicates_skipped, 1);
}

#[test]
fn reject_fails_on_repeated_ids() {
    let builder = OntologyDocumentBuilder::new(
        OntologyGraph::from_obo(synthetic_obo()),
        OntologyConfig::default(),
    );
    let reader = duplicate_reader();
    let results: Vec<Result<FusedDocument, FusionError>> =
        fuse_records(&builder, reader.records(), DuplicateIdPolicy::Reject).collect();

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(&results[1], Err(FusionError::DuplicateId(id)) if id == "A"));
}

#[test]
fn malformed_block_ends_the_stream() {
    let mut dump = sdf_dump(&[sdf_block(&[("ChEBI ID", "A")])]);
    dump.push_str("M  END\n> <Broken\n$$$$\n");
    let pipeline = FusionPipeline::from_sources(
        CompoundReader::new(dump),
        synthetic_obo(),
        FusionConfig::default(),
    );

    let results: Vec<Result<FusedDocument, FusionError>> =
        pipeline.generate_documents().collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(&results[1], Err(FusionError::Sdf(_))));
}

#[test]
fn memoized_pipeline_matches_plain_pipeline() {
    let memoized = FusionConfig {
        ontology: OntologyConfig {
            memoize_families: true,
            ..OntologyConfig::default()
        },
        ..FusionConfig::default()
    };
    let plain = FusionPipeline::from_sources(synthetic_reader(), synthetic_obo(), FusionConfig::default());
    let cached = FusionPipeline::from_sources(synthetic_reader(), synthetic_obo(), memoized);

    assert_eq!(collect(&plain), collect(&cached));
}

#[test]
fn numeric_looking_ids_are_finalized_as_strings() {
    let mut numeric = OboNode::new("12345");
    numeric.is_a = vec!["A".to_string()];
    let obo = OboGraph::from_nodes(vec![OboNode::new("A"), numeric]);
    let reader = CompoundReader::new(sdf_dump(&[sdf_block(&[
        ("ChEBI ID", "777"),
        ("Charge", "1"),
    ])]));
    let pipeline = FusionPipeline::from_sources(reader, obo, FusionConfig::default());

    let envelopes: Vec<serde_json::Value> = pipeline
        .documents()
        .map(|doc| serde_json::to_value(doc.expect("document")).expect("json"))
        .collect();

    let ids: Vec<&str> = envelopes
        .iter()
        .filter_map(|e| e["_id"].as_str())
        .collect();
    assert_eq!(ids, vec!["777", "A", "12345"]);
    assert_eq!(envelopes[0]["chebi"]["id"], json!("777"));
    assert_eq!(envelopes[0]["chebi"]["charge"], json!(1));
    assert_eq!(envelopes[1]["chebi"]["children"], json!("12345"));
    assert_eq!(envelopes[1]["chebi"]["num_children"], json!(1));
    assert_eq!(envelopes[2]["chebi"]["id"], json!("12345"));
    assert_eq!(envelopes[2]["chebi"]["parents"], json!("A"));
}
