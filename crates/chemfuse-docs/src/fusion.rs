//! Two-phase compound/ontology fusion.
//!
//! Phase 1 walks the compound records in dump order. A record whose id is a
//! graph node is merged over that node's ontology document (compound fields
//! win on key collisions); otherwise it is emitted alone. Every id is marked
//! as used.
//!
//! Phase 2 starts once the record stream is drained and emits the ontology
//! document of every graph node that was never used, in node declaration
//! order.
//!
//! The output holds exactly one document per id in
//! `graph ids ∪ compound ids`.

use crate::config::{DuplicateIdPolicy, FusionConfig};
use crate::finalize::{DocumentFinalizer, IndexDocument};
use crate::FusionError;
use chemfuse_ingest_obo::{NodeIds, OboGraph, OntologyDocumentBuilder, OntologyGraph};
use chemfuse_ingest_sdf::{CompoundReader, CompoundRecord, SdfError};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOrigin {
    /// Compound record merged over its ontology document.
    Merged,
    /// Compound record with no graph node.
    CompoundOnly,
    /// Graph node with no compound record.
    OntologyOnly,
}

/// One fused, not yet finalized document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedDocument {
    pub id: String,
    pub origin: DocumentOrigin,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FusionStats {
    pub merged: usize,
    pub compound_only: usize,
    pub ontology_only: usize,
    pub duplicates_skipped: usize,
}

impl FusionStats {
    pub fn emitted(&self) -> usize {
        self.merged + self.compound_only + self.ontology_only
    }
}

/// Lazy fused-document stream; see the module docs for the emission order.
///
/// The first error ends the stream.
pub struct FusedDocuments<'b, I> {
    builder: &'b OntologyDocumentBuilder,
    records: Option<I>,
    policy: DuplicateIdPolicy,
    used: HashSet<String>,
    /// Graph nodes not yet considered by phase 2.
    pending: NodeIds<'b>,
    stats: FusionStats,
    halted: bool,
    finished: bool,
}

/// Fuse an arbitrary compound record stream with `builder`'s graph.
pub fn fuse_records<'b, I>(
    builder: &'b OntologyDocumentBuilder,
    records: I,
    policy: DuplicateIdPolicy,
) -> FusedDocuments<'b, I::IntoIter>
where
    I: IntoIterator<Item = Result<CompoundRecord, SdfError>>,
{
    FusedDocuments {
        builder,
        records: Some(records.into_iter()),
        policy,
        used: HashSet::new(),
        pending: builder.graph().node_ids(),
        stats: FusionStats::default(),
        halted: false,
        finished: false,
    }
}

impl<I> FusedDocuments<'_, I>
where
    I: Iterator<Item = Result<CompoundRecord, SdfError>>,
{
    pub fn stats(&self) -> &FusionStats {
        &self.stats
    }

    fn halt(&mut self) {
        self.records = None;
        self.halted = true;
    }

    fn fuse(&mut self, record: CompoundRecord) -> Result<Option<FusedDocument>, FusionError> {
        let id = record.id().to_string();
        if self.used.contains(&id) {
            return match self.policy {
                DuplicateIdPolicy::KeepFirst => {
                    tracing::debug!(id = %id, "skipping repeated compound id");
                    self.stats.duplicates_skipped += 1;
                    Ok(None)
                }
                DuplicateIdPolicy::Reject => Err(FusionError::DuplicateId(id)),
            };
        }

        let document = match self.builder.read_ontology(&id) {
            Some(ontology) => {
                let mut fields = ontology.into_fields()?;
                fields.extend(record.into_fields());
                self.stats.merged += 1;
                FusedDocument {
                    id: id.clone(),
                    origin: DocumentOrigin::Merged,
                    fields,
                }
            }
            None => {
                self.stats.compound_only += 1;
                FusedDocument {
                    id: id.clone(),
                    origin: DocumentOrigin::CompoundOnly,
                    fields: record.into_fields(),
                }
            }
        };
        self.used.insert(id);
        Ok(Some(document))
    }

    fn next_ontology_only(&mut self) -> Option<Result<FusedDocument, FusionError>> {
        let builder = self.builder;
        for id in self.pending.by_ref() {
            if self.used.contains(id) {
                continue;
            }
            let Some(ontology) = builder.read_ontology(id) else {
                continue;
            };
            self.stats.ontology_only += 1;
            return Some(ontology.into_fields().map_err(FusionError::from).map(|fields| {
                FusedDocument {
                    id: id.to_string(),
                    origin: DocumentOrigin::OntologyOnly,
                    fields,
                }
            }));
        }
        None
    }
}

impl<I> Iterator for FusedDocuments<'_, I>
where
    I: Iterator<Item = Result<CompoundRecord, SdfError>>,
{
    type Item = Result<FusedDocument, FusionError>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(records) = self.records.as_mut() {
            match records.next() {
                Some(Ok(record)) => match self.fuse(record) {
                    Ok(Some(document)) => return Some(Ok(document)),
                    Ok(None) => continue,
                    Err(err) => {
                        self.halt();
                        return Some(Err(err));
                    }
                },
                Some(Err(err)) => {
                    self.halt();
                    return Some(Err(err.into()));
                }
                None => {
                    self.records = None;
                    tracing::info!(
                        used_ids = self.used.len(),
                        merged = self.stats.merged,
                        compound_only = self.stats.compound_only,
                        "compound records drained"
                    );
                }
            }
        }

        if self.halted || self.finished {
            return None;
        }
        if let Some(document) = self.next_ontology_only() {
            return Some(document);
        }

        self.finished = true;
        tracing::info!(
            emitted = self.stats.emitted(),
            merged = self.stats.merged,
            compound_only = self.stats.compound_only,
            ontology_only = self.stats.ontology_only,
            duplicates_skipped = self.stats.duplicates_skipped,
            "fusion complete"
        );
        None
    }
}

/// Compound dump + ontology graph + configuration.
#[derive(Debug)]
pub struct FusionPipeline {
    reader: CompoundReader,
    builder: OntologyDocumentBuilder,
    config: FusionConfig,
}

impl FusionPipeline {
    pub fn new(reader: CompoundReader, builder: OntologyDocumentBuilder, config: FusionConfig) -> Self {
        Self {
            reader,
            builder,
            config,
        }
    }

    /// Build the ontology graph from `obo` and wire it to `reader`.
    pub fn from_sources(reader: CompoundReader, obo: OboGraph, config: FusionConfig) -> Self {
        let builder = OntologyDocumentBuilder::new(OntologyGraph::from_obo(obo), config.ontology);
        Self::new(reader, builder, config)
    }

    pub fn builder(&self) -> &OntologyDocumentBuilder {
        &self.builder
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Raw fused documents.
    pub fn generate_documents(
        &self,
    ) -> FusedDocuments<'_, impl Iterator<Item = Result<CompoundRecord, SdfError>> + '_> {
        fuse_records(&self.builder, self.reader.records(), self.config.duplicate_ids)
    }

    /// Finalized `{_id, <payload_key>}` envelopes.
    pub fn documents(&self) -> impl Iterator<Item = Result<IndexDocument, FusionError>> + '_ {
        let finalizer = DocumentFinalizer::new(self.config.payload_key.clone());
        self.generate_documents()
            .map(move |document| document.and_then(|document| finalizer.finalize(document)))
    }
}
