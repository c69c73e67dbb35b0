//! Document fusion for Chemfuse.
//!
//! Joins the flat compound records (`chemfuse-ingest-sdf`) with the ontology
//! family documents (`chemfuse-ingest-obo`) into one document per entity id,
//! then finalizes each document into an `{_id, <payload>}` envelope for bulk
//! indexing.
//!
//! - [`fusion`]: the two-phase [`FusionPipeline`].
//! - [`finalize`]: null sweeping, singleton unlisting, number coercion.
//! - [`config`]: [`FusionConfig`] and the duplicate-id policy.

pub mod config;
pub mod finalize;
pub mod fusion;

use chemfuse_ingest_sdf::SdfError;

pub use config::{DuplicateIdPolicy, FusionConfig};
pub use finalize::{DocumentFinalizer, IndexDocument};
pub use fusion::{fuse_records, DocumentOrigin, FusedDocument, FusedDocuments, FusionPipeline, FusionStats};

#[derive(Debug, thiserror::Error)]
pub enum FusionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sdf(#[from] SdfError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate compound id `{0}`")]
    DuplicateId(String),
    #[error("finalized document has no string `id`")]
    MissingId,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
