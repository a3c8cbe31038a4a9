//! In-memory table indexes and hybrid fusion.
//!
//! Two independent indexes are built over the same catalog snapshot: a
//! lexical BM25 index over descriptor text and a dense vector index over
//! descriptor embeddings. [`fusion::fuse`] combines their rankings with
//! reciprocal rank fusion, gated on the lexical candidate pool.

pub mod fusion;
pub mod lexical;
pub mod vector;

pub use fusion::{fuse, FusedCandidate, FusionConfig};
pub use lexical::{LexicalHit, LexicalIndex};
pub use vector::{
    EmbeddingProvider, HashEmbedder, HttpEmbedder, IndexError, VectorHit, VectorIndex,
};
