//! Storage layer: document database (Cosmos DB REST or in-memory) and blob
//! storage (Azure Blob REST or in-memory).

mod error;
pub use error::StoreError;

pub mod blob;
pub mod cosmos;
pub mod document;
pub mod memory;

pub use blob::{AzureBlobStore, BlobStore, MemoryBlobStore};
pub use cosmos::{CosmosAuth, CosmosStore};
pub use document::{DocumentStore, PatchOperation, Query, containers, query_as, read_as, upsert_as};
pub use memory::MemoryStore;
