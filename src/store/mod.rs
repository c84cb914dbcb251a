//! Durable local cache of uploaded document bytes.
//!
//! The backend never returns raw bytes after the upload response, so this
//! store is the only place a reload can recover them from.

pub mod blob;
pub mod schema;

pub use blob::{BlobStore, SqliteBlobStore};
pub use schema::LocalBlobEntry;
