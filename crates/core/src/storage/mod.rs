//! Blob store abstraction.
//!
//! This module provides a `BlobStore` trait answering "does this object
//! exist" and "give me this JSON document", plus an Azure Blob Storage
//! implementation.

mod azure;
mod connection;
mod shared_key;
mod types;

pub use azure::AzureBlobStore;
pub use connection::ConnectionString;
pub use types::*;
