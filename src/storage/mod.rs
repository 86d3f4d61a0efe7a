//! Blob storage for uploaded images.
//!
//! The [`container::BlobContainer`] trait abstracts over where image bytes
//! live.  [`azure::AzureBlobContainer`] talks to Azure Blob Storage;
//! [`memory::MemoryBlobContainer`] keeps everything in process.

pub mod azure;
pub mod connection_string;
pub mod container;
pub mod memory;
