//! ScanVault Storage Library
//!
//! Storage abstraction and implementations for uploaded file bytes. Includes the
//! `ObjectStorage` trait, a local filesystem backend, and S3/Azure backends built
//! on `object_store`.
//!
//! # Storage key format
//!
//! Objects are keyed as `uploads/{file_id}{ext}`. The file id is a fresh UUID per
//! upload, so a `put` can never silently overwrite an existing object. Keys must
//! not contain `..` or a leading `/`. Key generation is centralized in the `keys`
//! module so all backends stay consistent.

pub mod factory;
pub mod keys;
pub mod local;
pub mod remote;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use local::LocalStorage;
pub use remote::ObjectStoreStorage;
pub use traits::{ByteStream, ObjectStorage, StorageError, StorageResult};
