pub mod audit_log;
pub mod registry;

pub use audit_log::AuditLogger;
pub use registry::{
    BlobStore, LocalBlobStore, LocalModelRegistry, ModelRegistry, RegistryLocation, S3BlobStore,
    S3ModelRegistry, VersionedRegistry, open_registry,
};
