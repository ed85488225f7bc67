//! Client-certificate lookup: read-only stores and subject resolution.

pub mod resolver;
pub mod store;

pub use resolver::CertificateResolver;
pub use store::{CertificateStore, DirectoryCertificateStore, MemoryCertificateStore, StoreSession};
