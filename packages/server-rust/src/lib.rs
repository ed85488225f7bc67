//! Mint Server: certificate stores, HTTPS channels, the dynamic service
//! invoker and the REST facade in front of the commerce web services.

pub mod catalog;
pub mod cert;
pub mod channel;
pub mod client;
pub mod config;
pub mod contract;
pub mod invoker;
pub mod network;
pub mod telemetry;

pub use cert::{CertificateResolver, CertificateStore, DirectoryCertificateStore, MemoryCertificateStore};
pub use channel::{Channel, ChannelFactory, HttpChannelFactory};
pub use client::{Attempt, CallError, ServiceClient};
pub use config::GatewayConfig;
pub use contract::{ContractRegistry, ServiceContract};
pub use invoker::DynamicServiceInvoker;
