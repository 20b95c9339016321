// Detector Pipe Core Services

pub mod audit;
pub mod config_store;
pub mod pipe;
pub mod providers;

pub use audit::{AuditSink, MemorySink, TracingSink};
pub use config_store::{ConfigStore, Environment, PipeConfig, ProcessEnvironment};
pub use providers::{DetectionRequest, DetectionTransport, DetectorError, HttpTransport, ProviderConfig};
