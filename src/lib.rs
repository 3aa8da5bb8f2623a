pub mod collectors;
pub mod error;
pub mod exec;
pub mod model;
pub mod parse;

pub use collectors::Collector;
pub use error::CollectError;
pub use model::{
    AggregateSnapshot, CpuMetrics, CpuTimes, DiskHealth, DiskMetrics, HealthStatus, MemoryMetrics,
    PlatformKind, Sampled, SystemIdentity,
};
