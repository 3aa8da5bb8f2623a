pub mod cpu;
pub mod disk;
pub mod identity;
pub mod memory;

use crate::error::CollectError;
use crate::model::{
    AggregateSnapshot, CpuMetrics, DiskMetrics, Fallback, MemoryMetrics, PlatformKind, Sampled,
    SystemIdentity,
};
use self::cpu::CpuTracker;
use self::disk::DiskSource;
use std::future::Future;
use sysinfo::{System, SystemExt};
use tokio::sync::Mutex;
use tracing::warn;

/// Single entry point for the display layer. One instance per process; every
/// query samples "now" and is total: failures surface as fallback values
/// with `ok = false`, never as errors.
pub struct Collector {
    platform: PlatformKind,
    disk_source: DiskSource,
    system: Mutex<System>,
    cpu_tracker: CpuTracker,
}

impl Collector {
    pub fn new() -> Self {
        Self::with_platform(PlatformKind::detect())
    }

    pub fn with_platform(platform: PlatformKind) -> Self {
        Self {
            platform,
            disk_source: DiskSource::for_platform(platform),
            system: Mutex::new(System::new()),
            cpu_tracker: CpuTracker::new(),
        }
    }

    pub async fn system_identity(&self) -> Sampled<SystemIdentity> {
        guard(
            "system_identity",
            identity::collect(&self.system, self.platform),
        )
        .await
    }

    pub async fn cpu_metrics(&self) -> Sampled<CpuMetrics> {
        guard(
            "cpu_metrics",
            cpu::collect(&self.system, &self.cpu_tracker, self.platform),
        )
        .await
    }

    pub async fn memory_metrics(&self) -> Sampled<MemoryMetrics> {
        guard("memory_metrics", memory::collect(&self.system)).await
    }

    pub async fn disk_metrics(&self) -> Sampled<DiskMetrics> {
        guard("disk_metrics", self.disk_source.collect()).await
    }

    /// Fans the four queries out concurrently; each one falls back
    /// independently, so a failing sub-query never corrupts the others.
    pub async fn aggregate_snapshot(&self) -> AggregateSnapshot {
        let (system, cpu, memory, disk) = tokio::join!(
            self.system_identity(),
            self.cpu_metrics(),
            self.memory_metrics(),
            self.disk_metrics(),
        );
        AggregateSnapshot {
            system,
            cpu,
            memory,
            disk,
        }
    }
}

impl Default for Collector {
    fn default() -> Self {
        Self::new()
    }
}

/// The one place errors are converted into fallbacks.
async fn guard<T, F>(op: &'static str, fut: F) -> Sampled<T>
where
    T: Fallback,
    F: Future<Output = Result<T, CollectError>>,
{
    match fut.await {
        Ok(data) => Sampled::ok(data),
        Err(err) => {
            warn!(op, error = %err, "query failed, substituting fallback");
            Sampled::fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_operation_is_total_on_an_unsupported_platform() {
        let collector = Collector::with_platform(PlatformKind::Other);

        let identity = collector.system_identity().await;
        assert!(identity.ok);

        let cpu = collector.cpu_metrics().await;
        assert!(cpu.ok);
        assert_eq!(cpu.data.usage_percent, 0.0);

        let memory = collector.memory_metrics().await;
        assert!(memory.ok);

        // No capacity source exists, so this is the documented fallback.
        let disk = collector.disk_metrics().await;
        assert!(!disk.ok);
        assert_eq!(disk.data.total_bytes, 0);
        assert_eq!(disk.data.usage_percent, 0.0);
        assert_eq!(disk.data.health, None);
    }

    #[tokio::test]
    async fn aggregate_assembles_independent_samples() {
        let collector = Collector::with_platform(PlatformKind::Other);
        let snapshot = collector.aggregate_snapshot().await;

        assert!(snapshot.system.ok);
        assert!(snapshot.cpu.ok);
        assert!(snapshot.memory.ok);
        assert!(!snapshot.disk.ok);
        assert_eq!(snapshot.disk.data.total_bytes, 0);
    }

    #[tokio::test]
    async fn first_cpu_sample_reports_zero_usage() {
        let collector = Collector::with_platform(PlatformKind::detect());
        let cpu = collector.cpu_metrics().await;
        assert!(cpu.ok);
        assert_eq!(cpu.data.usage_percent, 0.0);
    }

    #[tokio::test]
    async fn concurrent_cpu_queries_stay_in_range() {
        let collector = std::sync::Arc::new(Collector::new());
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let collector = collector.clone();
            tasks.push(tokio::spawn(async move { collector.cpu_metrics().await }));
        }
        for task in tasks {
            let cpu = task.await.expect("task completes");
            assert!((0.0..=100.0).contains(&cpu.data.usage_percent));
        }
    }
}
