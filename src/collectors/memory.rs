use crate::error::CollectError;
use crate::model::{ratio_percent, MemoryMetrics};
use sysinfo::{System, SystemExt};
use tokio::sync::Mutex;

pub(crate) async fn collect(system: &Mutex<System>) -> Result<MemoryMetrics, CollectError> {
    let mut sys = system.lock().await;
    sys.refresh_memory();
    // sysinfo reports KiB.
    let total = sys.total_memory().saturating_mul(1024);
    let free = sys.free_memory().saturating_mul(1024);
    drop(sys);

    Ok(metrics_from_counters(total, free))
}

/// Used is derived as total minus free so the accounting identity
/// `total = used + free` always holds.
pub(crate) fn metrics_from_counters(total_bytes: u64, free_bytes: u64) -> MemoryMetrics {
    let free_bytes = free_bytes.min(total_bytes);
    let used_bytes = total_bytes - free_bytes;
    MemoryMetrics {
        total_bytes,
        used_bytes,
        free_bytes,
        usage_percent: ratio_percent(used_bytes, total_bytes),
    }
}
