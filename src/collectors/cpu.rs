use crate::error::CollectError;
use crate::exec;
use crate::model::{CpuMetrics, CpuTimes, PlatformKind};
use crate::parse;
use sysinfo::{CpuExt, System, SystemExt};
use tokio::sync::Mutex;
use tracing::debug;

const WMIC_PERF_CLASS: &str = "Win32_PerfRawData_PerfOS_Processor";
const WMIC_TOTAL_INSTANCE: &str = "_Total";

/// Previous aggregate counter pair for delta computation. The whole
/// read-modify-write in `usage_from` happens under one lock guard, so
/// concurrent queries cannot compute against the same prior and then both
/// overwrite it.
#[derive(Debug, Default)]
pub struct CpuTracker {
    prev: Mutex<Option<CpuTimes>>,
}

impl CpuTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Usage from the delta against the previous snapshot. No prior (first
    /// call) is defined as 0; the prior is overwritten on every call.
    pub async fn usage_from(&self, cores: &[CpuTimes]) -> f64 {
        let current = aggregate(cores);
        let mut prev = self.prev.lock().await;
        let usage = match *prev {
            None => 0.0,
            Some(last) => {
                let idle_delta = current.idle.saturating_sub(last.idle);
                let total_delta = current.total.saturating_sub(last.total);
                if total_delta == 0 {
                    0.0
                } else {
                    (100.0 - 100.0 * idle_delta as f64 / total_delta as f64).clamp(0.0, 100.0)
                }
            }
        };
        *prev = Some(current);
        usage
    }
}

fn aggregate(cores: &[CpuTimes]) -> CpuTimes {
    cores.iter().fold(CpuTimes::default(), |acc, core| CpuTimes {
        idle: acc.idle.saturating_add(core.idle),
        total: acc.total.saturating_add(core.total),
    })
}

/// Per-core raw time-bucket counters. Never fails: a host that cannot
/// provide counters yields an empty list, which aggregates to the zero
/// counter set and degrades usage to 0.
pub async fn read_core_times(platform: PlatformKind) -> Vec<CpuTimes> {
    match platform {
        PlatformKind::Linux => read_proc_stat(),
        PlatformKind::Windows => read_windows_perf_counters().await,
        _ => Vec::new(),
    }
}

fn read_proc_stat() -> Vec<CpuTimes> {
    match std::fs::read_to_string("/proc/stat") {
        Ok(text) => parse_proc_stat(&text),
        Err(err) => {
            debug!(error = %err, "cannot read /proc/stat");
            Vec::new()
        }
    }
}

pub(crate) fn parse_proc_stat(text: &str) -> Vec<CpuTimes> {
    text.lines().filter_map(parse_proc_stat_row).collect()
}

fn parse_proc_stat_row(line: &str) -> Option<CpuTimes> {
    let mut cols = line.split_whitespace();
    let name = cols.next()?;
    // Per-core rows only; "cpu" without a digit is the kernel's own aggregate.
    if !name.starts_with("cpu") || name == "cpu" {
        return None;
    }
    let ticks: Vec<u64> = cols.map_while(|c| c.parse().ok()).collect();
    if ticks.len() < 4 {
        return None;
    }
    let total = ticks.iter().fold(0_u64, |acc, t| acc.saturating_add(*t));
    let idle = ticks[3].saturating_add(ticks.get(4).copied().unwrap_or(0));
    Some(CpuTimes { idle, total })
}

async fn read_windows_perf_counters() -> Vec<CpuTimes> {
    let output = exec::run_tool(
        "wmic",
        &[
            "path",
            WMIC_PERF_CLASS,
            "get",
            "Name,PercentIdleTime,Timestamp_Sys100NS",
            "/format:list",
        ],
    )
    .await;
    match output {
        Ok(text) => parse_windows_perf_blocks(&text),
        Err(err) => {
            debug!(error = %err, "raw cpu counter query failed");
            Vec::new()
        }
    }
}

/// Raw perf counters arrive as one key=value block per core instance, with
/// idle time in 100 ns units and the system timestamp as the total base.
pub(crate) fn parse_windows_perf_blocks(text: &str) -> Vec<CpuTimes> {
    parse::key_value_blocks(text)
        .into_iter()
        .filter(|block| {
            block
                .get("Name")
                .map(|name| name != WMIC_TOTAL_INSTANCE)
                .unwrap_or(false)
        })
        .filter_map(|block| {
            let idle = block.get("PercentIdleTime")?.parse().ok()?;
            let total = block.get("Timestamp_Sys100NS")?.parse().ok()?;
            Some(CpuTimes { idle, total })
        })
        .collect()
}

pub(crate) async fn collect(
    system: &Mutex<System>,
    tracker: &CpuTracker,
    platform: PlatformKind,
) -> Result<CpuMetrics, CollectError> {
    let cores = read_core_times(platform).await;
    let usage_percent = tracker.usage_from(&cores).await;

    let mut sys = system.lock().await;
    sys.refresh_cpu();
    let model = sys
        .cpus()
        .first()
        .map(|c| c.brand().trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "Unknown CPU".to_string());
    let logical_cores = sys.cpus().len() as u32;

    Ok(CpuMetrics {
        model,
        cores: logical_cores,
        usage_percent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_query_is_zero_regardless_of_counters() {
        let tracker = CpuTracker::new();
        let usage = tracker
            .usage_from(&[CpuTimes {
                idle: 5_000_000,
                total: 9_000_000,
            }])
            .await;
        assert_eq!(usage, 0.0);
    }

    #[tokio::test]
    async fn usage_comes_from_the_delta_only() {
        let tracker = CpuTracker::new();
        tracker
            .usage_from(&[CpuTimes {
                idle: 100,
                total: 200,
            }])
            .await;
        let usage = tracker
            .usage_from(&[CpuTimes {
                idle: 150,
                total: 400,
            }])
            .await;
        // idle delta 50 over total delta 200 -> 75% busy.
        assert!((usage - 75.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn equal_snapshots_yield_zero() {
        let tracker = CpuTracker::new();
        let times = [CpuTimes {
            idle: 400,
            total: 900,
        }];
        tracker.usage_from(&times).await;
        assert_eq!(tracker.usage_from(&times).await, 0.0);
    }

    #[tokio::test]
    async fn usage_is_clamped_to_valid_range() {
        let tracker = CpuTracker::new();
        tracker
            .usage_from(&[CpuTimes {
                idle: 100,
                total: 200,
            }])
            .await;
        // Idle advancing faster than total would go negative without the clamp.
        let usage = tracker
            .usage_from(&[CpuTimes {
                idle: 500,
                total: 400,
            }])
            .await;
        assert_eq!(usage, 0.0);
    }

    #[tokio::test]
    async fn prior_is_overwritten_every_call() {
        let tracker = CpuTracker::new();
        tracker.usage_from(&[CpuTimes { idle: 0, total: 0 }]).await;
        tracker
            .usage_from(&[CpuTimes {
                idle: 100,
                total: 1000,
            }])
            .await;
        let usage = tracker
            .usage_from(&[CpuTimes {
                idle: 1100,
                total: 2000,
            }])
            .await;
        // All-idle delta against the second sample; against the first it
        // would read 45% busy.
        assert_eq!(usage, 0.0);
    }

    #[test]
    fn proc_stat_parses_per_core_rows() {
        let text = "\
cpu  1000 50 300 8000 200 0 20 0 0 0
cpu0 500 25 150 4000 100 0 10 0 0 0
cpu1 500 25 150 4000 100 0 10 0 0 0
intr 12345
ctxt 67890
";
        let cores = parse_proc_stat(text);
        assert_eq!(cores.len(), 2);
        assert_eq!(
            cores[0],
            CpuTimes {
                idle: 4100,
                total: 4785
            }
        );
        let agg = aggregate(&cores);
        assert_eq!(agg.idle, 8200);
        assert_eq!(agg.total, 9570);
    }

    #[test]
    fn proc_stat_ignores_short_rows() {
        assert!(parse_proc_stat("cpu0 1 2 3\n").is_empty());
        assert!(parse_proc_stat("").is_empty());
    }

    #[test]
    fn windows_blocks_exclude_the_total_instance() {
        let text = "\
Name=0
PercentIdleTime=4500000
Timestamp_Sys100NS=9000000

Name=1
PercentIdleTime=4400000
Timestamp_Sys100NS=9000000

Name=_Total
PercentIdleTime=8900000
Timestamp_Sys100NS=9000000
";
        let cores = parse_windows_perf_blocks(text);
        assert_eq!(cores.len(), 2);
        assert_eq!(
            cores[0],
            CpuTimes {
                idle: 4_500_000,
                total: 9_000_000
            }
        );
    }

    #[test]
    fn windows_blocks_skip_unparseable_instances() {
        let text = "Name=0\nPercentIdleTime=oops\nTimestamp_Sys100NS=9000000\n";
        assert!(parse_windows_perf_blocks(text).is_empty());
    }
}
