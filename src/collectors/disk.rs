use crate::error::CollectError;
use crate::exec;
use crate::model::{ratio_percent, DiskHealth, DiskMetrics, PlatformKind};
use crate::parse;
use std::future::Future;
use tracing::debug;

/// Candidate device paths for the SMART probe, tried in order; the first
/// one whose diagnostic reports as available wins.
pub const SMART_DEVICE_CANDIDATES: &[&str] = &["/dev/sda", "/dev/nvme0n1", "/dev/sdb", "/dev/nvme0"];
pub const WINDOWS_SYSTEM_VOLUME: &str = "C:";
pub const ROOT_MOUNT: &str = "/";

/// Anything shorter is tool noise, not a diagnostic report.
const MIN_USABLE_SMART_OUTPUT: usize = 10;

/// Platform-specific origin of disk capacity and health data, selected once
/// at collector construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskSource {
    Windows,
    Unix,
    Unsupported,
}

impl DiskSource {
    pub fn for_platform(platform: PlatformKind) -> Self {
        match platform {
            PlatformKind::Windows => Self::Windows,
            p if p.is_unix_like() => Self::Unix,
            _ => Self::Unsupported,
        }
    }

    /// Capacity first, then the health sub-pipeline; health is always
    /// attached, even when fully unavailable.
    pub(crate) async fn collect(self) -> Result<DiskMetrics, CollectError> {
        let (total_bytes, used_bytes, free_bytes) = self.capacity().await?;
        let health = self.health().await;
        Ok(DiskMetrics {
            total_bytes,
            used_bytes,
            free_bytes,
            usage_percent: ratio_percent(used_bytes, total_bytes),
            health: Some(health),
        })
    }

    async fn capacity(self) -> Result<(u64, u64, u64), CollectError> {
        match self {
            Self::Windows => {
                let selector = format!("DeviceID='{WINDOWS_SYSTEM_VOLUME}'");
                let text = exec::run_tool(
                    "wmic",
                    &[
                        "logicaldisk",
                        "where",
                        &selector,
                        "get",
                        "Size,FreeSpace",
                        "/format:list",
                    ],
                )
                .await?;
                parse::parse_wmic_volume(&text).ok_or_else(|| {
                    CollectError::Parse("logicaldisk output had no Size/FreeSpace".to_string())
                })
            }
            Self::Unix => {
                let text = exec::run_tool("df", &["-k", ROOT_MOUNT]).await?;
                parse::parse_df_output(&text).ok_or_else(|| {
                    CollectError::Parse("df output had no usable data row".to_string())
                })
            }
            Self::Unsupported => Err(CollectError::SourceUnavailable(
                "no disk capacity source for this platform".to_string(),
            )),
        }
    }

    pub(crate) async fn health(self) -> DiskHealth {
        match self {
            Self::Windows => {
                let output = exec::run_tool(
                    "wmic",
                    &[
                        "diskdrive",
                        "get",
                        "Model,SerialNumber,Status",
                        "/format:list",
                    ],
                )
                .await;
                match output {
                    Ok(text) => parse::parse_wmic_disk_health(&text),
                    Err(err) => {
                        debug!(error = %err, "diskdrive enumeration failed");
                        DiskHealth::default()
                    }
                }
            }
            Self::Unix => {
                probe_smart_candidates(SMART_DEVICE_CANDIDATES, |device| async move {
                    exec::run_tool("smartctl", &["-a", device]).await
                })
                .await
            }
            Self::Unsupported => DiskHealth::default(),
        }
    }
}

/// Walks the candidate list until a device yields an available diagnostic.
/// A failed or empty probe moves on; a candidate that parses but reports
/// unavailable also moves on; exhaustion yields the unavailable default.
pub(crate) async fn probe_smart_candidates<F, Fut>(devices: &[&'static str], mut run: F) -> DiskHealth
where
    F: FnMut(&'static str) -> Fut,
    Fut: Future<Output = Result<String, CollectError>>,
{
    for &device in devices {
        let text = match run(device).await {
            Ok(text) => text,
            Err(err) => {
                debug!(device, error = %err, "smart probe unavailable");
                continue;
            }
        };
        if text.trim().len() < MIN_USABLE_SMART_OUTPUT {
            continue;
        }
        let health = parse::parse_smart_report(&text);
        if health.smart_available {
            return health;
        }
    }
    DiskHealth::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HealthStatus;
    use std::sync::{Arc, Mutex};

    const AVAILABLE_REPORT: &str = "\
SMART support is: Enabled
SMART overall-health self-assessment test result: PASSED
194 Temperature_Celsius     0x0022   062   045   000    Old_age   Always       -       36
";

    fn recording_runner(
        outcomes: Vec<Result<String, CollectError>>,
    ) -> (
        Arc<Mutex<Vec<&'static str>>>,
        impl FnMut(&'static str) -> std::future::Ready<Result<String, CollectError>>,
    ) {
        let invoked = Arc::new(Mutex::new(Vec::new()));
        let log = invoked.clone();
        let mut outcomes = outcomes.into_iter();
        let run = move |device: &'static str| {
            log.lock().expect("test lock").push(device);
            std::future::ready(
                outcomes
                    .next()
                    .unwrap_or(Err(CollectError::SourceUnavailable("exhausted".into()))),
            )
        };
        (invoked, run)
    }

    #[tokio::test]
    async fn probe_stops_at_first_available_candidate() {
        let (invoked, run) = recording_runner(vec![
            Err(CollectError::SourceUnavailable("binary missing".into())),
            Ok(AVAILABLE_REPORT.to_string()),
        ]);
        let health = probe_smart_candidates(&["/dev/a", "/dev/b", "/dev/c"], run).await;

        assert!(health.smart_available);
        assert_eq!(health.status, HealthStatus::Good);
        assert_eq!(health.temperature_celsius, Some(36));
        assert_eq!(*invoked.lock().expect("test lock"), vec!["/dev/a", "/dev/b"]);
    }

    #[tokio::test]
    async fn unavailable_parse_continues_the_loop() {
        let (invoked, run) = recording_runner(vec![
            Ok("smartctl output without any support marker lines".to_string()),
            Ok(AVAILABLE_REPORT.to_string()),
        ]);
        let health = probe_smart_candidates(&["/dev/a", "/dev/b"], run).await;

        assert!(health.smart_available);
        assert_eq!(*invoked.lock().expect("test lock"), vec!["/dev/a", "/dev/b"]);
    }

    #[tokio::test]
    async fn short_output_is_skipped() {
        let (invoked, run) = recording_runner(vec![
            Ok("err".to_string()),
            Ok(AVAILABLE_REPORT.to_string()),
        ]);
        let health = probe_smart_candidates(&["/dev/a", "/dev/b"], run).await;
        assert!(health.smart_available);
        assert_eq!(invoked.lock().expect("test lock").len(), 2);
    }

    #[tokio::test]
    async fn exhausted_probe_is_the_unavailable_default() {
        let (invoked, run) = recording_runner(vec![
            Err(CollectError::Timeout {
                tool: "smartctl".to_string(),
            }),
            Err(CollectError::SourceUnavailable("binary missing".into())),
        ]);
        let health = probe_smart_candidates(&["/dev/a", "/dev/b"], run).await;
        assert_eq!(health, DiskHealth::default());
        assert_eq!(invoked.lock().expect("test lock").len(), 2);
    }

    #[tokio::test]
    async fn unsupported_platform_skips_the_adapter() {
        let health = DiskSource::Unsupported.health().await;
        assert_eq!(health, DiskHealth::default());

        let err = DiskSource::Unsupported
            .collect()
            .await
            .expect_err("no capacity source");
        assert!(matches!(err, CollectError::SourceUnavailable(_)));
    }

    #[test]
    fn source_selection_follows_the_platform() {
        assert_eq!(
            DiskSource::for_platform(PlatformKind::Windows),
            DiskSource::Windows
        );
        assert_eq!(DiskSource::for_platform(PlatformKind::Linux), DiskSource::Unix);
        assert_eq!(DiskSource::for_platform(PlatformKind::Macos), DiskSource::Unix);
        assert_eq!(
            DiskSource::for_platform(PlatformKind::Other),
            DiskSource::Unsupported
        );
    }
}
