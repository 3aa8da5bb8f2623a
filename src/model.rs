use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    Windows,
    Linux,
    Macos,
    Other,
}

impl PlatformKind {
    pub fn detect() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => Self::Windows,
            "linux" => Self::Linux,
            "macos" => Self::Macos,
            _ => Self::Other,
        }
    }

    pub fn is_unix_like(self) -> bool {
        matches!(self, Self::Linux | Self::Macos)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemIdentity {
    pub platform: PlatformKind,
    pub version: String,
    pub arch: String,
    pub uptime_seconds: u64,
}

/// Raw CPU time-bucket counters, monotonically non-decreasing per source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CpuTimes {
    pub idle: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpuMetrics {
    pub model: String,
    pub cores: u32,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryMetrics {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Good,
    Warning,
    Critical,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiskHealth {
    pub smart_available: bool,
    pub status: HealthStatus,
    pub temperature_celsius: Option<u32>,
    pub power_on_hours: Option<u64>,
    pub power_cycle_count: Option<u64>,
    pub reallocated_sectors: Option<u64>,
    pub pending_sectors: Option<u64>,
    pub life_remaining_percent: Option<u8>,
    pub wear_leveling_count: Option<u64>,
    pub model: Option<String>,
    pub serial: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskMetrics {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub usage_percent: f64,
    pub health: Option<DiskHealth>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSnapshot {
    pub system: Sampled<SystemIdentity>,
    pub cpu: Sampled<CpuMetrics>,
    pub memory: Sampled<MemoryMetrics>,
    pub disk: Sampled<DiskMetrics>,
}

/// Sample envelope: the success flag travels next to the data, never merged
/// into it, so a consumer can tell "genuinely zero" from "unavailable".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sampled<T> {
    pub data: T,
    pub ok: bool,
}

impl<T> Sampled<T> {
    pub fn ok(data: T) -> Self {
        Self { data, ok: true }
    }
}

impl<T: Fallback> Sampled<T> {
    pub fn fallback() -> Self {
        Self {
            data: T::fallback(),
            ok: false,
        }
    }
}

/// Zero/unknown-valued stand-in of the correct shape, substituted when a
/// query fails.
pub trait Fallback {
    fn fallback() -> Self;
}

impl Fallback for SystemIdentity {
    fn fallback() -> Self {
        Self {
            platform: PlatformKind::Other,
            version: "Unknown".to_string(),
            arch: "Unknown".to_string(),
            uptime_seconds: 0,
        }
    }
}

impl Fallback for CpuMetrics {
    fn fallback() -> Self {
        Self {
            model: "Unknown CPU".to_string(),
            cores: 0,
            usage_percent: 0.0,
        }
    }
}

impl Fallback for MemoryMetrics {
    fn fallback() -> Self {
        Self {
            total_bytes: 0,
            used_bytes: 0,
            free_bytes: 0,
            usage_percent: 0.0,
        }
    }
}

impl Fallback for DiskMetrics {
    fn fallback() -> Self {
        Self {
            total_bytes: 0,
            used_bytes: 0,
            free_bytes: 0,
            usage_percent: 0.0,
            health: None,
        }
    }
}

pub fn ratio_percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (used as f64 / total as f64) * 100.0
}
