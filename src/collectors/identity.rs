use crate::error::CollectError;
use crate::model::{PlatformKind, SystemIdentity};
use sysinfo::{System, SystemExt};
use tokio::sync::Mutex;

pub(crate) async fn collect(
    system: &Mutex<System>,
    platform: PlatformKind,
) -> Result<SystemIdentity, CollectError> {
    let sys = system.lock().await;
    let version = sys
        .os_version()
        .or_else(|| sys.kernel_version())
        .unwrap_or_else(|| "Unknown".to_string());
    let uptime_seconds = sys.uptime();
    drop(sys);

    Ok(SystemIdentity {
        platform,
        version,
        arch: std::env::consts::ARCH.to_string(),
        uptime_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identity_reports_the_running_platform() {
        let system = Mutex::new(System::new());
        let platform = PlatformKind::detect();
        let identity = collect(&system, platform).await.expect("identity is total");
        assert_eq!(identity.platform, platform);
        assert!(!identity.version.is_empty());
        assert_eq!(identity.arch, std::env::consts::ARCH);
    }
}
