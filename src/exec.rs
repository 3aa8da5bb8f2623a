use crate::error::CollectError;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Hard bound on every external diagnostic tool invocation. A tool that has
/// not finished by then is killed and treated as unavailable for this cycle.
pub const TOOL_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run_tool(program: &str, args: &[&str]) -> Result<String, CollectError> {
    run_tool_with_timeout(program, args, TOOL_TIMEOUT).await
}

pub(crate) async fn run_tool_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, CollectError> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, command.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            return Err(CollectError::SourceUnavailable(format!("{program}: {err}")));
        }
        Err(_elapsed) => {
            return Err(CollectError::Timeout {
                tool: program.to_string(),
            });
        }
    };

    if !output.status.success() {
        return Err(CollectError::SourceUnavailable(format!(
            "{program} exited with {}",
            output.status
        )));
    }

    Ok(decode_tool_stdout(&output.stdout))
}

/// wmic emits UTF-16LE on most hosts; everything else is UTF-8.
pub(crate) fn decode_tool_stdout(bytes: &[u8]) -> String {
    if let Ok(utf8) = std::str::from_utf8(bytes) {
        return utf8.to_string();
    }

    if bytes.len() >= 2 && bytes.len() % 2 == 0 {
        let mut u16buf = Vec::with_capacity(bytes.len() / 2);
        let mut i = 0;
        while i + 1 < bytes.len() {
            u16buf.push(u16::from_le_bytes([bytes[i], bytes[i + 1]]));
            i += 2;
        }
        if let Ok(s) = String::from_utf16(&u16buf) {
            return s;
        }
    }

    String::from_utf8_lossy(bytes).to_string()
}
