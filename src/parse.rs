use crate::model::{DiskHealth, HealthStatus};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

const KIB: u64 = 1024;

/// Markers that prove the diagnostic itself is usable, independent of the
/// command's exit status or any individual field parsing.
const SMART_AVAILABLE_MARKERS: &[&str] = &["SMART support is: Enabled", "SMART/Health Information"];
const SMART_PASSED_MARKER: &str = "PASSED";
const WMIC_STATUS_OK_MARKER: &str = "Status=OK";

/// First `Key=Value` line whose value is non-empty after trimming.
pub fn key_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    for line in text.lines() {
        let Some(rest) = line.trim().strip_prefix(key) else {
            continue;
        };
        let Some(value) = rest.strip_prefix('=') else {
            continue;
        };
        let value = value.trim();
        if !value.is_empty() {
            return Some(value);
        }
    }
    None
}

/// Splits `/format:list` output into blank-line separated `Key=Value` blocks
/// (wmic emits one block per enumerated instance).
pub fn key_value_blocks(text: &str) -> Vec<HashMap<String, String>> {
    let mut blocks = Vec::new();
    let mut current: HashMap<String, String> = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim();
            if !value.is_empty() {
                current.insert(key.trim().to_string(), value.to_string());
            }
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// `df -k` style output: header line, then whitespace-delimited rows of
/// kibibyte counts. Returns the first row that yields a usable
/// (total, used, free) triple, scaled to bytes.
pub fn parse_df_output(text: &str) -> Option<(u64, u64, u64)> {
    let mut lines = text.trim().lines();
    let _header = lines.next()?;
    for row in lines {
        let cols: Vec<&str> = row.split_whitespace().collect();
        if cols.len() < 4 {
            continue;
        }
        let parsed = (
            cols[1].parse::<u64>(),
            cols[2].parse::<u64>(),
            cols[3].parse::<u64>(),
        );
        if let (Ok(total_kib), Ok(used_kib), Ok(free_kib)) = parsed {
            return Some((
                total_kib.saturating_mul(KIB),
                used_kib.saturating_mul(KIB),
                free_kib.saturating_mul(KIB),
            ));
        }
    }
    None
}

/// `wmic logicaldisk ... get Size,FreeSpace /format:list` for one volume.
pub fn parse_wmic_volume(text: &str) -> Option<(u64, u64, u64)> {
    let free = key_value(text, "FreeSpace")?.parse::<u64>().ok()?;
    let total = key_value(text, "Size")?.parse::<u64>().ok()?;
    let used = total.saturating_sub(free);
    Some((total, used, free))
}

/// `wmic diskdrive get Model,SerialNumber,Status /format:list`.
pub fn parse_wmic_disk_health(text: &str) -> DiskHealth {
    let mut health = DiskHealth::default();
    if text.contains(WMIC_STATUS_OK_MARKER) {
        health.status = HealthStatus::Good;
        health.smart_available = true;
    }
    if let Some(model) = key_value(text, "Model") {
        health.model = Some(model.to_string());
    }
    if let Some(serial) = key_value(text, "SerialNumber") {
        health.serial = Some(serial.to_string());
    }
    health
}

type FieldSetter = fn(&mut DiskHealth, &str);

/// One presence-optional field: candidate patterns in priority order (ATA
/// attribute-table rows first, labeled NVMe lines after) and the setter for
/// a successfully captured value.
struct FieldRule {
    patterns: &'static [&'static str],
    set: FieldSetter,
}

const SMART_FIELD_RULES: &[FieldRule] = &[
    FieldRule {
        patterns: &[
            r"(?m)Temperature_Celsius.*-\s+(\d+)",
            r"(?i)Temperature.*?(\d+)\s*Celsius",
            r"(?i)Temperature:\s*(\d+)",
        ],
        set: set_temperature,
    },
    FieldRule {
        patterns: &[
            r"(?m)Power_On_Hours.*-\s+([\d,]+)",
            r"(?i)Power On Hours:\s*([\d,]+)",
        ],
        set: set_power_on_hours,
    },
    FieldRule {
        patterns: &[
            r"(?m)Power_Cycle_Count.*-\s+([\d,]+)",
            r"(?i)Power Cycles:\s*([\d,]+)",
        ],
        set: set_power_cycle_count,
    },
    FieldRule {
        patterns: &[r"(?m)Reallocated_Sector_Ct.*-\s+([\d,]+)"],
        set: set_reallocated_sectors,
    },
    FieldRule {
        patterns: &[r"(?m)Current_Pending_Sector.*-\s+([\d,]+)"],
        set: set_pending_sectors,
    },
    FieldRule {
        patterns: &[
            r"(?m)Percent_Lifetime_Remain.*-\s+(\d+)",
            r"(?m)SSD_Life_Left.*-\s+(\d+)",
        ],
        set: set_life_remaining,
    },
    // NVMe reports consumed life, not remaining.
    FieldRule {
        patterns: &[r"(?i)Percentage Used:\s*(\d+)\s*%"],
        set: set_life_used,
    },
    FieldRule {
        patterns: &[r"(?m)Wear_Leveling_Count.*-\s+(\d+)"],
        set: set_wear_leveling,
    },
    FieldRule {
        patterns: &[r"(?m)^Device Model:\s*(.+)$", r"(?m)^Model Number:\s*(.+)$"],
        set: set_model,
    },
    FieldRule {
        patterns: &[r"(?m)^Serial Number:\s*(.+)$"],
        set: set_serial,
    },
];

fn compiled_rules() -> &'static Vec<(Vec<Regex>, FieldSetter)> {
    static RULES: OnceLock<Vec<(Vec<Regex>, FieldSetter)>> = OnceLock::new();
    RULES.get_or_init(|| {
        SMART_FIELD_RULES
            .iter()
            .map(|rule| {
                let patterns = rule
                    .patterns
                    .iter()
                    .filter_map(|p| Regex::new(p).ok())
                    .collect();
                (patterns, rule.set)
            })
            .collect()
    })
}

/// Extracts a `DiskHealth` from free-form SMART diagnostic text. Every field
/// runs its own pattern cascade, first non-empty capture wins; one field can
/// never abort the rest.
pub fn parse_smart_report(text: &str) -> DiskHealth {
    let mut health = DiskHealth {
        smart_available: SMART_AVAILABLE_MARKERS.iter().any(|m| text.contains(m)),
        ..DiskHealth::default()
    };

    for (patterns, set) in compiled_rules() {
        for re in patterns {
            let Some(caps) = re.captures(text) else {
                continue;
            };
            let Some(capture) = caps.get(1) else {
                continue;
            };
            let value = capture.as_str().trim();
            if !value.is_empty() {
                set(&mut health, value);
                break;
            }
        }
    }

    // Explicit positive marker only; absence never implies good.
    if text.contains(SMART_PASSED_MARKER) {
        health.status = HealthStatus::Good;
    }

    health
}

fn parse_numeric(raw: &str) -> Option<u64> {
    raw.replace(',', "").parse::<u64>().ok()
}

fn set_temperature(health: &mut DiskHealth, raw: &str) {
    if let Some(v) = parse_numeric(raw) {
        health.temperature_celsius = Some(v.min(u32::MAX as u64) as u32);
    }
}

fn set_power_on_hours(health: &mut DiskHealth, raw: &str) {
    if let Some(v) = parse_numeric(raw) {
        health.power_on_hours = Some(v);
    }
}

fn set_power_cycle_count(health: &mut DiskHealth, raw: &str) {
    if let Some(v) = parse_numeric(raw) {
        health.power_cycle_count = Some(v);
    }
}

fn set_reallocated_sectors(health: &mut DiskHealth, raw: &str) {
    if let Some(v) = parse_numeric(raw) {
        health.reallocated_sectors = Some(v);
    }
}

fn set_pending_sectors(health: &mut DiskHealth, raw: &str) {
    if let Some(v) = parse_numeric(raw) {
        health.pending_sectors = Some(v);
    }
}

fn set_life_remaining(health: &mut DiskHealth, raw: &str) {
    if let Some(v) = parse_numeric(raw) {
        health.life_remaining_percent = Some(v.min(100) as u8);
    }
}

fn set_life_used(health: &mut DiskHealth, raw: &str) {
    if health.life_remaining_percent.is_some() {
        return;
    }
    if let Some(v) = parse_numeric(raw) {
        health.life_remaining_percent = Some(100_u64.saturating_sub(v) as u8);
    }
}

fn set_wear_leveling(health: &mut DiskHealth, raw: &str) {
    if let Some(v) = parse_numeric(raw) {
        health.wear_leveling_count = Some(v);
    }
}

fn set_model(health: &mut DiskHealth, raw: &str) {
    health.model = Some(raw.to_string());
}

fn set_serial(health: &mut DiskHealth, raw: &str) {
    health.serial = Some(raw.to_string());
}
