// ABOUTME: Storage driver space statistics parsed from daemon info.
// ABOUTME: Reads "<name> Space <Used|Total|Available>" driver status pairs.

use bollard::models::SystemInfo;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageStatsError {
    #[error("storage driver reports no space statistics")]
    NotAvailable,
}

/// Space figures for one storage pool (`data`, `metadata`, ...), in bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StorageStats {
    pub name: String,
    pub free: Option<u64>,
    pub used: Option<u64>,
    pub total: Option<u64>,
}

impl StorageStats {
    /// Used space as a percentage, from used/total or used/(used+free).
    pub fn percent_used(&self) -> Option<f64> {
        let used = self.used? as f64;
        if let Some(total) = self.total.filter(|total| *total > 0) {
            return Some(100.0 * used / total as f64);
        }
        let free = self.free? as f64;
        if used + free > 0.0 {
            Some(100.0 * used / (used + free))
        } else {
            None
        }
    }
}

/// Extract per-pool space statistics from the driver status table.
pub fn parse_storage_stats(info: &SystemInfo) -> Result<Vec<StorageStats>, StorageStatsError> {
    let mut stats: Vec<StorageStats> = Vec::new();

    for entry in info.driver_status.iter().flatten() {
        let [key, value, ..] = entry.as_slice() else {
            continue;
        };
        let key = key.to_lowercase();
        let fields: Vec<&str> = key.split_whitespace().collect();
        let [name, "space", metric] = fields.as_slice() else {
            continue;
        };

        let bytes = match parse_disk_quantity(value) {
            Some(bytes) => bytes,
            None => {
                tracing::debug!(key = %key, value = %value, "unparseable storage quantity");
                continue;
            }
        };

        let index = match stats.iter().position(|s| s.name == *name) {
            Some(index) => index,
            None => {
                stats.push(StorageStats {
                    name: name.to_string(),
                    ..Default::default()
                });
                stats.len() - 1
            }
        };
        let pool = &mut stats[index];

        match *metric {
            "available" => pool.free = Some(bytes),
            "used" => pool.used = Some(bytes),
            "total" => pool.total = Some(bytes),
            _ => {}
        }
    }

    if stats.is_empty() {
        return Err(StorageStatsError::NotAvailable);
    }
    Ok(stats)
}

/// Parse quantities like `1.5 GB`, `39.2kB` or `512 b` into bytes (SI units).
pub fn parse_disk_quantity(text: &str) -> Option<u64> {
    let text = text.trim();
    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let value: f64 = number.parse().ok()?;

    let multiplier = match unit.trim().to_lowercase().as_str() {
        "b" => 1.0,
        "kb" => 1e3,
        "mb" => 1e6,
        "gb" => 1e9,
        "tb" => 1e12,
        _ => return None,
    };

    Some((value * multiplier).round() as u64)
}
