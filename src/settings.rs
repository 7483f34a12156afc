//! User settings and the last successful extraction, kept as JSON files under
//! a single data directory. The calculation layer never touches any of this;
//! it only receives the values as parameters.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AccountingMode, RawData, SortKey, Theme};

const SETTINGS_FILE: &str = "settings.json";
const SNAPSHOT_FILE: &str = "snapshot.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub threshold: f64,
    pub sort_by: SortKey,
    pub mode: AccountingMode,
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            threshold: 75.0,
            sort_by: SortKey::default(),
            mode: AccountingMode::default(),
            theme: Theme::default(),
        }
    }
}

impl Settings {
    /// Threshold as the engine expects it, pinned to [0, 100].
    pub fn clamped_threshold(&self) -> f64 {
        if self.threshold.is_finite() {
            self.threshold.clamp(0.0, 100.0)
        } else {
            Self::default().threshold
        }
    }
}

/// The raw data from the last successful extraction, so `analyze` can rerun
/// with different settings without the source file at hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    pub subjects: RawData,
}

/// Data directory: `ATTENDANCE_INSIGHT_DIR` if set, else `~/.attendance-insight`.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("ATTENDANCE_INSIGHT_DIR") {
        return PathBuf::from(dir);
    }
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".attendance-insight")
}

/// Missing or unreadable settings degrade to defaults; only writing fails
/// loudly.
pub fn load_settings(dir: &Path) -> Settings {
    std::fs::read_to_string(dir.join(SETTINGS_FILE))
        .ok()
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_default()
}

pub fn save_settings(dir: &Path, settings: &Settings) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(SETTINGS_FILE);
    let text = serde_json::to_string_pretty(settings)?;
    std::fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))
}

pub fn load_snapshot(dir: &Path) -> Option<Snapshot> {
    std::fs::read_to_string(dir.join(SNAPSHOT_FILE))
        .ok()
        .and_then(|text| serde_json::from_str(&text).ok())
}

pub fn save_snapshot(dir: &Path, subjects: &RawData) -> anyhow::Result<Snapshot> {
    let snapshot = Snapshot {
        captured_at: Utc::now(),
        subjects: subjects.clone(),
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(SNAPSHOT_FILE);
    let text = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(&path, text)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComponentRecord, SubjectRecord};

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "attendance-insight-test-{}-{}",
            tag,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn missing_settings_fall_back_to_defaults() {
        let dir = scratch_dir("missing");
        let settings = load_settings(&dir);
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.threshold, 75.0);
    }

    #[test]
    fn settings_round_trip() {
        let dir = scratch_dir("roundtrip");
        let settings = Settings {
            threshold: 80.0,
            sort_by: SortKey::Percentage,
            mode: AccountingMode::CarryForwardCorrected,
            theme: Theme::Dark,
        };
        save_settings(&dir, &settings).unwrap();
        assert_eq!(load_settings(&dir), settings);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_settings_degrade_to_defaults() {
        let dir = scratch_dir("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(SETTINGS_FILE), "not json {").unwrap();
        assert_eq!(load_settings(&dir), Settings::default());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn out_of_range_threshold_is_clamped() {
        let settings = Settings {
            threshold: 180.0,
            ..Settings::default()
        };
        assert_eq!(settings.clamped_threshold(), 100.0);
        let settings = Settings {
            threshold: -5.0,
            ..Settings::default()
        };
        assert_eq!(settings.clamped_threshold(), 0.0);
    }

    #[test]
    fn snapshot_round_trip_preserves_subjects() {
        let dir = scratch_dir("snapshot");
        let mut raw = RawData::new();
        raw.insert(
            "CS2001".to_string(),
            SubjectRecord {
                course_name: "Data Structures".to_string(),
                components: [(
                    "Lecture".to_string(),
                    ComponentRecord {
                        conducted: 40,
                        attended: 32,
                        carry_forward: 2,
                    },
                )]
                .into_iter()
                .collect(),
            },
        );
        save_snapshot(&dir, &raw).unwrap();
        let loaded = load_snapshot(&dir).unwrap();
        assert_eq!(loaded.subjects.len(), 1);
        assert_eq!(loaded.subjects["CS2001"].components["Lecture"].attended, 32);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_snapshot_is_none() {
        let dir = scratch_dir("nosnap");
        assert!(load_snapshot(&dir).is_none());
    }
}
