//! Runtime configuration for the engine.

use crate::{error::Result, Error};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// How detected conflicts are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Auto-resolvable conflicts are resolved immediately
    Auto,
    /// Every conflict waits for an explicit resolution
    Manual,
    /// Like `Auto`; conflicts touching critical fields still wait
    #[default]
    Hybrid,
}

impl ConflictPolicy {
    /// Whether auto-resolvable conflicts are resolved without a caller.
    pub fn resolves_automatically(self) -> bool {
        matches!(self, ConflictPolicy::Auto | ConflictPolicy::Hybrid)
    }
}

impl FromStr for ConflictPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ConflictPolicy::Auto),
            "manual" => Ok(ConflictPolicy::Manual),
            "hybrid" => Ok(ConflictPolicy::Hybrid),
            other => Err(Error::InvalidConfig(format!(
                "unknown conflict resolution policy '{}'",
                other
            ))),
        }
    }
}

/// Tuning hint for host applications. Not interpreted by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPriority {
    Performance,
    #[default]
    Consistency,
    Availability,
}

impl FromStr for SyncPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "performance" => Ok(SyncPriority::Performance),
            "consistency" => Ok(SyncPriority::Consistency),
            "availability" => Ok(SyncPriority::Availability),
            other => Err(Error::InvalidConfig(format!(
                "unknown sync priority '{}'",
                other
            ))),
        }
    }
}

/// Process-wide sync settings, mutable at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    pub auto_sync: bool,
    /// Minutes between scheduled passes
    #[serde(rename = "syncInterval")]
    pub sync_interval_minutes: u64,
    pub max_retries: u32,
    pub batch_size: usize,
    pub conflict_resolution: ConflictPolicy,
    pub priority: SyncPriority,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            sync_interval_minutes: 5,
            max_retries: 3,
            batch_size: 10,
            conflict_resolution: ConflictPolicy::Hybrid,
            priority: SyncPriority::Consistency,
        }
    }
}

impl SyncConfig {
    /// Scheduler period.
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_minutes * 60)
    }

    /// Reject values the executor and scheduler cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batchSize must be at least 1".into()));
        }
        if self.sync_interval_minutes == 0 {
            return Err(Error::InvalidConfig(
                "syncInterval must be at least 1 minute".into(),
            ));
        }
        Ok(())
    }

    /// Apply a partial update, returning the merged config.
    pub fn merged(&self, update: &SyncConfigUpdate) -> SyncConfig {
        SyncConfig {
            auto_sync: update.auto_sync.unwrap_or(self.auto_sync),
            sync_interval_minutes: update
                .sync_interval_minutes
                .unwrap_or(self.sync_interval_minutes),
            max_retries: update.max_retries.unwrap_or(self.max_retries),
            batch_size: update.batch_size.unwrap_or(self.batch_size),
            conflict_resolution: update
                .conflict_resolution
                .unwrap_or(self.conflict_resolution),
            priority: update.priority.unwrap_or(self.priority),
        }
    }
}

/// Partial config update. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfigUpdate {
    #[serde(default)]
    pub auto_sync: Option<bool>,
    #[serde(default, rename = "syncInterval")]
    pub sync_interval_minutes: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub conflict_resolution: Option<ConflictPolicy>,
    #[serde(default)]
    pub priority: Option<SyncPriority>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SyncConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sync_interval(), Duration::from_secs(300));
    }

    #[test]
    fn zero_batch_size_rejected() {
        let config = SyncConfig {
            batch_size: 0,
            ..SyncConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn zero_interval_rejected() {
        let config = SyncConfig {
            sync_interval_minutes: 0,
            ..SyncConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn merge_keeps_absent_fields() {
        let base = SyncConfig::default();
        let update = SyncConfigUpdate {
            batch_size: Some(2),
            conflict_resolution: Some(ConflictPolicy::Manual),
            ..SyncConfigUpdate::default()
        };

        let merged = base.merged(&update);
        assert_eq!(merged.batch_size, 2);
        assert_eq!(merged.conflict_resolution, ConflictPolicy::Manual);
        assert_eq!(merged.max_retries, base.max_retries);
        assert_eq!(merged.auto_sync, base.auto_sync);
    }

    #[test]
    fn policy_auto_resolution() {
        assert!(ConflictPolicy::Auto.resolves_automatically());
        assert!(ConflictPolicy::Hybrid.resolves_automatically());
        assert!(!ConflictPolicy::Manual.resolves_automatically());
    }

    #[test]
    fn parse_from_str() {
        assert_eq!("Manual".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Manual);
        assert_eq!(" hybrid ".parse::<ConflictPolicy>().unwrap(), ConflictPolicy::Hybrid);
        assert!("sometimes".parse::<ConflictPolicy>().is_err());

        assert_eq!(
            "availability".parse::<SyncPriority>().unwrap(),
            SyncPriority::Availability
        );
        assert!(matches!(
            "fast".parse::<SyncPriority>(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn serialization_format() {
        let json = serde_json::to_value(SyncConfig::default()).unwrap();
        assert_eq!(json["autoSync"], true);
        assert_eq!(json["syncInterval"], 5);
        assert_eq!(json["conflictResolution"], "hybrid");
        assert_eq!(json["priority"], "consistency");

        let update: SyncConfigUpdate =
            serde_json::from_str(r#"{"syncInterval": 15, "autoSync": false}"#).unwrap();
        assert_eq!(update.sync_interval_minutes, Some(15));
        assert_eq!(update.auto_sync, Some(false));
        assert!(update.batch_size.is_none());
    }
}
