use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Keep performance samples for date range reports
    pub enabled: bool,

    /// Append-only CSV file holding the samples
    pub path: String,

    /// Minimum time between two saved snapshots
    #[serde(with = "humantime_serde")]
    pub save_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "history/performance_history.csv".to_string(),
            save_interval: Duration::from_secs(60),
        }
    }
}
