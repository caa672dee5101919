use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Cadence of the recurring fetch
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Initial state of the auto-refresh toggle
    pub enabled: bool,

    /// Print the table to stdout after every applied update
    pub print_table: bool,

    /// Capacity of the controller command channel
    pub command_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(3000),
            enabled: true,
            print_table: true,
            command_buffer: 32,
        }
    }
}
