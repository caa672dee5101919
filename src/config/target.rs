use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::model::MonitorTarget;

/// Router to monitor right after startup. Leave `address` empty to wait for
/// a target submitted through the HTTP API instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub address: String,
    pub username: String,
    /// Never written back out, see [`MonitorTarget`]
    #[serde(skip_serializing)]
    pub password: SecretString,
    pub interfaces: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: String::new(),
            username: "admin".to_string(),
            password: SecretString::from(String::new()),
            interfaces: Vec::new(),
        }
    }
}

impl Config {
    /// Target to start with, if one is configured
    pub fn to_target(&self) -> Option<MonitorTarget> {
        if self.address.trim().is_empty() {
            return None;
        }

        Some(MonitorTarget {
            address: self.address.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            interfaces: self.interfaces.clone(),
        })
    }
}
