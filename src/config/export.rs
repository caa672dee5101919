use std::fmt;

use serde::{Deserialize, Serialize};

/// How embedded double quotes are written inside a quoted CSV field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteMode {
    /// Embedded quotes are doubled (RFC 4180)
    #[default]
    Strict,
    /// Fields are wrapped as-is, embedded quotes are left alone
    Compatible,
}

impl fmt::Display for QuoteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteMode::Strict => write!(f, "strict"),
            QuoteMode::Compatible => write!(f, "compatible"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory where report files are written
    pub directory: String,

    /// Quoting of embedded `"` characters
    pub quote_mode: QuoteMode,

    /// Write a final report when the service shuts down
    pub on_shutdown: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directory: "reports".to_string(),
            quote_mode: QuoteMode::default(),
            on_shutdown: false,
        }
    }
}
