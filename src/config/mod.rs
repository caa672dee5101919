mod backend;
mod export;
mod history;
mod http;
mod logging;
mod monitor;
mod refresh;
mod target;

pub use backend::Config as BackendConfig;
pub use export::{Config as ExportConfig, QuoteMode};
pub use history::Config as HistoryConfig;
pub use http::Config as HttpConfig;
pub use logging::Config as LoggingConfig;
pub use monitor::Config as MonitorConfig;
pub use refresh::Config as RefreshConfig;
pub use target::Config as TargetConfig;
