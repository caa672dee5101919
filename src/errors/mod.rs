mod config;
mod export;
mod fetch;
mod history;
mod init;
mod monitor;

pub use config::ConfigValidationError;
pub use export::ExportError;
pub use fetch::FetchError;
pub use history::HistoryError;
pub use init::InitializationError;
pub use monitor::MonitorError;
