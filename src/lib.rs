pub mod config;
pub mod errors;
pub mod export;
pub mod fetcher;
pub mod format;
pub mod history;
pub mod http_api;
pub mod logging;
pub mod model;
pub mod refresh;
pub mod table;

pub use config::MonitorConfig;
pub use errors::MonitorError;
pub use export::CsvExporter;
pub use fetcher::StatsFetcher;
pub use history::{HistoryRecorder, HistoryStore};
pub use logging::setup_logging;
pub use model::{MonitorTarget, StatsResponse};
pub use refresh::{RefreshController, RefreshHandle};
pub use table::RenderedTable;
