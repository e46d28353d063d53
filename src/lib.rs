// Library interface for glucors modules
// This allows integration tests to drive the report pipeline with in-memory fakes

pub mod analysis;
pub mod config;
pub mod diagnose;
pub mod error;
pub mod logging;
pub mod models;
pub mod nightscout;
pub mod pipeline;
pub mod report;
pub mod telegram;
pub mod window;

// Re-export commonly used types for convenience
pub use models::*;
pub use analysis::{analyze, count_episodes, percentile, Excursion};
pub use config::{AppConfig, ConnectionConfig};
pub use error::{GlucoRsError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use nightscout::{GlucoseSource, NightscoutClient};
pub use pipeline::{run_daily_report, DailyReport};
pub use report::render_report;
pub use telegram::{MessageSink, TelegramNotifier};
pub use window::EvaluationWindow;
