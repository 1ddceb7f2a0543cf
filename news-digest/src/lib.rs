pub mod types;
pub mod config;
pub mod sources;
pub mod fetcher;
pub mod parser;
pub mod processing;
pub mod traits;
pub mod llm_adapter;
pub mod sentiment;
pub mod prices;
pub mod digest;
pub mod export;
pub mod notify;
pub mod pipeline;
pub mod scheduler;
pub mod utils;

pub use types::*;
pub use config::Settings;
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use processing::NewsProcessor;
pub use digest::Summarizer;
pub use export::Exporter;
pub use notify::Dispatcher;
pub use pipeline::{DigestPipeline, RunOptions};
pub use scheduler::DailySchedule;
