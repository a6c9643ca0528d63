pub mod breaker;
pub mod html_extract;
pub mod limiter;
pub mod orchestrator;
pub mod robots;
pub mod rss;

#[cfg(feature = "browser-fallback")]
pub mod browser_extract;
#[cfg(feature = "browser-fallback")]
pub mod browser_pool;

pub use orchestrator::{RunSummary, ScrapeOrchestrator};
