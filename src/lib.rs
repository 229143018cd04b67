//! oxloader - 请求合并批量加载缓存库
//!
//! 将短时间窗口内的并发单键查询合并为一次批量回源，缓存成功结果
//! 并限制单次批量大小，保护下游数据源。按查询键类型实例化加载器，
//! 供解析器等并发调用方共享使用。

#![doc(html_root_url = "https://docs.rs/oxloader/0.1.0")]

pub use serde;
pub use serde_json;
pub use tokio;

mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod loader;
pub mod metrics;

// Re-export commonly used items
pub use config::{Config, GlobalConfig, LoaderConfig, LoaderOverrides};
pub use error::{LoadResult, LoaderError};
pub use fetcher::{BatchErrors, BatchFetcher, BatchReply, FetchFn};
pub use loader::{Deferred, DeferredMany, Loader};
pub use metrics::{get_metrics_string, GLOBAL_METRICS};

/// oxloader 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
