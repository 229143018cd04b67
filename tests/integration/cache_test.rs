//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 缓存命中、预置与清除集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{setup_logging, test_value, RecordingFetcher};
use oxloader::{Loader, LoaderConfig};

fn test_config() -> LoaderConfig {
    LoaderConfig {
        wait_ms: 10,
        max_batch: 0,
    }
}

/// 成功加载后同键的后续请求命中缓存，不再进入任何批次
#[tokio::test]
async fn test_cache_hit_skips_fetch() {
    setup_logging();

    let fetcher = RecordingFetcher::new();
    let loader = Loader::new("cache_hit", fetcher.clone(), test_config()).unwrap();

    assert_eq!(loader.load(1).await, Ok(Some(test_value(1))));
    assert_eq!(loader.load(1).await, Ok(Some(test_value(1))));
    assert_eq!(loader.load(1).await, Ok(Some(test_value(1))));

    assert_eq!(fetcher.calls(), vec![vec![1]]);
}

/// 回源确认不存在的键同样被缓存，不触发重复回源
#[tokio::test]
async fn test_absent_result_cached() {
    setup_logging();

    let fetcher = RecordingFetcher::with_absent(vec![4]);
    let loader = Loader::new("absent_cached", fetcher.clone(), test_config()).unwrap();

    assert_eq!(loader.load(4).await, Ok(None));
    assert_eq!(loader.load(4).await, Ok(None));

    assert_eq!(fetcher.calls(), vec![vec![4]]);
}

/// 预置后加载直接返回预置值，键不进入任何回源调用
#[tokio::test]
async fn test_prime_prevents_fetch() {
    setup_logging();

    let fetcher = RecordingFetcher::new();
    let loader = Loader::new("prime", fetcher.clone(), test_config()).unwrap();

    assert!(loader.prime(5, "primed".to_string()));
    assert_eq!(loader.load(5).await, Ok(Some("primed".to_string())));

    assert_eq!(fetcher.call_count(), 0);
}

/// 键已缓存时预置不做修改并返回false
#[tokio::test]
async fn test_prime_existing_key_returns_false() {
    setup_logging();

    let fetcher = RecordingFetcher::new();
    let loader = Loader::new("prime_existing", fetcher.clone(), test_config()).unwrap();

    assert!(loader.prime(5, "first".to_string()));
    assert!(!loader.prime(5, "second".to_string()));

    assert_eq!(loader.load(5).await, Ok(Some("first".to_string())));
    assert_eq!(fetcher.call_count(), 0);
}

/// 清除后强制覆盖预置
#[tokio::test]
async fn test_clear_then_prime_overrides() {
    setup_logging();

    let fetcher = RecordingFetcher::new();
    let loader = Loader::new("clear_prime", fetcher.clone(), test_config()).unwrap();

    assert!(loader.prime(5, "first".to_string()));
    loader.clear(&5);
    assert!(loader.prime(5, "second".to_string()));

    assert_eq!(loader.load(5).await, Ok(Some("second".to_string())));
}

/// 清除缓存条目后同键重新回源
#[tokio::test]
async fn test_clear_forces_refetch() {
    setup_logging();

    let fetcher = RecordingFetcher::new();
    let loader = Loader::new("clear_refetch", fetcher.clone(), test_config()).unwrap();

    assert_eq!(loader.load(1).await, Ok(Some(test_value(1))));
    loader.clear(&1);
    assert_eq!(loader.load(1).await, Ok(Some(test_value(1))));

    assert_eq!(fetcher.calls(), vec![vec![1], vec![1]]);
}

/// 清除不存在的键是空操作
#[tokio::test]
async fn test_clear_missing_key_is_noop() {
    setup_logging();

    let fetcher = RecordingFetcher::new();
    let loader = Loader::new("clear_missing", fetcher.clone(), test_config()).unwrap();

    loader.clear(&99);
    loader.clear(&99);

    assert_eq!(loader.load(99).await, Ok(Some(test_value(99))));
    assert_eq!(fetcher.call_count(), 1);
}

/// 各克隆共享同一份缓存
#[tokio::test]
async fn test_clones_share_cache() {
    setup_logging();

    let fetcher = RecordingFetcher::new();
    let loader = Loader::new("clone_cache", fetcher.clone(), test_config()).unwrap();
    let clone = loader.clone();

    assert_eq!(loader.load(1).await, Ok(Some(test_value(1))));
    assert_eq!(clone.load(1).await, Ok(Some(test_value(1))));

    assert_eq!(fetcher.calls(), vec![vec![1]]);
}
