//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 指标收集集成测试

#[path = "../common/mod.rs"]
mod common;

use common::{setup_logging, RecordingFetcher};
use oxloader::{get_metrics_string, Loader, LoaderConfig, GLOBAL_METRICS};
use serial_test::serial;

fn test_config() -> LoaderConfig {
    LoaderConfig {
        wait_ms: 10,
        max_batch: 0,
    }
}

fn load_counter(loader: &str, result: &str) -> u64 {
    let key = format!("{}:{}", loader, result);
    GLOBAL_METRICS
        .loads_total
        .lock()
        .unwrap()
        .get(&key)
        .copied()
        .unwrap_or(0)
}

/// 命中与未命中分别计数
#[tokio::test]
#[serial]
async fn test_hit_and_miss_counters() {
    setup_logging();

    let fetcher = RecordingFetcher::new();
    let loader = Loader::new("metrics_hits", fetcher, test_config()).unwrap();

    loader.load(1).await.unwrap();
    loader.load(1).await.unwrap();
    loader.load(1).await.unwrap();

    assert_eq!(load_counter("metrics_hits", "miss"), 1);
    assert_eq!(load_counter("metrics_hits", "hit"), 2);
}

/// 批次数与批内键总数按加载器累积
#[tokio::test]
#[serial]
async fn test_batch_counters_accumulate() {
    setup_logging();

    let fetcher = RecordingFetcher::new();
    let loader = Loader::new("metrics_batches", fetcher, test_config()).unwrap();

    loader.load_many(vec![1, 2, 3]).await;
    loader.load_many(vec![4]).await;

    let batches = GLOBAL_METRICS
        .batches_total
        .lock()
        .unwrap()
        .get("metrics_batches")
        .copied()
        .unwrap_or(0);
    let keys = GLOBAL_METRICS
        .batch_keys_total
        .lock()
        .unwrap()
        .get("metrics_batches")
        .copied()
        .unwrap_or(0);

    assert_eq!(batches, 2);
    assert_eq!(keys, 4);
}

/// 指标字符串包含已记录的计数
#[tokio::test]
#[serial]
async fn test_metrics_string_contains_counters() {
    setup_logging();

    let fetcher = RecordingFetcher::new();
    let loader = Loader::new("metrics_string", fetcher, test_config()).unwrap();

    loader.load(1).await.unwrap();

    let output = get_metrics_string();
    assert!(output.contains("loader_loads_total{labels=\"metrics_string:miss\"} 1"));
    assert!(output.contains("loader_batches_total{loader=\"metrics_string\"} 1"));
    assert!(output.contains("loader_batch_keys_total{loader=\"metrics_string\"} 1"));
}
