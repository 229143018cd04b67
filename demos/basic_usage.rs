//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 基本用法示例：按ID批量加载媒体目录中的角色记录
//!
//! 演示缓存命中、批内去重、预置与清除等核心能力。
//! 运行方式：`cargo run --example basic_usage`

use anyhow::Result;
use oxloader::{BatchReply, FetchFn, Loader, LoaderConfig};
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 媒体目录中的角色记录
#[derive(Debug, Clone, Deserialize)]
struct Character {
    id: i64,
    name: String,
}

/// 模拟的数据源内容
static CATALOGUE: &str = r#"[
    {"id": 1, "name": "Ripley"},
    {"id": 2, "name": "Deckard"},
    {"id": 3, "name": "Furiosa"},
    {"id": 4, "name": "Neo"}
]"#;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .init();

    let fetch_count = Arc::new(AtomicUsize::new(0));
    let counter = fetch_count.clone();

    // 回源函数：一次取多个ID，等价于一条 WHERE id IN (...) 查询
    let fetcher = Arc::new(FetchFn::<i64, Character, String, _>::new(
        move |keys: Vec<i64>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                println!("-> fetch_batch called with keys: {:?}", keys);

                let catalogue: Vec<Character> =
                    serde_json::from_str(CATALOGUE).expect("catalogue is valid JSON");
                let values = keys
                    .iter()
                    .map(|id| catalogue.iter().find(|c| c.id == *id).cloned())
                    .collect();
                BatchReply::ok(values)
            }
        },
    ));

    let loader = Loader::new(
        "character",
        fetcher,
        LoaderConfig {
            wait_ms: 5,
            max_batch: 100,
        },
    )
    .map_err(|e| anyhow::anyhow!("{}", e))?;

    // 并发加载：同一个窗口内的请求合并成一次回源，重复ID去重
    let results = loader.load_many(vec![1, 2, 1, 3]).await;
    for (i, result) in results.iter().enumerate() {
        match result {
            Ok(Some(character)) => println!("slot {}: #{} {}", i, character.id, character.name),
            Ok(None) => println!("slot {}: not found", i),
            Err(error) => println!("slot {}: error: {}", i, error),
        }
    }

    // 缓存命中：不触发新的回源
    let ripley = loader.load(1).await;
    println!("cached load: {:?}", ripley);

    // 不存在的键：回源成功但返回None，同样会被缓存
    let missing = loader.load(42).await;
    println!("missing key: {:?}", missing);

    // 预置与清除
    loader.prime(
        5,
        Character {
            id: 5,
            name: "Sarah Connor".to_string(),
        },
    );
    println!("primed load: {:?}", loader.load(5).await);

    loader.clear(&1);
    println!("after clear: {:?}", loader.load(1).await);

    println!("total fetches: {}", fetch_count.load(Ordering::SeqCst));
    println!("--- metrics ---\n{}", oxloader::get_metrics_string());

    Ok(())
}
