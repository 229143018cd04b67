//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了加载器的指标收集和监控功能。

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// 指标收集器
///
/// 用于收集和存储加载器的各种运行时指标
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    /// 加载请求统计
    /// key: "loader:result"，result取值hit/miss
    pub loads_total: Arc<Mutex<HashMap<String, u64>>>,
    /// 各加载器已派发的批次数
    pub batches_total: Arc<Mutex<HashMap<String, u64>>>,
    /// 各加载器批量回源的键总数（与批次数合用可得平均批量大小）
    pub batch_keys_total: Arc<Mutex<HashMap<String, u64>>>,
}

lazy_static! {
    /// 全局指标实例
    pub static ref GLOBAL_METRICS: Metrics = Metrics::default();
}

impl Metrics {
    /// 记录一次加载请求
    ///
    /// # 参数
    ///
    /// * `loader` - 加载器名称
    /// * `result` - 请求结果（hit/miss）
    pub fn record_load(&self, loader: &str, result: &str) {
        let key = format!("{}:{}", loader, result);
        let mut map = self.loads_total.lock().unwrap();
        *map.entry(key).or_insert(0) += 1;
    }

    /// 记录一次批次派发
    ///
    /// # 参数
    ///
    /// * `loader` - 加载器名称
    /// * `key_count` - 批内键数
    pub fn record_batch(&self, loader: &str, key_count: usize) {
        {
            let mut map = self.batches_total.lock().unwrap();
            *map.entry(loader.to_string()).or_insert(0) += 1;
        }
        let mut map = self.batch_keys_total.lock().unwrap();
        *map.entry(loader.to_string()).or_insert(0) += key_count as u64;
    }
}

/// 获取指标字符串
///
/// 将所有指标格式化为字符串返回，用于监控系统采集
///
/// # 返回值
///
/// 返回包含所有指标的字符串
pub fn get_metrics_string() -> String {
    let metrics = &GLOBAL_METRICS;
    let loads = metrics.loads_total.lock().unwrap();
    let batches = metrics.batches_total.lock().unwrap();
    let keys = metrics.batch_keys_total.lock().unwrap();

    let mut output = String::new();
    for (k, v) in loads.iter() {
        output.push_str(&format!("loader_loads_total{{labels=\"{}\"}} {}\n", k, v));
    }
    for (k, v) in batches.iter() {
        output.push_str(&format!(
            "loader_batches_total{{loader=\"{}\"}} {}\n",
            k, v
        ));
    }
    for (k, v) in keys.iter() {
        output.push_str(&format!(
            "loader_batch_keys_total{{loader=\"{}\"}} {}\n",
            k, v
        ));
    }
    output
}
