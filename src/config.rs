//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了加载器的配置结构和解析逻辑。

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// 默认等待窗口（毫秒）
pub const DEFAULT_WAIT_MS: u64 = 5;
/// 默认最大批量大小
pub const DEFAULT_MAX_BATCH: usize = 100;

/// 顶层配置
///
/// 包含全局默认值和按加载器名称区分的覆盖配置
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// 全局默认配置
    #[serde(default)]
    pub global: GlobalConfig,
    /// 各加载器的覆盖配置
    #[serde(default)]
    pub loaders: HashMap<String, LoaderOverrides>,
}

/// 全局配置
///
/// 定义适用于所有加载器的默认参数
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GlobalConfig {
    /// 默认等待窗口（毫秒）
    pub wait_ms: u64,
    /// 默认最大批量大小，0表示不限制
    pub max_batch: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            wait_ms: DEFAULT_WAIT_MS,
            max_batch: DEFAULT_MAX_BATCH,
        }
    }
}

/// 单个加载器的覆盖配置
///
/// 未设置的字段回退到全局默认值
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LoaderOverrides {
    /// 等待窗口（毫秒），可覆盖全局配置
    pub wait_ms: Option<u64>,
    /// 最大批量大小，可覆盖全局配置
    pub max_batch: Option<usize>,
}

/// 加载器配置
///
/// 创建加载器所需的最终参数，在加载器的生命周期内不可变
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoaderConfig {
    /// 等待窗口（毫秒）：首个键进入批次后最多累积多久触发回源
    pub wait_ms: u64,
    /// 最大批量大小：批内键数达到该值时立即封箱回源，0表示不限制
    pub max_batch: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            wait_ms: DEFAULT_WAIT_MS,
            max_batch: DEFAULT_MAX_BATCH,
        }
    }
}

impl LoaderConfig {
    /// 等待窗口时长
    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_ms)
    }

    /// 验证配置
    ///
    /// 等待窗口必须为正值；最大批量大小由类型保证非负。
    pub fn validate(&self) -> Result<(), String> {
        if self.wait_ms == 0 {
            return Err("wait_ms cannot be zero".to_string());
        }
        Ok(())
    }
}

impl Config {
    /// 从TOML文本解析配置
    ///
    /// # 参数
    ///
    /// * `text` - TOML格式的配置内容
    ///
    /// # 返回值
    ///
    /// 解析或验证失败时返回错误描述
    pub fn from_toml_str(text: &str) -> Result<Self, String> {
        let config: Config =
            toml::from_str(text).map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载配置
    ///
    /// # 参数
    ///
    /// * `path` - TOML配置文件路径
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, String> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_toml_str(&text)
    }

    /// 解析指定加载器的最终配置
    ///
    /// 覆盖配置中未设置的字段回退到全局默认值。
    pub fn resolve(&self, name: &str) -> LoaderConfig {
        let overrides = self.loaders.get(name);
        LoaderConfig {
            wait_ms: overrides
                .and_then(|o| o.wait_ms)
                .unwrap_or(self.global.wait_ms),
            max_batch: overrides
                .and_then(|o| o.max_batch)
                .unwrap_or(self.global.max_batch),
        }
    }

    /// 验证配置
    ///
    /// 检查全局默认值和每个加载器覆盖值的有效性
    pub fn validate(&self) -> Result<(), String> {
        if self.global.wait_ms == 0 {
            return Err("Global wait_ms cannot be zero".to_string());
        }

        for (name, overrides) in &self.loaders {
            if name.is_empty() {
                return Err("Loader name cannot be empty".to_string());
            }
            if overrides.wait_ms == Some(0) {
                return Err(format!("Loader '{}' wait_ms cannot be zero", name));
            }
        }

        Ok(())
    }
}
