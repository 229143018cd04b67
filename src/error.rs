//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了批量加载器的错误类型和处理机制。

use thiserror::Error;

/// 批量加载错误类型枚举
///
/// 定义了加载过程中可能出现的各种错误类型。错误实现`Clone`，
/// 因为同一批次的结果需要分发给任意多个等待者。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoaderError<E> {
    /// 回源方返回的错误（单键或整批统一）
    #[error("Fetch error: {0}")]
    Collaborator(E),

    /// 回源方返回的结果向量长度与键数不一致，整批失败
    #[error("Fetch contract violation: expected {expected} results, got {actual}")]
    ContractViolation {
        /// 批内键数
        expected: usize,
        /// 实际返回的向量长度
        actual: usize,
    },

    /// 回源调用异常中止（如panic），已被恢复并转换为统一错误
    #[error("Fetch aborted: {0}")]
    Aborted(String),

    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),
}

/// 单键加载结果类型别名
///
/// `Ok(None)`表示回源成功但该键不存在；错误不会进入缓存。
pub type LoadResult<V, E> = std::result::Result<Option<V>, LoaderError<E>>;
