//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了批次的共享状态、结果归一化和完成广播。

use crate::error::{LoadResult, LoaderError};
use crate::fetcher::{BatchErrors, BatchReply};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, OnceLock};
use tokio::sync::watch;
use uuid::Uuid;

/// 批次的共享句柄
///
/// 被同一批次的所有等待者通过`Arc`共享。`sealed`仅在加载器的锁内
/// 检查并置位，保证每个批次恰好回源一次；`outcome`在完成信号触发
/// 前由回源任务写入一次，此后只读，完成信号建立happens-before边。
#[derive(Debug)]
pub(crate) struct BatchShared<V, E> {
    /// 批次标识，用于日志追踪
    pub id: Uuid,
    /// 封箱标志，至多置位一次
    pub sealed: AtomicBool,
    /// 批次结果，触发完成信号前写入恰好一次
    outcome: OnceLock<BatchOutcome<V, E>>,
    /// 完成信号发送端，恰好触发一次
    done_tx: watch::Sender<bool>,
    /// 完成信号接收端原型，等待者克隆使用
    done_rx: watch::Receiver<bool>,
}

impl<V: Clone, E: Clone> BatchShared<V, E> {
    pub fn new() -> Self {
        let (done_tx, done_rx) = watch::channel(false);
        Self {
            id: Uuid::new_v4(),
            sealed: AtomicBool::new(false),
            outcome: OnceLock::new(),
            done_tx,
            done_rx,
        }
    }

    /// 写入批次结果并触发完成信号
    ///
    /// 唤醒当前以及之后所有等待该批次的调用者。
    pub fn complete(&self, outcome: BatchOutcome<V, E>) {
        let _ = self.outcome.set(outcome);
        self.done_tx.send_replace(true);
    }

    /// 等待完成信号
    ///
    /// 信号触发后立即返回`true`，包括等待开始前已触发的情况。
    /// 发送端在触发前被丢弃时返回`false`。
    pub async fn wait_done(&self) -> bool {
        let mut rx = self.done_rx.clone();
        rx.wait_for(|fired| *fired).await.is_ok()
    }

    /// 读取指定槽位的结果
    pub fn resolve_slot(&self, index: usize) -> LoadResult<V, E> {
        match self.outcome.get() {
            Some(outcome) => outcome.resolve(index),
            // 完成信号触发前outcome必定已写入，此分支仅兜底
            None => Err(LoaderError::Aborted(
                "batch completed without outcome".to_string(),
            )),
        }
    }
}

/// 处于开放阶段的批次
///
/// 键列表在开放阶段由加载器的锁保护，封箱时整体移交给回源任务。
pub(crate) struct OpenBatch<K, V, E> {
    /// 等待者共享的批次句柄
    pub shared: Arc<BatchShared<V, E>>,
    /// 有序的已准入键列表，每个键至多出现一次
    pub keys: Vec<K>,
}

impl<K: Clone + PartialEq, V: Clone, E: Clone> OpenBatch<K, V, E> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(BatchShared::new()),
            keys: Vec::new(),
        }
    }

    /// 返回键在批内的槽位，不存在时追加
    ///
    /// 线性扫描实现去重：并发请求同一个键的调用者共享同一个槽位。
    ///
    /// # 返回值
    ///
    /// 返回`(槽位, 是否新追加)`
    pub fn key_index(&mut self, key: &K) -> (usize, bool) {
        for (i, existing) in self.keys.iter().enumerate() {
            if existing == key {
                return (i, false);
            }
        }
        self.keys.push(key.clone());
        (self.keys.len() - 1, true)
    }
}

/// 一次回源调用归一化后的结果
#[derive(Debug)]
pub(crate) enum BatchOutcome<V, E> {
    /// 整批成功，值向量与键位置对齐
    Success(Vec<Option<V>>),
    /// 统一错误，作用于批内所有键
    Uniform(LoaderError<E>),
    /// 单键错误与值并存，两个向量均与键位置对齐
    Mixed {
        values: Vec<Option<V>>,
        errors: Vec<Option<E>>,
    },
}

impl<V: Clone, E: Clone> BatchOutcome<V, E> {
    /// 将回源返回的原始结果按契约归一化
    ///
    /// 值向量或单键错误向量的长度与键数不一致时归因于回源方，
    /// 整批合成统一的契约错误。统一错误形态下不检查值向量。
    pub fn from_reply(reply: BatchReply<V, E>, key_count: usize) -> Self {
        match reply.errors {
            BatchErrors::Uniform(error) => Self::Uniform(LoaderError::Collaborator(error)),
            BatchErrors::None => {
                if reply.values.len() != key_count {
                    return Self::contract_violation(key_count, reply.values.len());
                }
                Self::Success(reply.values)
            }
            BatchErrors::PerKey(errors) => {
                if reply.values.len() != key_count {
                    return Self::contract_violation(key_count, reply.values.len());
                }
                if errors.len() != key_count {
                    return Self::contract_violation(key_count, errors.len());
                }
                Self::Mixed {
                    values: reply.values,
                    errors,
                }
            }
        }
    }

    fn contract_violation(expected: usize, actual: usize) -> Self {
        Self::Uniform(LoaderError::ContractViolation { expected, actual })
    }

    /// 读取指定槽位的单键结果
    pub fn resolve(&self, index: usize) -> LoadResult<V, E> {
        match self {
            Self::Success(values) => Ok(values.get(index).cloned().flatten()),
            Self::Uniform(error) => Err(error.clone()),
            Self::Mixed { values, errors } => match errors.get(index) {
                Some(Some(error)) => Err(LoaderError::Collaborator(error.clone())),
                _ => Ok(values.get(index).cloned().flatten()),
            },
        }
    }
}
