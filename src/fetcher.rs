//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了批量回源的接口和结果契约。

use async_trait::async_trait;
use std::fmt::{Debug, Display};
use std::future::Future;
use std::hash::Hash;
use std::marker::PhantomData;

/// 批量回源trait
///
/// 定义从下游数据源批量加载数据的接口。加载器对每个批次恰好
/// 调用一次`fetch_batch`，传入去重后的有序键列表。
#[async_trait]
pub trait BatchFetcher: Send + Sync + 'static {
    /// 查找键类型
    type Key: Clone + Eq + Hash + Send + Sync + 'static;
    /// 值类型
    type Value: Clone + Send + Sync + 'static;
    /// 错误类型，需要`Clone`以便分发给同一批次的多个等待者
    type Error: Clone + Debug + Display + Send + Sync + 'static;

    /// 根据去重后的键列表批量加载数据
    ///
    /// # 参数
    ///
    /// * `keys` - 去重后的有序键列表，不含重复键
    ///
    /// # 返回值
    ///
    /// 返回与键列表位置对齐的批量结果，见[`BatchReply`]的契约说明
    async fn fetch_batch(&self, keys: &[Self::Key]) -> BatchReply<Self::Value, Self::Error>;
}

/// 一次批量回源的结果
///
/// 契约：`values`的长度必须等于键数；`errors`为`PerKey`形态时
/// 同样要求与键位置对齐。违反契约归因于回源方，批内所有键
/// 统一收到契约错误。
#[derive(Debug, Clone)]
pub struct BatchReply<V, E> {
    /// 与键位置对齐的值向量，`None`表示该键在数据源中不存在
    pub values: Vec<Option<V>>,
    /// 错误形态
    pub errors: BatchErrors<E>,
}

/// 批量回源错误的三种形态
#[derive(Debug, Clone)]
pub enum BatchErrors<E> {
    /// 整批成功，没有任何错误
    None,
    /// 单个错误，统一作用于批内所有键
    Uniform(E),
    /// 与键位置对齐的单键错误向量，`None`表示该键成功
    PerKey(Vec<Option<E>>),
}

impl<V, E> BatchReply<V, E> {
    /// 构造整批成功的结果
    pub fn ok(values: Vec<Option<V>>) -> Self {
        Self {
            values,
            errors: BatchErrors::None,
        }
    }

    /// 构造整批失败的结果
    pub fn fail(error: E) -> Self {
        Self {
            values: Vec::new(),
            errors: BatchErrors::Uniform(error),
        }
    }

    /// 构造带单键错误的结果
    ///
    /// # 参数
    ///
    /// * `values` - 与键位置对齐的值向量
    /// * `errors` - 与键位置对齐的错误向量
    pub fn per_key(values: Vec<Option<V>>, errors: Vec<Option<E>>) -> Self {
        Self {
            values,
            errors: BatchErrors::PerKey(errors),
        }
    }
}

/// 闭包回源适配器
///
/// 将异步闭包包装为[`BatchFetcher`]，方便调用点直接提供回源函数
/// 而无需手写trait实现。
pub struct FetchFn<K, V, E, F> {
    f: F,
    _marker: PhantomData<fn(K) -> (V, E)>,
}

impl<K, V, E, F> FetchFn<K, V, E, F> {
    /// 从异步闭包创建回源适配器
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<K, V, E, F, Fut> BatchFetcher for FetchFn<K, V, E, F>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Debug + Display + Send + Sync + 'static,
    F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = BatchReply<V, E>> + Send + 'static,
{
    type Key = K;
    type Value = V;
    type Error = E;

    async fn fetch_batch(&self, keys: &[K]) -> BatchReply<V, E> {
        (self.f)(keys.to_vec()).await
    }
}
