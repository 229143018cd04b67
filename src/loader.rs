//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了请求合并批量加载器的公开接口以及准入、封箱逻辑。

use crate::batch::{BatchOutcome, BatchShared, OpenBatch};
use crate::cache::KeyCache;
use crate::config::LoaderConfig;
use crate::error::{LoadResult, LoaderError};
use crate::fetcher::BatchFetcher;
use crate::metrics::GLOBAL_METRICS;
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, instrument, trace};

/// 请求合并批量加载器
///
/// 将等待窗口内的并发单键查询合并为一次批量回源，缓存成功结果，
/// 并限制单次批量大小以保护下游数据源。每种查询键类型在调用点
/// 实例化一个加载器。克隆是廉价的，各克隆共享同一份缓存与在途
/// 批次。
///
/// 查询流程：先查缓存，未命中则进入当前开放批次并获得槽位；
/// 批次在等待窗口到期或达到最大批量时封箱，恰好回源一次，随后
/// 广播完成信号，各等待者按槽位读取自己的结果。
pub struct Loader<F: BatchFetcher> {
    inner: Arc<LoaderInner<F>>,
}

impl<F: BatchFetcher> Clone for Loader<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<F: BatchFetcher> std::fmt::Debug for Loader<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("name", &self.inner.name)
            .field("wait", &self.inner.wait)
            .field("max_batch", &self.inner.max_batch)
            .finish()
    }
}

struct LoaderInner<F: BatchFetcher> {
    /// 加载器名称，用于日志和指标
    name: String,
    /// 批量回源实现
    fetcher: Arc<F>,
    /// 等待窗口
    wait: Duration,
    /// 最大批量大小，0表示不限制
    max_batch: usize,
    /// 加载器的唯一锁，串行化缓存读写、批次准入与封箱转换
    state: Mutex<LoaderState<F>>,
}

struct LoaderState<F: BatchFetcher> {
    /// 键值缓存
    cache: KeyCache<F::Key, F::Value>,
    /// 当前开放的批次，封箱时脱离引用
    open: Option<OpenBatch<F::Key, F::Value, F::Error>>,
}

impl<F: BatchFetcher> Loader<F> {
    /// 创建新的加载器
    ///
    /// # 参数
    ///
    /// * `name` - 加载器名称，用于日志和指标
    /// * `fetcher` - 批量回源实现
    /// * `config` - 加载器配置，创建后不可变
    ///
    /// # 返回值
    ///
    /// 配置非法时返回配置错误
    pub fn new(
        name: impl Into<String>,
        fetcher: Arc<F>,
        config: LoaderConfig,
    ) -> Result<Self, LoaderError<F::Error>> {
        config.validate().map_err(LoaderError::Config)?;
        Ok(Self {
            inner: Arc::new(LoaderInner {
                name: name.into(),
                fetcher,
                wait: config.wait(),
                max_batch: config.max_batch,
                state: Mutex::new(LoaderState {
                    cache: KeyCache::new(),
                    open: None,
                }),
            }),
        })
    }

    /// 加载单个键
    ///
    /// 命中缓存时立即返回；未命中时进入当前批次并阻塞等待批次
    /// 完成。成功结果会写回缓存，`Ok(None)`表示回源确认该键不
    /// 存在。
    pub async fn load(&self, key: F::Key) -> LoadResult<F::Value, F::Error> {
        self.load_deferred(key).resolve().await
    }

    /// 批量加载多个键
    ///
    /// 输入可以包含重复键，重复键共享批内同一槽位。返回结果与
    /// 输入等长且位置一一对应。
    pub async fn load_many(&self, keys: Vec<F::Key>) -> Vec<LoadResult<F::Value, F::Error>> {
        self.load_many_deferred(keys).resolve().await
    }

    /// 非阻塞地登记一个键的加载
    ///
    /// 立即完成缓存检查与批次准入并返回延迟句柄。调用方可以先向
    /// 多个加载器登记查询，再逐个等待结果，避免相互串行。
    ///
    /// 必须在Tokio运行时上下文内调用。
    pub fn load_deferred(&self, key: F::Key) -> Deferred<F> {
        let mut state = self.inner.state.lock().unwrap();

        // 缓存命中直接短路，不进入任何批次
        if let Some(entry) = state.cache.get(&key) {
            GLOBAL_METRICS.record_load(&self.inner.name, "hit");
            trace!(loader = %self.inner.name, "cache hit");
            return Deferred {
                state: DeferredState::Ready(Ok(entry.clone())),
            };
        }
        GLOBAL_METRICS.record_load(&self.inner.name, "miss");

        let inner = self.inner.clone();
        let open = state.open.get_or_insert_with(|| {
            let open = OpenBatch::new();
            debug!(
                loader = %inner.name,
                batch_id = %open.shared.id,
                "opening batch"
            );
            tokio::spawn(LoaderInner::run_wait_timer(
                inner.clone(),
                open.shared.clone(),
            ));
            open
        });

        let (index, appended) = open.key_index(&key);
        let shared = open.shared.clone();
        let size = open.keys.len();

        if appended && self.inner.max_batch != 0 && size >= self.inner.max_batch {
            // 尺寸阈值封箱：锁内检查并置位，脱离开放批次引用，
            // 回源在独立任务中执行，等待窗口计时器随后让路
            if !shared.sealed.swap(true, Ordering::Relaxed) {
                if let Some(sealed) = state.open.take() {
                    debug!(
                        loader = %self.inner.name,
                        batch_id = %shared.id,
                        keys = sealed.keys.len(),
                        "sealing batch at max size"
                    );
                    tokio::spawn(LoaderInner::execute_batch(
                        self.inner.clone(),
                        sealed.shared,
                        sealed.keys,
                    ));
                }
            }
        }

        Deferred {
            state: DeferredState::Pending {
                inner: self.inner.clone(),
                shared,
                index,
                key,
            },
        }
    }

    /// 非阻塞地登记多个键的加载
    ///
    /// 等价于对每个键调用[`Loader::load_deferred`]，保留输入顺序。
    pub fn load_many_deferred(&self, keys: Vec<F::Key>) -> DeferredMany<F> {
        DeferredMany {
            items: keys.into_iter().map(|k| self.load_deferred(k)).collect(),
        }
    }

    /// 预置缓存条目
    ///
    /// 仅在键未缓存时写入。值的所有权转移给缓存，调用方不会再
    /// 持有指向缓存内容的共享引用。
    ///
    /// # 返回值
    ///
    /// 写入发生时返回`true`；键已存在时不做修改并返回`false`
    /// （需要强制覆盖时，先`clear`再`prime`）
    pub fn prime(&self, key: F::Key, value: F::Value) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        if state.cache.contains(&key) {
            return false;
        }
        state.cache.set(key, Some(value));
        true
    }

    /// 删除缓存条目
    ///
    /// 键不存在时为空操作。
    pub fn clear(&self, key: &F::Key) {
        let mut state = self.inner.state.lock().unwrap();
        state.cache.delete(key);
    }

    /// 加载器名称
    pub fn name(&self) -> &str {
        &self.inner.name
    }
}

impl<F: BatchFetcher> LoaderInner<F> {
    /// 等待窗口计时任务，每个批次恰好派生一个
    ///
    /// 窗口到期后重新检查封箱标志：尺寸阈值路径可能已经抢先封箱。
    async fn run_wait_timer(inner: Arc<Self>, shared: Arc<BatchShared<F::Value, F::Error>>) {
        tokio::time::sleep(inner.wait).await;

        let sealed = {
            let mut state = inner.state.lock().unwrap();
            if shared.sealed.swap(true, Ordering::Relaxed) {
                return;
            }
            // 封箱标志未置位意味着批次从未被脱离，当前开放批次必然是本批次
            debug_assert!(state
                .open
                .as_ref()
                .map_or(false, |o| Arc::ptr_eq(&o.shared, &shared)));
            state.open.take()
        };

        if let Some(open) = sealed {
            debug!(
                loader = %inner.name,
                batch_id = %shared.id,
                keys = open.keys.len(),
                "sealing batch at wait window"
            );
            Self::execute_batch(inner.clone(), shared, open.keys).await;
        }
    }

    /// 执行批量回源并广播完成信号
    ///
    /// 不持有加载器的锁调用回源。无论回源正常返回、违反契约还是
    /// panic，都恰好触发一次完成信号，等待者不会永久阻塞。
    #[instrument(
        name = "batch_fetch",
        skip(inner, shared, keys),
        fields(loader = %inner.name, batch_id = %shared.id, keys = keys.len())
    )]
    async fn execute_batch(
        inner: Arc<Self>,
        shared: Arc<BatchShared<F::Value, F::Error>>,
        keys: Vec<F::Key>,
    ) {
        debug!("dispatching batch fetch");
        GLOBAL_METRICS.record_batch(&inner.name, keys.len());

        let reply = AssertUnwindSafe(inner.fetcher.fetch_batch(&keys))
            .catch_unwind()
            .await;

        let outcome = match reply {
            Ok(reply) => BatchOutcome::from_reply(reply, keys.len()),
            Err(panic) => {
                let message = panic_message(panic);
                error!("batch fetch aborted: {}", message);
                BatchOutcome::Uniform(LoaderError::Aborted(message))
            }
        };

        if let BatchOutcome::Uniform(err) = &outcome {
            debug!("batch completed with uniform error: {}", err);
        }

        shared.complete(outcome);
    }
}

/// 提取panic负载中的描述信息
fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 延迟加载句柄
///
/// 由[`Loader::load_deferred`]返回。同一批次的所有句柄共享批次
/// 对象，等待同一个完成信号；完成前后调用[`Deferred::resolve`]
/// 均可取得结果。
pub struct Deferred<F: BatchFetcher> {
    state: DeferredState<F>,
}

enum DeferredState<F: BatchFetcher> {
    /// 缓存命中，结果已经就绪
    Ready(LoadResult<F::Value, F::Error>),
    /// 等待所在批次完成
    Pending {
        inner: Arc<LoaderInner<F>>,
        shared: Arc<BatchShared<F::Value, F::Error>>,
        index: usize,
        key: F::Key,
    },
}

impl<F: BatchFetcher> Deferred<F> {
    /// 等待批次完成并取得本键的结果
    ///
    /// 单键成功时把值写回缓存后返回，后续同键加载命中缓存；错误
    /// 不进入缓存，失败的键在下次加载时重新回源。
    pub async fn resolve(self) -> LoadResult<F::Value, F::Error> {
        match self.state {
            DeferredState::Ready(result) => result,
            DeferredState::Pending {
                inner,
                shared,
                index,
                key,
            } => {
                if !shared.wait_done().await {
                    // 信号端被意外丢弃，合成统一错误保证前向推进
                    return Err(LoaderError::Aborted(
                        "batch abandoned before completion".to_string(),
                    ));
                }

                let result = shared.resolve_slot(index);
                if let Ok(value) = &result {
                    let mut state = inner.state.lock().unwrap();
                    state.cache.set(key, value.clone());
                }
                result
            }
        }
    }
}

/// 多键延迟加载句柄
///
/// 保留登记顺序，[`DeferredMany::resolve`]返回与输入等长、位置
/// 一一对应的结果。
pub struct DeferredMany<F: BatchFetcher> {
    items: Vec<Deferred<F>>,
}

impl<F: BatchFetcher> DeferredMany<F> {
    /// 已登记的键数
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// 是否没有登记任何键
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// 等待所有相关批次完成并取得全部结果
    pub async fn resolve(self) -> Vec<LoadResult<F::Value, F::Error>> {
        join_all(self.items.into_iter().map(Deferred::resolve)).await
    }
}
