//! 结果缓存 - 业务能力层
//!
//! 把最近一次的结果视图镜像到两个键值存储中（会话级 + 持久化），
//! 供独立的查看器读取。这只是展示缓存，不是权威状态。

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{AppResult, StorageError};
use crate::workflow::AggregateView;

/// 结果缓存使用的固定键
pub const RESULTS_STORAGE_KEY: &str = "analysisResults";

/// 键值存储
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn set_item(&self, key: &str, value: &str) -> AppResult<()>;
    async fn get_item(&self, key: &str) -> AppResult<Option<String>>;
}

/// 进程内存储，生命周期与当前运行一致
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        let items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        Ok(items.get(key).cloned())
    }
}

/// 文件存储，每个键对应目录下的一个 `<key>.json`
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        let path = self.path_for(key);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StorageError::WriteFailed {
                path: self.dir.display().to_string(),
                source: e,
            })?;
        tokio::fs::write(&path, value)
            .await
            .map_err(|e| StorageError::WriteFailed {
                path: path.display().to_string(),
                source: e,
            })?;
        Ok(())
    }

    async fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::ReadFailed {
                path: path.display().to_string(),
                source: e,
            }
            .into()),
        }
    }
}

/// 结果镜像
pub struct ResultMirror {
    session_store: Arc<dyn KeyValueStore>,
    durable_store: Arc<dyn KeyValueStore>,
}

impl ResultMirror {
    pub fn new(session_store: Arc<dyn KeyValueStore>, durable_store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            session_store,
            durable_store,
        }
    }

    /// 写入两个存储
    pub async fn mirror(&self, view: &AggregateView) -> AppResult<()> {
        let records = view.flat_extracted_data();
        let json = serde_json::to_string(&records).map_err(StorageError::Serialize)?;

        self.session_store.set_item(RESULTS_STORAGE_KEY, &json).await?;
        self.durable_store.set_item(RESULTS_STORAGE_KEY, &json).await?;

        debug!("结果缓存已更新: {} 条记录", records.len());
        Ok(())
    }
}
