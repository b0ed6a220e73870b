//! 持久化的响应缓存。
//!
//! 所有条目都以 `前缀:标识` 的形式作为键，值为 JSON 文本。缓存没有过期时间，
//! 也不做容量限制；调用方通过 `invalidate_cache` 参数跳过读取。
//!
//! 磁盘上是一个 JSON 对象文件，落盘时整体重写（先写临时文件再重命名）。
//! `write` 立即落盘；`stage` 只改内存，等到 `persist` 时一次性落盘。

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use tokio::{
    fs,
    sync::{Mutex, OwnedMutexGuard},
};
use tracing::{debug, warn};

use crate::error::Result;

/// 缓存键的命名空间。不同操作使用不同前缀，互不冲突。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    /// 搜索接口的原始响应，标识为请求 URL。
    Search,
    /// 用户歌曲列表的单页响应，标识为请求 URL。
    Tracks,
    /// 单首歌曲的完整信息，标识为歌曲 ID。
    SongDetails,
    /// 已选定的转码选择器 URL，标识为歌曲 ID。
    Song,
    /// 按 ID 获取的歌单信息。
    Playlist,
    /// 解析链接得到的原始载荷，标识为去掉查询参数后的链接。
    Resolve,
}

impl CacheKind {
    /// 返回该命名空间的前缀（不含冒号）。
    pub fn prefix(self) -> &'static str {
        match self {
            CacheKind::Search => "search",
            CacheKind::Tracks => "tracks",
            CacheKind::SongDetails => "songDets",
            CacheKind::Song => "song",
            CacheKind::Playlist => "playlist",
            CacheKind::Resolve => "resolve",
        }
    }

    /// 拼出完整的缓存键。
    pub fn key(self, ident: &str) -> String {
        format!("{}:{ident}", self.prefix())
    }
}

/// 键值对形式的响应缓存。
///
/// 内存中的条目保存在 `DashMap` 里，落盘操作由一把异步锁串行化。
/// 需要“读取、未命中、请求、写入”整体互斥的调用方，应先通过 [`lock_key`](Self::lock_key)
/// 取得该键的锁。
#[derive(Debug)]
pub struct ResponseCache {
    path: Option<PathBuf>,
    entries: DashMap<String, String>,
    key_locks: DashMap<String, Arc<Mutex<()>>>,
    dirty: AtomicBool,
    flush_lock: Mutex<()>,
}

impl ResponseCache {
    /// 打开（或新建）位于 `path` 的缓存文件。
    ///
    /// 文件不存在时返回空缓存；文件损坏时记录警告并以空缓存启动。
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = DashMap::new();

        match fs::read_to_string(&path).await {
            Ok(content) if !content.trim().is_empty() => {
                match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                    Ok(map) => {
                        debug!("[Cache] 从 {:?} 加载了 {} 条缓存。", path, map.len());
                        for (key, value) in map {
                            entries.insert(key, value);
                        }
                    }
                    Err(e) => {
                        warn!("[Cache] 缓存文件 {:?} 已损坏，将以空缓存启动: {e}", path);
                    }
                }
            }
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("[Cache] 缓存文件 {:?} 不存在，将在首次写入时创建。", path);
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            path: Some(path),
            entries,
            key_locks: DashMap::new(),
            dirty: AtomicBool::new(false),
            flush_lock: Mutex::new(()),
        })
    }

    /// 创建一个不落盘的缓存。
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: DashMap::new(),
            key_locks: DashMap::new(),
            dirty: AtomicBool::new(false),
            flush_lock: Mutex::new(()),
        }
    }

    /// 缓存文件的路径（内存缓存返回 `None`）。
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 读取键对应的 JSON 文本。键不存在时返回 `None`。
    pub fn read(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    /// 读取并反序列化键对应的值。
    ///
    /// 值无法反序列化为 `T` 时视为不存在。
    pub fn read_parsed<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let text = self.read(key)?;
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("[Cache] 键 '{key}' 的值无法解析，视为未命中: {e}");
                None
            }
        }
    }

    /// 序列化 `value` 并写入缓存，随后落盘。
    pub async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.write_raw(key, text).await
    }

    /// 直接写入一段 JSON 文本，随后落盘。
    pub async fn write_raw(&self, key: &str, json_text: String) -> Result<()> {
        self.insert(key, json_text);
        self.flush().await
    }

    /// 序列化 `value` 并写入内存，暂不落盘。之后需调用 [`persist`](Self::persist)。
    pub fn stage<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.insert(key, text);
        Ok(())
    }

    /// 如果有尚未落盘的修改，则落盘一次。
    pub async fn persist(&self) -> Result<()> {
        if !self.dirty.load(Ordering::Acquire) {
            return Ok(());
        }
        self.flush().await
    }

    /// 是否有尚未落盘的修改。
    pub fn has_pending_writes(&self) -> bool {
        self.path.is_some() && self.dirty.load(Ordering::Acquire)
    }

    /// 取得某个键的独占锁。
    ///
    /// 锁只在调用方之间协调，`read`/`write` 本身不检查它。
    /// 释放守卫后应调用 [`release_key`](Self::release_key) 回收不再使用的锁。
    pub async fn lock_key(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self.key_locks.entry(key.to_string()).or_default().clone();
        lock.lock_owned().await
    }

    /// 回收没有其他持有者的键锁。
    pub fn release_key(&self, key: &str) {
        self.key_locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn insert(&self, key: &str, json_text: String) {
        self.entries.insert(key.to_string(), json_text);
        self.dirty.store(true, Ordering::Release);
    }

    /// 删除单个条目。返回该键此前是否存在。
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let existed = self.entries.remove(key).is_some();
        if existed {
            self.dirty.store(true, Ordering::Release);
            self.flush().await?;
        }
        Ok(existed)
    }

    /// 清空全部条目。
    pub async fn clear(&self) -> Result<()> {
        self.entries.clear();
        self.dirty.store(true, Ordering::Release);
        self.flush().await
    }

    /// 当前条目数。
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 缓存是否为空。
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            self.dirty.store(false, Ordering::Release);
            return Ok(());
        };

        let _guard = self.flush_lock.lock().await;
        self.dirty.store(false, Ordering::Release);

        let snapshot: BTreeMap<String, String> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let content = serde_json::to_string(&snapshot)?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }
        let tmp_path = path.with_extension("cache.tmp");
        fs::write(&tmp_path, content).await?;
        fs::rename(&tmp_path, path).await?;
        Ok(())
    }
}
