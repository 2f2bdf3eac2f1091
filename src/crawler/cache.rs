use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const ENTRY_EXTENSION: &str = "html";
const TEMP_EXTENSION: &str = "tmp";

/// 页面缓存，以规范化链接的 SHA-256 为文件名。
///
/// 目录不可用时退化为不缓存，任何磁盘错误都只记录日志。
#[derive(Clone, Default)]
pub struct PageCache {
    inner: Option<Arc<Inner>>,
}

struct Inner {
    dir: PathBuf,
    index: RwLock<HashMap<String, PathBuf>>,
    // 同一个键的读写串行
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    pending: Mutex<JoinSet<()>>,
}

pub fn cache_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn is_entry(path: &Path) -> bool {
    has_key_name(path, ENTRY_EXTENSION)
}

fn is_leftover(path: &Path) -> bool {
    has_key_name(path, TEMP_EXTENSION)
}

fn has_key_name(path: &Path, extension: &str) -> bool {
    path.extension().is_some_and(|ext| ext == extension)
        && path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem.len() == 64 && stem.bytes().all(|b| b.is_ascii_hexdigit()))
}

impl PageCache {
    pub fn disabled() -> Self {
        Self { inner: None }
    }

    /// 扫描缓存目录：删除残留的临时文件，缓存文件总大小超过 `max_size` 时全部删除。
    ///
    /// 只处理以键命名的文件，目录里的其他内容保持原样。
    pub async fn open(dir: impl Into<PathBuf>, max_size: u64) -> Self {
        let dir = dir.into();
        match scan(&dir, max_size).await {
            Ok(index) => {
                info!("缓存目录 {} 中有 {} 个页面", dir.display(), index.len());
                Self {
                    inner: Some(Arc::new(Inner {
                        dir,
                        index: RwLock::new(index),
                        locks: Mutex::new(HashMap::new()),
                        pending: Mutex::new(JoinSet::new()),
                    })),
                }
            }
            Err(e) => {
                warn!("缓存目录 {} 不可用，改为直接下载: {}", dir.display(), e);
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |inner| inner.read_index().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 读取缓存，空文件或读取失败的条目会被删除并视为未命中
    pub async fn get(&self, url: &str) -> Option<String> {
        let inner = self.inner.as_ref()?;
        let key = cache_key(url);
        if !inner.read_index().contains_key(&key) {
            return None;
        }

        let lock = inner.lock_for(&key);
        let body = {
            let _guard = lock.lock().await;
            inner.load(&key, url).await
        };
        inner.release(&key, lock);
        body
    }

    /// 后台写入缓存，返回的接收端在写入结束（无论成败）后收到通知
    pub fn put(&self, url: &str, body: String) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let Some(inner) = &self.inner else {
            let _ = tx.send(());
            return rx;
        };

        let task_inner = Arc::clone(inner);
        let key = cache_key(url);
        let url = url.to_owned();
        let mut pending = inner.pending.lock().unwrap_or_else(PoisonError::into_inner);
        // 回收已结束的写入任务
        while pending.try_join_next().is_some() {}
        pending.spawn(async move {
            let lock = task_inner.lock_for(&key);
            {
                let _guard = lock.lock().await;
                if let Err(e) = task_inner.store(&key, &body).await {
                    warn!("写入缓存失败 {}: {}", url, e);
                }
            }
            task_inner.release(&key, lock);
            let _ = tx.send(());
        });
        rx
    }

    /// 等待所有已发起的写入结束
    pub async fn flush(&self) {
        let Some(inner) = &self.inner else {
            return;
        };
        let mut pending = std::mem::take(
            &mut *inner.pending.lock().unwrap_or_else(PoisonError::into_inner),
        );
        while pending.join_next().await.is_some() {}
    }
}

impl Inner {
    fn read_index(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, PathBuf>> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key.to_owned()).or_default())
    }

    /// 归还键锁，没有其他任务持有时从表中移除
    fn release(&self, key: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // 表里一份，手上一份
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
    }

    async fn load(&self, key: &str, url: &str) -> Option<String> {
        let path = self.read_index().get(key).cloned()?;
        match fs::read_to_string(&path).await {
            Ok(body) if !body.is_empty() => {
                debug!("缓存命中: {}", url);
                Some(body)
            }
            Ok(_) => {
                debug!("缓存为空，删除: {}", path.display());
                self.evict(key, &path).await;
                None
            }
            Err(e) => {
                warn!("读取缓存失败，删除 {}: {}", path.display(), e);
                self.evict(key, &path).await;
                None
            }
        }
    }

    async fn evict(&self, key: &str, path: &Path) {
        let _ = fs::remove_file(path).await;
        self.index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    async fn store(&self, key: &str, body: &str) -> io::Result<()> {
        let path = self.dir.join(format!("{key}.{ENTRY_EXTENSION}"));
        let tmp = self.dir.join(format!("{key}.{TEMP_EXTENSION}"));
        fs::write(&tmp, body).await?;
        fs::rename(&tmp, &path).await?;
        self.index
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), path);
        Ok(())
    }
}

async fn scan(dir: &Path, max_size: u64) -> io::Result<HashMap<String, PathBuf>> {
    fs::create_dir_all(dir).await?;

    let mut index = HashMap::new();
    let mut total = 0;
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        if is_entry(&path) {
            total += metadata.len();
            if let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) {
                index.insert(key.to_owned(), path.clone());
            }
        } else if is_leftover(&path) {
            debug!("删除未完成的写入: {}", path.display());
            fs::remove_file(&path).await?;
        }
    }

    if total > max_size {
        info!("缓存大小 {} 字节超过上限 {} 字节，正在清理", total, max_size);
        for path in index.values() {
            fs::remove_file(path).await?;
        }
        index.clear();
    }
    Ok(index)
}
