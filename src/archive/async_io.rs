//! 异步包装：在 async 上下文中调用存档，避免阻塞运行时
//!
//! 文件操作全部是同步的，这里统一放进 spawn_blocking。

use std::io;
use std::sync::Arc;

use crate::archive::{Archivist, StoreOutcome};
use crate::core::error::ArchiveError;
use crate::memory::vocabulary::VocabularyModel;
use crate::reader::{ArchivedChat, ChatReader};

fn join_error<V: VocabularyModel>(archivist: &Archivist<V>, e: tokio::task::JoinError) -> ArchiveError {
    ArchiveError::Io {
        path: archivist.directory().to_path_buf(),
        source: io::Error::new(io::ErrorKind::Other, e),
    }
}

/// 异步写入一个已归档的 chat
pub async fn store_async<V>(
    archivist: Arc<Archivist<V>>,
    chat: ArchivedChat,
) -> Result<StoreOutcome, ArchiveError>
where
    V: VocabularyModel + 'static,
{
    let worker = Arc::clone(&archivist);
    tokio::task::spawn_blocking(move || worker.store(&chat))
        .await
        .map_err(|e| join_error(&archivist, e))?
}

/// 异步严格加载一个 chat
pub async fn load_reader_async<V>(
    archivist: Arc<Archivist<V>>,
    id: String,
) -> Result<ChatReader<V>, ArchiveError>
where
    V: VocabularyModel + 'static,
{
    let worker = Arc::clone(&archivist);
    tokio::task::spawn_blocking(move || worker.load_reader(&id))
        .await
        .map_err(|e| join_error(&archivist, e))?
}

/// 异步执行 update_all，收集需要关注的 chat ID；遍历失败时返回该错误
pub async fn update_all_async<V>(archivist: Arc<Archivist<V>>) -> Result<Vec<String>, ArchiveError>
where
    V: VocabularyModel + 'static,
{
    let worker = Arc::clone(&archivist);
    tokio::task::spawn_blocking(move || worker.update_all().collect::<Result<Vec<_>, _>>())
        .await
        .map_err(|e| join_error(&archivist, e))?
}
