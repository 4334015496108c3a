//! Velasco 存档维护入口
//!
//! 加载配置后遍历存档目录，把每个 chat 读出并按当前格式写回；
//! 周期越界的 chat 会被裁剪，旧版本卡片与 UTF-8 词库会被迁移。
//! 用法：velasco [配置文件路径]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use velasco::archive::async_io::update_all_async;
use velasco::config::load_config;
use velasco::{observability, Archivist};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path).context("Failed to load config")?;
    config.validate().context("Invalid config")?;

    let archivist: Arc<Archivist> = Arc::new(Archivist::from_config(&config));
    if archivist.is_read_only() {
        tracing::info!("Archive opened in read-only mode, nothing will be written");
    }

    let total = archivist
        .count_chats()
        .with_context(|| format!("Failed to list {}", archivist.directory().display()))?;
    tracing::info!("Found {} chats in {}", total, archivist.directory().display());

    let flagged = update_all_async(Arc::clone(&archivist))
        .await
        .context("Archive update aborted")?;

    if flagged.is_empty() {
        tracing::info!("All {} chats updated", total);
    } else {
        for id in &flagged {
            tracing::warn!("Chat {} was not updated", id);
        }
        tracing::warn!("{} of {} chats need attention", flagged.len(), total);
    }

    Ok(())
}
