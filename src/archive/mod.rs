//! 存档层（Archivist）：负责所有 chat 的磁盘布局
//!
//! ```text
//! <base>/chat_<id>/card.txt        卡片，UTF-8
//! <base>/chat_<id>/record<ext>     词库，UTF-16（当前格式）
//! ```
//!
//! 目录列表是「有哪些 chat」的唯一依据，没有内存索引；每次扫描为 O(chat 数)。
//! 写文件是整文件覆盖，不保证原子性，也不处理多进程并发写同一 chat。

pub mod async_io;
pub mod scan;

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::config::AppConfig;
use crate::core::error::ArchiveError;
use crate::memory::card::{ChatCard, PeriodBounds};
use crate::memory::layout::{CardVersion, VocabularyPayload};
use crate::memory::vocabulary::{MarkovVocabulary, VocabularyModel};
use crate::memory::wide_text;
use crate::reader::{ArchivedChat, ChatReader, ReaderSettings};

pub use scan::ChatScan;
use scan::ScannedChat;

/// chat 目录名前缀
pub const CHAT_PREFIX: &str = "chat_";
/// 卡片文件名
pub const CARD_FILE: &str = "card.txt";
/// 词库文件名（不含扩展名）
pub const VOCABULARY_STEM: &str = "record";

/// 存档的部署级参数
#[derive(Debug, Clone)]
pub struct ArchiveSettings {
    /// 为空时使用当前目录
    pub directory: PathBuf,
    /// 词库文件扩展名，如 ".json"；可以为空
    pub extension: String,
    /// 只读模式下 store 不落盘（演练 / 排查用）
    pub read_only: bool,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./chatlogs"),
            extension: ".json".to_string(),
            read_only: false,
        }
    }
}

/// store 的结果；Skipped 表示目录创建失败，卡片没有写入
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Written,
    ReadOnly,
    Skipped,
}

pub struct Archivist<V: VocabularyModel = MarkovVocabulary> {
    directory: PathBuf,
    extension: String,
    read_only: bool,
    reader: ReaderSettings,
    _model: PhantomData<fn() -> V>,
}

impl<V: VocabularyModel> Archivist<V> {
    pub fn new(settings: ArchiveSettings, reader: ReaderSettings) -> Self {
        let directory = if settings.directory.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            settings.directory
        };
        Self {
            directory,
            extension: settings.extension,
            read_only: settings.read_only,
            reader,
            _model: PhantomData,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let reader_section = &config.reader;
        let mut reader = ReaderSettings::new(
            PeriodBounds::new(reader_section.min_period, reader_section.max_period),
            reader_section.names.iter().cloned(),
        );
        reader.private_period = reader_section.private_period;
        reader.group_period = reader_section.group_period;
        reader.answer_probability = reader_section.answer_probability;

        Self::new(
            ArchiveSettings {
                directory: config.archive.directory.clone(),
                extension: config.archive.extension.clone(),
                read_only: config.archive.read_only,
            },
            reader,
        )
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn reader_settings(&self) -> &ReaderSettings {
        &self.reader
    }

    pub fn bounds(&self) -> PeriodBounds {
        self.reader.bounds
    }

    /// chat 目录：<base>/chat_<id>
    pub fn chat_folder(&self, id: &str) -> PathBuf {
        self.directory.join(format!("{}{}", CHAT_PREFIX, id))
    }

    pub fn card_path(&self, id: &str) -> PathBuf {
        self.chat_folder(id).join(CARD_FILE)
    }

    pub fn vocabulary_path(&self, id: &str) -> PathBuf {
        self.chat_folder(id)
            .join(format!("{}{}", VOCABULARY_STEM, self.extension))
    }

    /// 写入卡片与（可选的）词库，均为覆盖写。
    /// 目录创建失败只记录日志并返回 Skipped，不向上抛出。
    pub fn store(&self, chat: &ArchivedChat) -> Result<StoreOutcome, ArchiveError> {
        if self.read_only {
            tracing::debug!("Read-only archive, not storing chat {}", chat.id);
            return Ok(StoreOutcome::ReadOnly);
        }

        let folder = self.chat_folder(&chat.id);
        if !folder.is_dir() {
            if let Err(e) = std::fs::create_dir_all(&folder) {
                tracing::error!("Failed creating {} folder: {}", folder.display(), e);
                return Ok(StoreOutcome::Skipped);
            }
            tracing::info!("Storing a new chat. Folder {} created.", folder.display());
        }

        let card_path = self.card_path(&chat.id);
        std::fs::write(&card_path, &chat.card)
            .map_err(|e| ArchiveError::from_io(&card_path, e))?;

        if let Some(vocabulary) = &chat.vocabulary {
            let path = self.vocabulary_path(&chat.id);
            wide_text::write(&path, vocabulary).map_err(|e| ArchiveError::from_io(&path, e))?;
        }
        Ok(StoreOutcome::Written)
    }

    /// archive + store
    pub fn save(&self, reader: &mut ChatReader<V>) -> Result<StoreOutcome, ArchiveError> {
        let archived = reader.archive().map_err(|source| ArchiveError::Vocabulary {
            id: reader.cid().to_string(),
            source,
        })?;
        self.store(&archived)
    }

    pub fn read_card(&self, id: &str) -> Result<String, ArchiveError> {
        let path = self.card_path(id);
        std::fs::read_to_string(&path).map_err(|e| ArchiveError::from_io(&path, e))
    }

    /// 当前格式的词库（UTF-16）
    pub fn read_vocabulary(&self, id: &str) -> Result<String, ArchiveError> {
        let path = self.vocabulary_path(id);
        wide_text::read(&path).map_err(|e| ArchiveError::from_io(&path, e))
    }

    /// 迁移用：同一个词库文件按旧的 UTF-8 读取
    pub fn read_vocabulary_utf8(&self, id: &str) -> Result<String, ArchiveError> {
        let path = self.vocabulary_path(id);
        std::fs::read_to_string(&path).map_err(|e| ArchiveError::from_io(&path, e))
    }

    pub fn load_card(&self, id: &str) -> Option<String> {
        self.read_card(id)
            .map_err(|e| tracing::error!("Metadata file for chat {} not loaded: {}", id, e))
            .ok()
    }

    pub fn load_vocabulary(&self, id: &str) -> Option<String> {
        self.read_vocabulary(id)
            .map_err(|e| tracing::error!("Vocabulary file for chat {} not loaded: {}", id, e))
            .ok()
    }

    pub fn load_vocabulary_legacy(&self, id: &str) -> Option<String> {
        self.read_vocabulary_utf8(id)
            .map_err(|e| tracing::error!("Legacy vocabulary file for chat {} not loaded: {}", id, e))
            .ok()
    }

    /// 严格加载：任何失败都以 ArchiveError 返回
    pub fn load_reader(&self, id: &str) -> Result<ChatReader<V>, ArchiveError> {
        self.load_chat(id).map(|(reader, _)| reader)
    }

    /// 同 load_reader，另外返回卡片在磁盘上的版本
    pub(crate) fn load_chat(&self, id: &str) -> Result<(ChatReader<V>, CardVersion), ArchiveError> {
        let text = self.read_card(id)?;
        let decoded = ChatCard::decode_with(&text, &self.reader.card_defaults()).map_err(|source| {
            ArchiveError::Card {
                id: id.to_string(),
                source,
            }
        })?;
        tracing::debug!("Chat {} card version {:?}", id, decoded.version);
        if decoded.card.id != id {
            tracing::warn!(
                "Chat folder {} holds a card for chat {}",
                self.chat_folder(id).display(),
                decoded.card.id
            );
        }

        let vocabulary = match decoded.vocabulary {
            VocabularyPayload::Sibling => self.load_sibling_vocabulary(id),
            VocabularyPayload::Dump(blob) => self.parse_vocabulary(id, &blob),
            VocabularyPayload::Lines(lines) => Some(V::from_lines(lines.as_slice())),
        };
        Ok((ChatReader::new(decoded.card, vocabulary, &self.reader), decoded.version))
    }

    /// 批量遍历中能否把 reader 写回 chat_<folder_id>：
    /// 卡片 id 必须与目录一致；旧格式的词库嵌在卡片里，没有词库时重写会丢掉它
    pub(crate) fn can_rewrite(&self, folder_id: &str, reader: &ChatReader<V>, version: CardVersion) -> bool {
        if reader.cid() != folder_id {
            tracing::warn!(
                "Not rewriting {}: card belongs to chat {}",
                self.chat_folder(folder_id).display(),
                reader.cid()
            );
            return false;
        }
        if !reader.has_vocabulary() && !version.is_current() {
            tracing::warn!(
                "Not rewriting chat {}: its {:?} card embeds a vocabulary that failed to load",
                folder_id,
                version
            );
            return false;
        }
        true
    }

    /// 未知 chat 或任何加载失败都返回 None（已记录日志）
    pub fn get_reader(&self, id: &str) -> Option<ChatReader<V>> {
        match self.load_reader(id) {
            Ok(reader) => Some(reader),
            Err(e) if e.is_not_found() => {
                tracing::info!("No stored data for chat {}", id);
                None
            }
            Err(e) => {
                tracing::error!("Failed loading chat {}: {}", id, e);
                None
            }
        }
    }

    /// 首次遇到的 chat
    pub fn new_reader(&self, id: &str, kind: &str, title: &str) -> ChatReader<V> {
        ChatReader::new_chat(id, kind, title, &self.reader)
    }

    /// 没有词库文件时从空词库开始；UTF-16 解不开时再按 UTF-8 试一次；
    /// 仍然失败返回 None，由 update_all 报告而不是用空词库覆盖
    fn load_sibling_vocabulary(&self, id: &str) -> Option<V> {
        let blob = match self.read_vocabulary(id) {
            Ok(blob) => blob,
            Err(e) if e.is_not_found() => {
                tracing::debug!("Chat {} has no vocabulary file, starting empty", id);
                return Some(V::default());
            }
            Err(e) if e.is_decode() => {
                tracing::warn!("{}; retrying as UTF-8", e);
                self.load_vocabulary_legacy(id)?
            }
            Err(e) => {
                tracing::error!("Vocabulary file for chat {} not loaded: {}", id, e);
                return None;
            }
        };
        self.parse_vocabulary(id, &blob)
    }

    fn parse_vocabulary(&self, id: &str, blob: &str) -> Option<V> {
        if blob.trim().is_empty() {
            return Some(V::default());
        }
        V::load(blob)
            .map_err(|e| tracing::error!("Vocabulary for chat {} is unreadable: {}", id, e))
            .ok()
    }

    /// 统计 chat_* 目录数
    pub fn count_chats(&self) -> Result<usize, ArchiveError> {
        let entries = std::fs::read_dir(&self.directory)
            .map_err(|e| ArchiveError::from_io(&self.directory, e))?;
        let mut count = 0;
        for entry in entries {
            let entry = entry.map_err(|e| ArchiveError::from_io(&self.directory, e))?;
            if scan::chat_id(&entry).is_some() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// 惰性遍历所有 chat；周期越界的先裁剪并立即落盘再产出。
    /// 任一 chat 失败即产出 Err 并结束遍历。
    pub fn scan(&self) -> ChatScan<'_, V> {
        ChatScan::new(self)
    }

    /// 逐个加载并立即保存所有 chat，产出需要关注的 chat ID（目录名中的 id）。
    /// 单个 chat 保存失败只记录并继续；遍历本身的失败以 Err 产出并结束。
    pub fn update_all(&self) -> impl Iterator<Item = Result<String, ArchiveError>> + '_ {
        let mut scan = self.scan();
        std::iter::from_fn(move || scan.next_scanned()).filter_map(move |scanned| {
            let ScannedChat {
                id,
                mut reader,
                version,
            } = match scanned {
                Ok(scanned) => scanned,
                Err(e) => return Some(Err(e)),
            };
            if !reader.has_vocabulary() {
                tracing::warn!("Chat {} has no vocabulary loaded, not saving it", id);
                return Some(Ok(id));
            }
            if !self.can_rewrite(&id, &reader, version) {
                return Some(Ok(id));
            }
            match self.save(&mut reader) {
                Ok(StoreOutcome::Skipped) => Some(Ok(id)),
                Ok(_) => None,
                Err(e) => {
                    tracing::error!("Failed updating chat {}: {}", id, e);
                    Some(Ok(id))
                }
            }
        })
    }
}
