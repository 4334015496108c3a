//! 惰性遍历存档目录中的所有 chat
//!
//! 每次 next() 只加载一个 chat，调用方可以随时停止。顺序即目录列表顺序，不保证稳定。
//! 周期超出当前区间（例如配置收紧后）的 chat 会先裁剪并立即落盘，再产出。
//! 卡片 id 与目录不符、或旧格式卡片的内嵌词库解析失败时，只在内存中裁剪，不写回。
//! 任一 chat 失败：记录日志、产出 Err，之后遍历结束。

use std::fs::{DirEntry, ReadDir};

use crate::archive::{Archivist, CHAT_PREFIX};
use crate::core::error::ArchiveError;
use crate::memory::layout::CardVersion;
use crate::memory::vocabulary::VocabularyModel;
use crate::reader::ChatReader;

pub struct ChatScan<'a, V: VocabularyModel> {
    archivist: &'a Archivist<V>,
    entries: Option<ReadDir>,
    /// 打开目录失败时，第一次 next() 产出该错误
    pending: Option<ArchiveError>,
}

/// 遍历中的一个 chat：目录 id、reader 与卡片在磁盘上的版本
pub(crate) struct ScannedChat<V: VocabularyModel> {
    pub(crate) id: String,
    pub(crate) reader: ChatReader<V>,
    pub(crate) version: CardVersion,
}

impl<'a, V: VocabularyModel> ChatScan<'a, V> {
    pub(crate) fn new(archivist: &'a Archivist<V>) -> Self {
        let directory = archivist.directory();
        match std::fs::read_dir(directory) {
            Ok(entries) => Self {
                archivist,
                entries: Some(entries),
                pending: None,
            },
            Err(e) => Self {
                archivist,
                entries: None,
                pending: Some(ArchiveError::from_io(directory, e)),
            },
        }
    }

    fn abort(&mut self, name: &str, error: ArchiveError) -> Result<ScannedChat<V>, ArchiveError> {
        tracing::error!("Failed passing through {}: {}", name, error);
        self.entries = None;
        Err(error)
    }

    /// 加载一个 chat；周期越界时裁剪，允许重写时立即保存
    fn pass(&self, id: String) -> Result<ScannedChat<V>, ArchiveError> {
        let (mut reader, version) = self.archivist.load_chat(&id)?;
        tracing::info!("Successfully passed through {} ({}) chat.", id, reader.title());

        let period = reader.period();
        if !reader.bounds().contains(period) {
            let applied = reader.set_period(period);
            tracing::info!("Chat {} period {} out of bounds, clamped to {}", id, period, applied);
            if self.archivist.can_rewrite(&id, &reader, version) {
                self.archivist.save(&mut reader)?;
            }
        }
        Ok(ScannedChat {
            id,
            reader,
            version,
        })
    }

    pub(crate) fn next_scanned(&mut self) -> Option<Result<ScannedChat<V>, ArchiveError>> {
        if let Some(error) = self.pending.take() {
            let name = self.archivist.directory().display().to_string();
            return Some(self.abort(&name, error));
        }

        loop {
            let entry = match self.entries.as_mut()?.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let error = ArchiveError::from_io(self.archivist.directory(), e);
                    let name = self.archivist.directory().display().to_string();
                    return Some(self.abort(&name, error));
                }
            };
            let Some(id) = chat_id(&entry) else {
                continue;
            };
            let name = format!("{}{}", CHAT_PREFIX, id);
            return Some(match self.pass(id) {
                Ok(scanned) => Ok(scanned),
                Err(e) => self.abort(&name, e),
            });
        }
    }
}

impl<V: VocabularyModel> Iterator for ChatScan<'_, V> {
    type Item = Result<ChatReader<V>, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_scanned()
            .map(|scanned| scanned.map(|chat| chat.reader))
    }
}

/// chat_<id> 目录对应的 id；其他条目返回 None
pub(crate) fn chat_id(entry: &DirEntry) -> Option<String> {
    let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
    if !is_dir {
        return None;
    }
    let name = entry.file_name();
    let id = name.to_str()?.strip_prefix(CHAT_PREFIX)?;
    if id.is_empty() {
        return None;
    }
    Some(id.to_string())
}

#[cfg(test)]
mod tests {
    use crate::archive::{ArchiveSettings, Archivist, StoreOutcome};
    use crate::memory::card::{ChatCard, PeriodBounds};
    use crate::core::error::VocabularyError;
    use crate::memory::layout::CardVersion;
    use crate::memory::vocabulary::VocabularyModel;
    use crate::memory::wide_text;
    use crate::reader::ReaderSettings;
    use tempfile::TempDir;

    fn archivist(dir: &std::path::Path, min: u64, max: u64) -> Archivist {
        Archivist::new(
            ArchiveSettings {
                directory: dir.to_path_buf(),
                extension: ".json".to_string(),
                read_only: false,
            },
            ReaderSettings::new(PeriodBounds::new(min, max), Vec::new()),
        )
    }

    fn write_card(a: &Archivist, id: &str, period: u64) {
        std::fs::create_dir_all(a.chat_folder(id)).unwrap();
        std::fs::write(a.card_path(id), ChatCard::new(id, "group", "g", period, 0.5).encode()).unwrap();
    }

    #[test]
    fn test_scan_yields_every_chat() {
        let dir = TempDir::new().unwrap();
        let a = archivist(dir.path(), 1, 100);
        for id in ["1", "2", "3"] {
            write_card(&a, id, 10);
        }
        std::fs::create_dir_all(dir.path().join("other")).unwrap();

        let mut ids: Vec<String> = a
            .scan()
            .map(|r| r.unwrap().cid().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_scan_clamps_and_persists_out_of_range_period() {
        let dir = TempDir::new().unwrap();
        let a = archivist(dir.path(), 5, 20);
        write_card(&a, "low", 1);
        write_card(&a, "high", 500);

        for reader in a.scan() {
            let reader = reader.unwrap();
            // 产出时磁盘上已是修正后的周期
            let stored = ChatCard::decode(&a.read_card(reader.cid()).unwrap()).unwrap().card;
            assert_eq!(stored.period, reader.period());
            match reader.cid() {
                "low" => assert_eq!(reader.period(), 5),
                "high" => assert_eq!(reader.period(), 20),
                other => panic!("unexpected chat {}", other),
            }
        }
    }

    #[test]
    fn test_scan_leaves_in_range_chats_untouched() {
        let dir = TempDir::new().unwrap();
        let a = archivist(dir.path(), 1, 100);
        write_card(&a, "7", 10);
        let readers: Vec<_> = a.scan().collect();
        assert_eq!(readers.len(), 1);
        // 没有裁剪就不会写词库文件
        assert!(!a.vocabulary_path("7").exists());
    }

    #[test]
    fn test_scan_is_fail_fast() {
        let dir = TempDir::new().unwrap();
        let a = archivist(dir.path(), 1, 100);
        write_card(&a, "1", 10);
        write_card(&a, "2", 10);
        // 没有卡片的 chat 目录
        std::fs::create_dir_all(a.chat_folder("broken")).unwrap();

        let results: Vec<_> = a.scan().collect();
        let errors = results.iter().filter(|r| r.is_err()).count();
        assert_eq!(errors, 1);
        assert!(results.last().unwrap().is_err());
        assert!(results.len() <= 3);
    }

    #[test]
    fn test_scan_missing_directory() {
        let dir = TempDir::new().unwrap();
        let a = archivist(&dir.path().join("nope"), 1, 100);
        let results: Vec<_> = a.scan().collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].as_ref().unwrap_err().is_not_found());
        assert!(a.count_chats().unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_all_reports_unsaveable_chats_and_continues() {
        let dir = TempDir::new().unwrap();
        let a = archivist(dir.path(), 1, 100);
        write_card(&a, "ok1", 10);
        write_card(&a, "ok2", 10);
        write_card(&a, "corrupt", 10);
        wide_text::write(&a.vocabulary_path("corrupt"), "{not json").unwrap();

        let failed: Vec<String> = a.update_all().map(|r| r.unwrap()).collect();
        assert_eq!(failed, vec!["corrupt"]);

        // 正常 chat 已落盘词库，损坏的词库未被覆盖
        assert!(a.vocabulary_path("ok1").exists());
        assert!(a.vocabulary_path("ok2").exists());
        assert_eq!(a.read_vocabulary("corrupt").unwrap(), "{not json");
    }

    #[test]
    fn test_update_all_read_only_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let writer = archivist(dir.path(), 1, 100);
        write_card(&writer, "1", 10);

        let a: Archivist = Archivist::new(
            ArchiveSettings {
                directory: dir.path().to_path_buf(),
                extension: ".json".to_string(),
                read_only: true,
            },
            ReaderSettings::default(),
        );
        let mut reader = a.load_reader("1").unwrap();
        assert_eq!(a.save(&mut reader).unwrap(), StoreOutcome::ReadOnly);
        assert_eq!(a.update_all().count(), 0);
        assert!(!a.vocabulary_path("1").exists());
    }

    #[test]
    fn test_scan_keeps_legacy_card_whose_vocabulary_failed_to_load() {
        let dir = TempDir::new().unwrap();
        let a = archivist(dir.path(), 5, 50);
        let legacy = "VERSION: v3\nCHAT_ID: 9\nCHAT_TYPE: group\nCHAT_NAME: Viejo\nWORD_COUNT: 3\nMESSAGE_FREQ: 1\nANSWER_FREQ: 0.5\nRESTRICTED: False\ndict:\n{\"^START^ ^START^\": [\"hola\"], TRUNCATED\n";
        std::fs::create_dir_all(a.chat_folder("9")).unwrap();
        std::fs::write(a.card_path("9"), legacy).unwrap();

        let readers: Vec<_> = a.scan().collect();
        assert_eq!(readers.len(), 1);
        let reader = readers[0].as_ref().unwrap();
        assert!(!reader.has_vocabulary());
        assert_eq!(reader.period(), 5);

        // 内嵌词库仍在原卡片里
        assert_eq!(a.read_card("9").unwrap(), legacy);
        assert!(!a.vocabulary_path("9").exists());

        let flagged: Vec<String> = a.update_all().map(|r| r.unwrap()).collect();
        assert_eq!(flagged, vec!["9"]);
        assert_eq!(a.read_card("9").unwrap(), legacy);
    }

    #[test]
    fn test_scan_clamps_current_card_without_touching_unreadable_vocabulary() {
        let dir = TempDir::new().unwrap();
        let a = archivist(dir.path(), 5, 50);
        write_card(&a, "3", 1);
        wide_text::write(&a.vocabulary_path("3"), "{not json").unwrap();

        let readers: Vec<_> = a.scan().collect();
        assert!(!readers[0].as_ref().unwrap().has_vocabulary());
        let stored = ChatCard::decode(&a.read_card("3").unwrap()).unwrap().card;
        assert_eq!(stored.period, 5);
        assert_eq!(a.read_vocabulary("3").unwrap(), "{not json");
    }

    #[test]
    fn test_card_for_another_chat_is_never_written_elsewhere() {
        let dir = TempDir::new().unwrap();
        let a = archivist(dir.path(), 5, 50);

        let mut b = a.new_reader("B", "group", "Chat B");
        b.learn("1", "solo en el chat b");
        a.save(&mut b).unwrap();
        let b_card = a.read_card("B").unwrap();
        let b_vocabulary = a.read_vocabulary("B").unwrap();

        // chat_A 里放着一张写着 B 的卡片，周期也越界
        std::fs::create_dir_all(a.chat_folder("A")).unwrap();
        std::fs::write(a.card_path("A"), ChatCard::new("B", "group", "Chat A", 1, 0.5).encode()).unwrap();
        wide_text::write(&a.vocabulary_path("A"), "{}").unwrap();

        let _: Vec<_> = a.scan().collect();
        let flagged: Vec<String> = a.update_all().map(|r| r.unwrap()).collect();

        assert_eq!(flagged, vec!["A"]);
        assert_eq!(a.read_card("B").unwrap(), b_card);
        assert_eq!(a.read_vocabulary("B").unwrap(), b_vocabulary);
        assert_eq!(
            ChatCard::decode(&a.read_card("A").unwrap()).unwrap().card.period,
            1
        );
    }

    #[test]
    fn test_unrecognised_card_does_not_create_stray_folder() {
        let dir = TempDir::new().unwrap();
        let a = archivist(dir.path(), 1, 100);
        std::fs::create_dir_all(a.chat_folder("5")).unwrap();
        std::fs::write(a.card_path("5"), "VERSION: v9\nsomething\nelse\n7\n").unwrap();

        let flagged: Vec<String> = a.update_all().map(|r| r.unwrap()).collect();
        assert_eq!(flagged, vec!["5"]);
        assert_eq!(a.count_chats().unwrap(), 1);
    }

    /// dump 对含 "poison" 的词库失败的测试模型
    #[derive(Default)]
    struct PoisonVocabulary {
        lines: Vec<String>,
    }

    impl VocabularyModel for PoisonVocabulary {
        fn add(&mut self, text: &str) {
            self.lines.push(text.to_string());
        }

        fn generate(&self, _max_len: usize, _silent: bool) -> String {
            self.lines.first().cloned().unwrap_or_default()
        }

        fn dump(&self) -> Result<String, VocabularyError> {
            if self.lines.iter().any(|l| l == "poison") {
                return Err(serde_json::from_str::<serde_json::Value>("poison").unwrap_err().into());
            }
            Ok(serde_json::to_string(&self.lines)?)
        }

        fn load(blob: &str) -> Result<Self, VocabularyError> {
            Ok(Self {
                lines: serde_json::from_str(blob)?,
            })
        }
    }

    #[test]
    fn test_update_all_continues_after_a_failed_save() {
        let dir = TempDir::new().unwrap();
        let a: Archivist<PoisonVocabulary> = Archivist::new(
            ArchiveSettings {
                directory: dir.path().to_path_buf(),
                extension: ".json".to_string(),
                read_only: false,
            },
            ReaderSettings::default(),
        );
        for id in ["1", "2"] {
            std::fs::create_dir_all(a.chat_folder(id)).unwrap();
            let v4 = format!(
                "VERSION: v4\nCHAT_ID: {}\nCHAT_TYPE: group\nCHAT_NAME: g\nMESSAGE_PERIOD: 10\n",
                id
            );
            std::fs::write(a.card_path(id), v4).unwrap();
        }
        wide_text::write(&a.vocabulary_path("1"), "[\"poison\"]").unwrap();
        wide_text::write(&a.vocabulary_path("2"), "[\"hola\"]").unwrap();

        let flagged: Vec<String> = a.update_all().map(|r| r.unwrap()).collect();
        assert_eq!(flagged, vec!["1"]);

        let first = ChatCard::decode(&a.read_card("1").unwrap()).unwrap();
        assert_eq!(first.version, CardVersion::V4);
        let second = ChatCard::decode(&a.read_card("2").unwrap()).unwrap();
        assert_eq!(second.version, CardVersion::V5);
    }
}
