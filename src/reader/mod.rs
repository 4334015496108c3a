//! 聊天状态引擎（Reader）
//!
//! 每个 chat 一个 [`ChatReader`]：持有卡片、词库、短期记忆与发言倒计时。
//! 倒计时由外部调度器递减，这里只提供读取 / 设置 / 重置，以及修改周期时的裁剪。
//! 不加锁：同一 chat 同一时刻只允许一个 ChatReader 被修改，由调用方保证。

pub mod content;

use std::sync::Arc;

use rand::Rng;

use crate::core::error::{CardError, VocabularyError};
use crate::memory::card::{self, CardDefaults, ChatCard, PeriodBounds};
use crate::memory::short_term::{Memory, ShortTermMemory};
use crate::memory::vocabulary::{MarkovVocabulary, VocabularyModel};

pub use content::MessageContent;

/// 不超过该词数且包含 bot 名字的消息视为召唤，不学习
const SUMMON_MAX_WORDS: usize = 3;

/// 创建 ChatReader 所需的部署级参数
#[derive(Debug, Clone)]
pub struct ReaderSettings {
    pub bounds: PeriodBounds,
    /// bot 的昵称与用户名，已转小写
    names: Arc<[String]>,
    pub private_period: u64,
    pub group_period: u64,
    pub answer_probability: f64,
}

impl ReaderSettings {
    pub fn new(bounds: PeriodBounds, names: impl IntoIterator<Item = String>) -> Self {
        let names: Vec<String> = names
            .into_iter()
            .map(|n| n.trim().to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        Self {
            bounds,
            names: names.into(),
            private_period: card::DEFAULT_PRIVATE_PERIOD,
            group_period: card::DEFAULT_GROUP_PERIOD,
            answer_probability: card::DEFAULT_ANSWER,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// 旧卡片缺字段时补的默认值
    pub fn card_defaults(&self) -> CardDefaults {
        CardDefaults {
            private_period: self.private_period,
            group_period: self.group_period,
            answer: self.answer_probability,
        }
    }

    /// 新 chat 的初始周期（已裁剪到区间内）
    pub fn default_period(&self, kind: &str) -> u64 {
        self.bounds.clamp(self.card_defaults().period_for(kind))
    }
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self::new(PeriodBounds::default(), Vec::new())
    }
}

/// archive() 的产物，交给 Archivist::store 落盘
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedChat {
    pub id: String,
    pub card: String,
    /// 没有词库时为 None，只写卡片
    pub vocabulary: Option<String>,
}

pub struct ChatReader<V: VocabularyModel = MarkovVocabulary> {
    card: ChatCard,
    /// 只有在词库文件存在但无法解析时为 None
    vocabulary: Option<V>,
    short_term: ShortTermMemory,
    countdown: u64,
    bounds: PeriodBounds,
    names: Arc<[String]>,
}

impl<V: VocabularyModel> ChatReader<V> {
    /// 从已有卡片构建；倒计时从卡片周期开始（倒计时不落盘）
    pub fn new(card: ChatCard, vocabulary: Option<V>, settings: &ReaderSettings) -> Self {
        Self {
            countdown: card.period,
            card,
            vocabulary,
            short_term: ShortTermMemory::new(),
            bounds: settings.bounds,
            names: Arc::clone(&settings.names),
        }
    }

    /// 首次遇到的 chat：新卡片 + 空词库
    pub fn new_chat(
        id: impl Into<String>,
        kind: impl Into<String>,
        title: impl Into<String>,
        settings: &ReaderSettings,
    ) -> Self {
        let kind = kind.into();
        let period = settings.default_period(&kind);
        let card = ChatCard::new(id, kind, title, period, settings.answer_probability);
        Self::new(card, Some(V::default()), settings)
    }

    pub fn card(&self) -> &ChatCard {
        &self.card
    }

    pub fn vocabulary(&self) -> Option<&V> {
        self.vocabulary.as_ref()
    }

    pub fn has_vocabulary(&self) -> bool {
        self.vocabulary.is_some()
    }

    pub fn short_term(&self) -> &ShortTermMemory {
        &self.short_term
    }

    pub fn bounds(&self) -> PeriodBounds {
        self.bounds
    }

    pub fn cid(&self) -> &str {
        &self.card.id
    }

    pub fn kind(&self) -> &str {
        &self.card.kind
    }

    pub fn title(&self) -> &str {
        &self.card.title
    }

    pub fn period(&self) -> u64 {
        self.card.period
    }

    pub fn answer(&self) -> f64 {
        self.card.answer
    }

    pub fn count(&self) -> u64 {
        self.card.count
    }

    pub fn is_restricted(&self) -> bool {
        self.card.restricted
    }

    pub fn is_silenced(&self) -> bool {
        self.card.silenced
    }

    /// 子串匹配：check_type("group") 对 supergroup 也为真
    pub fn check_type(&self, kind: &str) -> bool {
        self.card.kind.contains(kind)
    }

    pub fn exactly_type(&self, kind: &str) -> bool {
        self.card.kind == kind
    }

    pub fn set_title(&mut self, title: &str) {
        self.card.set_title(title);
    }

    /// 裁剪到 [min_period, max_period] 后写入；新周期低于当前倒计时则同步降低倒计时。
    /// 返回实际生效的周期，调用方可据此判断是否被裁剪。
    pub fn set_period(&mut self, period: u64) -> u64 {
        let applied = self.card.set_period(self.bounds.clamp(period));
        if applied < self.countdown {
            self.countdown = applied;
        }
        applied
    }

    pub fn set_answer_probability(&mut self, probability: f64) -> Result<f64, CardError> {
        self.card.set_answer(probability)
    }

    pub fn toggle_restricted(&mut self) {
        self.card.restricted = !self.card.restricted;
    }

    pub fn toggle_silenced(&mut self) {
        self.card.silenced = !self.card.silenced;
    }

    pub fn countdown(&self) -> u64 {
        self.countdown
    }

    pub fn set_countdown(&mut self, countdown: u64) {
        self.countdown = countdown;
    }

    pub fn reset_countdown(&mut self) {
        self.countdown = self.card.period;
    }

    /// 掷骰决定是否回复；概率恰为 0 / 1 时不掷
    pub fn roll_answer(&self) -> bool {
        let chance = self.card.answer;
        if chance >= 1.0 {
            return true;
        }
        if chance <= 0.0 {
            return false;
        }
        rand::thread_rng().gen::<f64>() <= chance
    }

    /// 随机取一条短期记忆的消息 ID，用于「回复某条最近消息」
    pub fn random_memory_id(&self) -> Option<&str> {
        self.short_term.random_id()
    }

    /// 读一条消息：媒体转标签文本后学习；无论是否被缓冲，计数都 +1
    pub fn read(&mut self, message_id: impl Into<String>, content: MessageContent) {
        self.learn(message_id, &content.into_text());
        self.card.count += 1;
    }

    /// 把文本放入短期记忆；短小的召唤消息（≤3 词且含 bot 名字）丢弃
    pub fn learn(&mut self, message_id: impl Into<String>, text: &str) {
        if self.is_summon(text) {
            tracing::debug!("Chat {}: skipping summon message", self.card.id);
            return;
        }
        self.short_term.push(Memory::new(message_id, text));
    }

    fn is_summon(&self, text: &str) -> bool {
        if text.split_whitespace().count() > SUMMON_MAX_WORDS {
            return false;
        }
        let folded = text.to_lowercase();
        self.names.iter().any(|name| folded.contains(name.as_str()))
    }

    /// 按顺序把短期记忆写入词库并清空；没有词库时保留短期记忆
    pub fn commit_memory(&mut self) {
        if self.short_term.is_empty() {
            return;
        }
        match self.vocabulary.as_mut() {
            Some(vocabulary) => {
                for memory in self.short_term.drain() {
                    vocabulary.add(&memory.content);
                }
            }
            None => tracing::warn!(
                "Chat {}: no vocabulary loaded, keeping {} memories uncommitted",
                self.card.id,
                self.short_term.len()
            ),
        }
    }

    /// 先 commit，再序列化卡片与词库
    pub fn archive(&mut self) -> Result<ArchivedChat, VocabularyError> {
        self.commit_memory();
        let vocabulary = match &self.vocabulary {
            Some(v) => Some(v.dump()?),
            None => None,
        };
        Ok(ArchivedChat {
            id: self.card.id.clone(),
            card: self.card.encode(),
            vocabulary,
        })
    }

    /// 用词库生成一条消息；静默时不 @ 人
    pub fn generate_message(&self, max_len: usize) -> Option<String> {
        self.vocabulary
            .as_ref()
            .map(|v| v.generate(max_len, self.is_silenced()))
    }
}

impl<V: VocabularyModel> std::fmt::Debug for ChatReader<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatReader")
            .field("card", &self.card)
            .field("has_vocabulary", &self.vocabulary.is_some())
            .field("short_term", &self.short_term.len())
            .field("countdown", &self.countdown)
            .finish()
    }
}
