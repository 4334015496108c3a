//! 聊天卡片：每个 chat 的可持久化配置与计数
//!
//! 当前格式（v5）为固定顺序的 `KEY: value` 行，既可机读也方便手工编辑；
//! 历史格式的识别与解析见 [`crate::memory::layout`]。

use crate::core::error::CardError;
use crate::memory::layout::{self, DecodedCard};

/// 当前写出的卡片版本
pub const CURRENT_VERSION: &str = "v5";

/// 私聊默认发言周期（每收到 2 条发一条）
pub const DEFAULT_PRIVATE_PERIOD: u64 = 2;
/// 群组 / 频道默认发言周期
pub const DEFAULT_GROUP_PERIOD: u64 = 10;
/// 默认回复概率
pub const DEFAULT_ANSWER: f64 = 0.5;

pub(crate) const KEY_VERSION: &str = "VERSION";
pub(crate) const KEY_ID: &str = "CHAT_ID";
pub(crate) const KEY_KIND: &str = "CHAT_TYPE";
pub(crate) const KEY_TITLE: &str = "CHAT_NAME";
pub(crate) const KEY_PERIOD: &str = "MESSAGE_PERIOD";
pub(crate) const KEY_ANSWER: &str = "ANSWER_PROBABILITY";
pub(crate) const KEY_RESTRICTED: &str = "RESTRICTED";
pub(crate) const KEY_SILENCED: &str = "SILENCED";
pub(crate) const KEY_COUNT: &str = "MESSAGE_COUNT";

// v2 / v3 / dict: 时代的旧标签
pub(crate) const LEGACY_KEY_COUNT: &str = "WORD_COUNT";
pub(crate) const LEGACY_KEY_PERIOD: &str = "MESSAGE_FREQ";
pub(crate) const LEGACY_KEY_ANSWER: &str = "ANSWER_FREQ";

/// 发言周期的允许区间 [min, max]，由部署配置给出
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodBounds {
    min: u64,
    max: u64,
}

impl PeriodBounds {
    /// 调用方保证 max >= min（配置加载时已校验）
    pub fn new(min: u64, max: u64) -> Self {
        debug_assert!(max >= min, "max_period must be >= min_period");
        Self { min, max }
    }

    pub fn min(&self) -> u64 {
        self.min
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn clamp(&self, period: u64) -> u64 {
        period.max(self.min).min(self.max)
    }

    pub fn contains(&self, period: u64) -> bool {
        (self.min..=self.max).contains(&period)
    }
}

impl Default for PeriodBounds {
    fn default() -> Self {
        Self::new(1, 100_000)
    }
}

/// 卡片缺字段时补的默认值；部署时由 ReaderSettings 给出
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardDefaults {
    pub private_period: u64,
    pub group_period: u64,
    pub answer: f64,
}

impl CardDefaults {
    /// 按 chat 类型给出默认周期
    pub fn period_for(&self, kind: &str) -> u64 {
        if kind == "private" {
            self.private_period
        } else {
            self.group_period
        }
    }
}

impl Default for CardDefaults {
    fn default() -> Self {
        Self {
            private_period: DEFAULT_PRIVATE_PERIOD,
            group_period: DEFAULT_GROUP_PERIOD,
            answer: DEFAULT_ANSWER,
        }
    }
}

/// 单个 chat 的卡片
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCard {
    pub id: String,
    /// private / group / supergroup / channel，自由文本
    pub kind: String,
    pub title: String,
    pub period: u64,
    /// 被回复时作答的概率，[0, 1]
    pub answer: f64,
    pub restricted: bool,
    pub silenced: bool,
    /// 已读消息数，只增不减
    pub count: u64,
}

impl ChatCard {
    pub fn new(
        id: impl Into<String>,
        kind: impl Into<String>,
        title: impl Into<String>,
        period: u64,
        answer: f64,
    ) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            title: single_line(&title.into()),
            period,
            answer,
            restricted: false,
            silenced: false,
            count: 0,
        }
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = single_line(title);
    }

    /// 只负责写入；区间裁剪由持有 PeriodBounds 的 ChatReader 完成
    pub fn set_period(&mut self, period: u64) -> u64 {
        self.period = period;
        self.period
    }

    /// 超出 [0, 1] 或 NaN 直接拒绝，卡片保持不变
    pub fn set_answer(&mut self, probability: f64) -> Result<f64, CardError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(CardError::InvalidProbability(probability));
        }
        self.answer = probability;
        Ok(self.answer)
    }

    /// 写出当前格式（v5）
    pub fn encode(&self) -> String {
        let lines = [
            format!("{}: {}", KEY_VERSION, CURRENT_VERSION),
            format!("{}: {}", KEY_ID, single_line(&self.id)),
            format!("{}: {}", KEY_KIND, single_line(&self.kind)),
            format!("{}: {}", KEY_TITLE, single_line(&self.title)),
            format!("{}: {}", KEY_PERIOD, self.period),
            format!("{}: {}", KEY_ANSWER, self.answer),
            format!("{}: {}", KEY_RESTRICTED, format_bool(self.restricted)),
            format!("{}: {}", KEY_SILENCED, format_bool(self.silenced)),
            format!("{}: {}", KEY_COUNT, self.count),
        ];
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    /// 识别版本并解析；无法识别的首行按最老的无版本格式处理
    pub fn decode(text: &str) -> Result<DecodedCard, CardError> {
        Self::decode_with(text, &CardDefaults::default())
    }

    /// 同 decode，缺失的周期与回复概率取 defaults
    pub fn decode_with(text: &str, defaults: &CardDefaults) -> Result<DecodedCard, CardError> {
        layout::decode(text, defaults)
    }
}

/// 取一行 `KEY: value` 的值部分；没有冒号时返回整行
pub(crate) fn card_value(line: &str) -> &str {
    match line.split_once(':') {
        Some((_, value)) => value.strip_prefix(' ').unwrap_or(value),
        None => line,
    }
}

fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

pub(crate) fn parse_bool(field: &'static str, value: &str) -> Result<bool, CardError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(CardError::InvalidField {
            field,
            value: value.to_string(),
        }),
    }
}

pub(crate) fn parse_u64(field: &'static str, value: &str) -> Result<u64, CardError> {
    value.trim().parse().map_err(|_| CardError::InvalidField {
        field,
        value: value.to_string(),
    })
}

pub(crate) fn parse_f64(field: &'static str, value: &str) -> Result<f64, CardError> {
    value.trim().parse().map_err(|_| CardError::InvalidField {
        field,
        value: value.to_string(),
    })
}

/// 按标签逐行收集字段，缺省项在 finish 时补默认值
#[derive(Debug, Default)]
pub(crate) struct CardFields {
    id: Option<String>,
    kind: Option<String>,
    title: Option<String>,
    period: Option<u64>,
    answer: Option<f64>,
    restricted: Option<bool>,
    silenced: Option<bool>,
    count: Option<u64>,
}

impl CardFields {
    pub(crate) fn apply(&mut self, key: &str, value: &str) -> Result<(), CardError> {
        match key.trim() {
            KEY_ID => self.id = Some(value.trim().to_string()),
            KEY_KIND => self.kind = Some(value.trim().to_string()),
            KEY_TITLE => self.title = Some(value.to_string()),
            KEY_PERIOD | LEGACY_KEY_PERIOD => self.period = Some(parse_u64(KEY_PERIOD, value)?),
            KEY_ANSWER | LEGACY_KEY_ANSWER => self.answer = Some(parse_f64(KEY_ANSWER, value)?),
            KEY_RESTRICTED => self.restricted = Some(parse_bool(KEY_RESTRICTED, value)?),
            KEY_SILENCED => self.silenced = Some(parse_bool(KEY_SILENCED, value)?),
            KEY_COUNT | LEGACY_KEY_COUNT => self.count = Some(parse_u64(KEY_COUNT, value)?),
            KEY_VERSION => {}
            other => tracing::debug!("Ignoring unknown card label {:?}", other),
        }
        Ok(())
    }

    pub(crate) fn finish(self, defaults: &CardDefaults) -> Result<ChatCard, CardError> {
        let id = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or(CardError::MissingField(KEY_ID))?;
        let kind = self.kind.unwrap_or_default();
        let answer = self.answer.unwrap_or(defaults.answer);
        if !(0.0..=1.0).contains(&answer) {
            return Err(CardError::InvalidProbability(answer));
        }
        Ok(ChatCard {
            period: self.period.unwrap_or_else(|| defaults.period_for(&kind)),
            id,
            kind,
            title: self.title.unwrap_or_default(),
            answer,
            restricted: self.restricted.unwrap_or(false),
            silenced: self.silenced.unwrap_or(false),
            count: self.count.unwrap_or(0),
        })
    }
}
