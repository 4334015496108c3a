//! 卡片历史格式识别与分派
//!
//! 历史上卡片经历过五种互不兼容的布局（从老到新）：
//!
//! | 布局 | 识别方式 | 卡片行 | 词库 |
//! |---|---|---|---|
//! | 无版本（最老） | 兜底 | 前 4 行按位置：id、类型、标题、周期 | 之后每行一条（列表编码） |
//! | `dict:` | 首行为 `dict:` | 前 6 行带标签 | 第 7 行起为词库 dump |
//! | v2 | 版本标签 `v2` | 前 7 行带标签 | 第 9 行起（第 8 行为分隔行） |
//! | v3 | 版本标签 `v3` | 前 8 行带标签 | 第 10 行起（第 9 行为分隔行） |
//! | v4 / v5 | 版本标签 `v4`/`v5` | 整块带标签 | 单独文件 |
//!
//! 版本标签取第 1 行的值；该值为空或只有一个字符时改看第 5 行。
//! 首行无法识别时按最老布局解析，不报错。

use crate::core::error::CardError;
use crate::memory::card::{self, card_value, CardDefaults, CardFields, ChatCard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardVersion {
    Unversioned,
    Dict,
    V2,
    V3,
    V4,
    V5,
}

impl CardVersion {
    /// 卡片与词库是否分文件存放
    pub fn is_current(&self) -> bool {
        matches!(self, CardVersion::V4 | CardVersion::V5)
    }
}

/// 卡片块之后附带的词库内容，交给对应的子加载器
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VocabularyPayload {
    /// 当前格式：词库在同目录的 record 文件中
    Sibling,
    /// v3 / v2 / dict:：剩余行原样拼接，交给 VocabularyModel::load
    Dump(String),
    /// 无版本格式：剩余行逐条交给 VocabularyModel::from_lines
    Lines(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCard {
    pub version: CardVersion,
    pub card: ChatCard,
    pub vocabulary: VocabularyPayload,
}

/// 带标签布局的行区间；None 表示到块尾 / 词库在别处
struct Layout {
    version: CardVersion,
    matches: fn(lines: &[&str], tag: &str) -> bool,
    record_lines: Option<usize>,
    vocabulary_from: Option<usize>,
}

const LAYOUTS: &[Layout] = &[
    Layout {
        version: CardVersion::V5,
        matches: is_v5,
        record_lines: None,
        vocabulary_from: None,
    },
    Layout {
        version: CardVersion::V4,
        matches: is_v4,
        record_lines: None,
        vocabulary_from: None,
    },
    Layout {
        version: CardVersion::V3,
        matches: is_v3,
        record_lines: Some(8),
        vocabulary_from: Some(9),
    },
    Layout {
        version: CardVersion::V2,
        matches: is_v2,
        record_lines: Some(7),
        vocabulary_from: Some(8),
    },
    Layout {
        version: CardVersion::Dict,
        matches: is_dict,
        record_lines: Some(6),
        vocabulary_from: Some(6),
    },
];

const DICT_MARKER: &str = "dict:";

fn is_v5(_: &[&str], tag: &str) -> bool {
    tag == "v5"
}

fn is_v4(_: &[&str], tag: &str) -> bool {
    tag == "v4"
}

fn is_v3(_: &[&str], tag: &str) -> bool {
    tag == "v3"
}

fn is_v2(_: &[&str], tag: &str) -> bool {
    tag == "v2"
}

fn is_dict(lines: &[&str], _: &str) -> bool {
    lines.first().map_or(false, |l| l.trim() == DICT_MARKER)
}

/// 无版本布局的位置字段数
const UNVERSIONED_RECORD_LINES: usize = 4;

pub fn decode(text: &str, defaults: &CardDefaults) -> Result<DecodedCard, CardError> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.iter().all(|l| l.trim().is_empty()) {
        return Err(CardError::Empty);
    }

    let tag = version_tag(&lines);
    match LAYOUTS.iter().find(|layout| (layout.matches)(&lines, tag)) {
        Some(layout) => decode_labeled(layout, &lines, defaults),
        None => {
            tracing::debug!("Card tag {:?} not recognised, reading as unversioned layout", tag);
            decode_unversioned(&lines, defaults)
        }
    }
}

fn version_tag<'a>(lines: &[&'a str]) -> &'a str {
    let first = card_value(lines[0]).trim();
    if first.chars().count() > 1 {
        return first;
    }
    lines
        .get(4)
        .map(|line| card_value(line).trim())
        .unwrap_or(first)
}

fn decode_labeled(
    layout: &Layout,
    lines: &[&str],
    defaults: &CardDefaults,
) -> Result<DecodedCard, CardError> {
    let record_end = layout.record_lines.unwrap_or(lines.len());
    if lines.len() < record_end {
        return Err(CardError::Truncated {
            expected: record_end,
            found: lines.len(),
        });
    }

    let mut fields = CardFields::default();
    for line in &lines[..record_end] {
        if line.trim().is_empty() || line.trim() == DICT_MARKER {
            continue;
        }
        match line.split_once(':') {
            Some((key, _)) => fields.apply(key, card_value(line))?,
            None => tracing::debug!("Skipping unlabeled card line {:?}", line),
        }
    }

    let vocabulary = match layout.vocabulary_from {
        None => VocabularyPayload::Sibling,
        Some(from) => VocabularyPayload::Dump(rest(lines, from).join("\n")),
    };

    Ok(DecodedCard {
        version: layout.version,
        card: fields.finish(defaults)?,
        vocabulary,
    })
}

fn decode_unversioned(lines: &[&str], defaults: &CardDefaults) -> Result<DecodedCard, CardError> {
    if lines.len() < UNVERSIONED_RECORD_LINES {
        return Err(CardError::Truncated {
            expected: UNVERSIONED_RECORD_LINES,
            found: lines.len(),
        });
    }

    let id = lines[0].trim();
    if id.is_empty() {
        return Err(CardError::MissingField(card::KEY_ID));
    }
    let kind = lines[1].trim();
    let period = card::parse_u64(card::KEY_PERIOD, lines[3])?;

    Ok(DecodedCard {
        version: CardVersion::Unversioned,
        card: ChatCard::new(id, kind, lines[2], period, defaults.answer),
        vocabulary: VocabularyPayload::Lines(
            rest(lines, UNVERSIONED_RECORD_LINES)
                .iter()
                .map(|l| l.to_string())
                .collect(),
        ),
    })
}

fn rest<'a, 'b>(lines: &'b [&'a str], from: usize) -> &'b [&'a str] {
    lines.get(from..).unwrap_or(&[])
}
