//! 词库：聊天的「长期记忆」
//!
//! ChatReader 只通过 [`VocabularyModel`] 的 add / generate / dump / load 使用词库，
//! 不假设内部表示，只要求 dump 与 load 可以互相还原。
//! 默认实现 [`MarkovVocabulary`]：每三个连续词为一组，记录每对相邻词之后可能出现的词。

use std::collections::BTreeMap;

use rand::seq::SliceRandom;

use crate::core::error::VocabularyError;

/// 词库 trait：写入、生成、序列化
pub trait VocabularyModel: Default + Send {
    /// 学习一段文本
    fn add(&mut self, text: &str);

    /// 生成最多 max_len 个词的文本；silent 为 true 时不 @ 任何人
    fn generate(&self, max_len: usize, silent: bool) -> String;

    fn dump(&self) -> Result<String, VocabularyError>;

    fn load(blob: &str) -> Result<Self, VocabularyError>
    where
        Self: Sized;

    /// 最老卡片格式的列表编码：每行一条历史消息，按顺序重新学习
    fn from_lines<S: AsRef<str>>(lines: &[S]) -> Self
    where
        Self: Sized,
    {
        let mut model = Self::default();
        for line in lines {
            let line = line.as_ref();
            if !line.trim().is_empty() {
                model.add(line);
            }
        }
        model
    }
}

/// 句首哨兵
pub const START: &str = "^START^";
/// 句尾哨兵
pub const END: &str = "^END^";

/// 马尔可夫链词库，dump 为 JSON 字典 `"w1 w2" -> [后继词...]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkovVocabulary {
    chain: BTreeMap<String, Vec<String>>,
}

impl MarkovVocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// 已记录的词对数量
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    fn key(first: &str, second: &str) -> String {
        format!("{} {}", first, second)
    }
}

impl VocabularyModel for MarkovVocabulary {
    fn add(&mut self, text: &str) {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return;
        }

        let mut padded = Vec::with_capacity(words.len() + 3);
        padded.push(START);
        padded.push(START);
        padded.extend(words);
        padded.push(END);

        for triple in padded.windows(3) {
            self.chain
                .entry(Self::key(triple[0], triple[1]))
                .or_default()
                .push(triple[2].to_string());
        }
    }

    fn generate(&self, max_len: usize, silent: bool) -> String {
        let mut rng = rand::thread_rng();
        let mut words: Vec<String> = Vec::new();
        let (mut first, mut second) = (START.to_string(), START.to_string());

        while words.len() < max_len {
            let next = match self
                .chain
                .get(&Self::key(&first, &second))
                .and_then(|followers| followers.choose(&mut rng))
            {
                Some(word) if word != END => word.clone(),
                _ => break,
            };
            words.push(if silent {
                next.trim_start_matches('@').to_string()
            } else {
                next.clone()
            });
            first = std::mem::replace(&mut second, next);
        }

        words.join(" ")
    }

    fn dump(&self) -> Result<String, VocabularyError> {
        Ok(serde_json::to_string(&self.chain)?)
    }

    fn load(blob: &str) -> Result<Self, VocabularyError> {
        let chain = serde_json::from_str(blob)?;
        Ok(Self { chain })
    }
}
