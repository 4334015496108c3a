//! 短期记忆：最近读到、尚未写入词库的消息
//!
//! 按到达顺序保存，commit 时整体交给词库并清空；进程退出前未 commit 的内容会丢失。

use rand::seq::SliceRandom;

/// 单条短期记忆
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Memory {
    pub id: String,
    /// 纯文本；贴纸等媒体已转成「标签 + 文件引用」
    pub content: String,
}

impl Memory {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ShortTermMemory {
    memories: Vec<Memory>,
}

impl ShortTermMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, memory: Memory) {
        self.memories.push(memory);
    }

    pub fn memories(&self) -> &[Memory] {
        &self.memories
    }

    /// 按插入顺序取出全部记忆并清空
    pub fn drain(&mut self) -> std::vec::Drain<'_, Memory> {
        self.memories.drain(..)
    }

    /// 均匀随机选一条记忆的消息 ID
    pub fn random_id(&self) -> Option<&str> {
        self.memories
            .choose(&mut rand::thread_rng())
            .map(|m| m.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }
}
