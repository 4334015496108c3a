//! 存档与卡片错误类型
//!
//! 区分「文件不存在 / 编码无法解析 / 读写失败 / 卡片内容无效」，
//! 由调用方按场景选择快速失败（scan）或容错继续（update_all）。

use std::path::PathBuf;

use thiserror::Error;

/// 卡片（chat 元数据块）解析与校验错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CardError {
    #[error("Card is empty")]
    Empty,

    #[error("Card truncated: layout needs {expected} lines, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("Card field missing: {0}")]
    MissingField(&'static str),

    #[error("Card field {field} has invalid value {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("Answer probability out of range [0, 1]: {0}")]
    InvalidProbability(f64),
}

/// 词库（VocabularyModel）序列化错误
#[derive(Error, Debug)]
pub enum VocabularyError {
    #[error("Vocabulary dump is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// 存档层错误
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// 卡片或词库文件不存在
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// 文件存在但编码无法解析（如 UTF-16 字节数为奇数）
    #[error("Failed decoding {}: {reason}", path.display())]
    Decode { path: PathBuf, reason: String },

    /// 建目录、写文件、列目录等 I/O 失败
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid card for chat {id}: {source}")]
    Card {
        id: String,
        #[source]
        source: CardError,
    },

    #[error("Vocabulary error for chat {id}: {source}")]
    Vocabulary {
        id: String,
        #[source]
        source: VocabularyError,
    },
}

impl ArchiveError {
    /// 按 io::ErrorKind 归类：NotFound 单独成类，其余为 Io
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => ArchiveError::NotFound { path },
            std::io::ErrorKind::InvalidData => ArchiveError::Decode {
                path,
                reason: source.to_string(),
            },
            _ => ArchiveError::Io { path, source },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ArchiveError::NotFound { .. })
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, ArchiveError::Decode { .. })
    }
}
