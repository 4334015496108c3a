//! Velasco - 按聊天隔离的状态引擎与存档层
//!
//! 模块划分：
//! - **archive**: 存档（目录布局、卡片与词库读写、批量扫描与更新）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **memory**: 卡片、多版本布局、短期记忆、词库模型、UTF-16 文件编码
//! - **observability**: 日志初始化
//! - **reader**: 单个 chat 的状态引擎（发言节奏、学习、生成）

pub mod archive;
pub mod config;
pub mod core;
pub mod memory;
pub mod observability;
pub mod reader;

pub use archive::{ArchiveSettings, Archivist, StoreOutcome};
pub use reader::{ChatReader, ReaderSettings};
