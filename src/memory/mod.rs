//! 记忆层：卡片（配置与计数）、短期记忆、词库（长期记忆）及其文件编码

pub mod card;
pub mod layout;
pub mod short_term;
pub mod vocabulary;
pub mod wide_text;

pub use card::{ChatCard, PeriodBounds};
pub use layout::{CardVersion, DecodedCard, VocabularyPayload};
pub use short_term::{Memory, ShortTermMemory};
pub use vocabulary::{MarkovVocabulary, VocabularyModel};
