//! 入站消息内容分类：文本直接学习，媒体转成「标签 + 文件引用」文本

pub const STICKER_TAG: &str = "^IS_STICKER^";
pub const ANIMATION_TAG: &str = "^IS_ANIMATION^";
pub const VIDEO_TAG: &str = "^IS_VIDEO^";

/// 一条入站消息的内容；媒体只携带稳定的文件引用
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    Sticker(String),
    Animation(String),
    Video(String),
}

impl MessageContent {
    /// 媒体对应的标签；文本返回 None
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            MessageContent::Text(_) => None,
            MessageContent::Sticker(_) => Some(STICKER_TAG),
            MessageContent::Animation(_) => Some(ANIMATION_TAG),
            MessageContent::Video(_) => Some(VIDEO_TAG),
        }
    }

    /// 转成交给词库的纯文本
    pub fn into_text(self) -> String {
        match self {
            MessageContent::Text(text) => text,
            MessageContent::Sticker(file) => format!("{} {}", STICKER_TAG, file),
            MessageContent::Animation(file) => format!("{} {}", ANIMATION_TAG, file),
            MessageContent::Video(file) => format!("{} {}", VIDEO_TAG, file),
        }
    }
}
