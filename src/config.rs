//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `VELASCO__*` 覆盖（双下划线表示嵌套，如 `VELASCO__READER__MAX_PERIOD=500`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub archive: ArchiveSection,
    #[serde(default)]
    pub reader: ReaderSection,
}

/// [archive] 段：存档目录、词库扩展名、只读模式
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveSection {
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_extension")]
    pub extension: String,
    /// 只读时不写任何文件
    #[serde(default)]
    pub read_only: bool,
}

fn default_directory() -> PathBuf {
    PathBuf::from("./chatlogs")
}

fn default_extension() -> String {
    ".json".to_string()
}

impl Default for ArchiveSection {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            extension: default_extension(),
            read_only: false,
        }
    }
}

/// [reader] 段：周期区间、机器人名字、新 chat 的默认值
#[derive(Debug, Clone, Deserialize)]
pub struct ReaderSection {
    #[serde(default = "default_min_period")]
    pub min_period: u64,
    #[serde(default = "default_max_period")]
    pub max_period: u64,
    /// 召唤检测用的名字（大小写不敏感）
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default = "default_private_period")]
    pub private_period: u64,
    #[serde(default = "default_group_period")]
    pub group_period: u64,
    #[serde(default = "default_answer_probability")]
    pub answer_probability: f64,
}

fn default_min_period() -> u64 {
    1
}

fn default_max_period() -> u64 {
    100_000
}

fn default_private_period() -> u64 {
    2
}

fn default_group_period() -> u64 {
    10
}

fn default_answer_probability() -> f64 {
    0.5
}

impl Default for ReaderSection {
    fn default() -> Self {
        Self {
            min_period: default_min_period(),
            max_period: default_max_period(),
            names: Vec::new(),
            private_period: default_private_period(),
            group_period: default_group_period(),
            answer_probability: default_answer_probability(),
        }
    }
}

impl AppConfig {
    /// 加载后检查取值是否合理
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let reader = &self.reader;
        if reader.min_period == 0 {
            return Err(config::ConfigError::Message(
                "reader.min_period must be at least 1".to_string(),
            ));
        }
        if reader.min_period > reader.max_period {
            return Err(config::ConfigError::Message(format!(
                "reader.min_period ({}) is greater than reader.max_period ({})",
                reader.min_period, reader.max_period
            )));
        }
        if !(0.0..=1.0).contains(&reader.answer_probability) {
            return Err(config::ConfigError::Message(format!(
                "reader.answer_probability ({}) must be within [0, 1]",
                reader.answer_probability
            )));
        }
        Ok(())
    }
}

/// 从 config 目录加载配置，环境变量 VELASCO__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 VELASCO__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("VELASCO")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
