//! 记忆层配置
//!
//! [`MemoryConfig`] 以显式对象的形式传入 [`MemoryStore::open`]，不读取任何全局状态，
//! 因此同一进程内可以并存多个配置不同的 Store（测试中尤其常用）。
//!
//! 三种构造方式：
//!
//! | 方式 | 入口 |
//! |------|------|
//! | 默认值 + 链式设置 | [`MemoryConfig::default`] / [`MemoryConfig::new`] |
//! | 环境变量（含 `.env`） | [`MemoryConfig::from_env`] |
//! | YAML 文件 | [`MemoryConfig::load`] |
//!
//! 环境变量格式：
//! ```text
//! SOUL_MEMORY_DIR=~/.soul-agent/memory_store
//! SOUL_COMPACTION_THRESHOLD=1000
//! SOUL_COMPACTION_KEEP_HOT=800
//! SOUL_COMPACTION_KEEP_TASKS=100
//! SOUL_AUTO_COMPACT=true
//! SOUL_UPDATE_FREQUENCY=5
//! ```
//!
//! [`MemoryStore::open`]: crate::memory::MemoryStore::open

use crate::error::{ConfigError, Result};
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ENV_MEMORY_DIR: &str = "SOUL_MEMORY_DIR";
pub const ENV_COMPACTION_THRESHOLD: &str = "SOUL_COMPACTION_THRESHOLD";
pub const ENV_COMPACTION_KEEP_HOT: &str = "SOUL_COMPACTION_KEEP_HOT";
pub const ENV_COMPACTION_KEEP_TASKS: &str = "SOUL_COMPACTION_KEEP_TASKS";
pub const ENV_AUTO_COMPACT: &str = "SOUL_AUTO_COMPACT";
pub const ENV_SOUL_UPDATE_FREQUENCY: &str = "SOUL_UPDATE_FREQUENCY";

/// 热存储文件名
pub const HOT_FILE_NAME: &str = "memories.json";
/// 归档文件名
pub const ARCHIVE_FILE_NAME: &str = "memories_archive.json";

/// 记忆 Store 的运行时配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// 两个层级文件所在目录，首次使用时自动创建（支持 `~/` 前缀）
    pub memory_dir: PathBuf,
    /// 热存储条数超过该值时触发自动压缩
    pub compaction_threshold: usize,
    /// 压缩后热存储保留的最近对话条数
    pub compaction_keep_hot: usize,
    /// 压缩后热存储保留的最近任务条数
    pub compaction_keep_tasks: usize,
    /// 写入后是否自动检查压缩
    pub auto_compact_enabled: bool,
    /// 每累计 N 次对话提示外部刷新 soul 档案
    pub soul_update_frequency: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            memory_dir: PathBuf::from("memory_store"),
            compaction_threshold: 1000,
            compaction_keep_hot: 800,
            compaction_keep_tasks: 100,
            auto_compact_enabled: true,
            soul_update_frequency: 5,
        }
    }
}

impl MemoryConfig {
    pub fn new(memory_dir: impl Into<PathBuf>) -> Self {
        Self {
            memory_dir: memory_dir.into(),
            ..Self::default()
        }
    }

    pub fn memory_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.memory_dir = dir.into();
        self
    }

    pub fn compaction_threshold(mut self, threshold: usize) -> Self {
        self.compaction_threshold = threshold;
        self
    }

    pub fn compaction_keep_hot(mut self, keep: usize) -> Self {
        self.compaction_keep_hot = keep;
        self
    }

    pub fn compaction_keep_tasks(mut self, keep: usize) -> Self {
        self.compaction_keep_tasks = keep;
        self
    }

    pub fn auto_compact(mut self, enabled: bool) -> Self {
        self.auto_compact_enabled = enabled;
        self
    }

    pub fn soul_update_frequency(mut self, every: u64) -> Self {
        self.soul_update_frequency = every;
        self
    }

    /// 读取 `.env` 与进程环境变量，未设置的项保留默认值
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// 以任意键值来源构造配置，`from_env` 的底层实现
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = lookup(ENV_MEMORY_DIR).filter(|d| !d.trim().is_empty()) {
            config.memory_dir = PathBuf::from(dir.trim());
        }
        if let Some(v) = parse_var(&lookup, ENV_COMPACTION_THRESHOLD)? {
            config.compaction_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_COMPACTION_KEEP_HOT)? {
            config.compaction_keep_hot = v;
        }
        if let Some(v) = parse_var(&lookup, ENV_COMPACTION_KEEP_TASKS)? {
            config.compaction_keep_tasks = v;
        }
        if let Some(raw) = lookup(ENV_AUTO_COMPACT) {
            config.auto_compact_enabled = parse_flag(ENV_AUTO_COMPACT, &raw)?;
        }
        if let Some(v) = parse_var(&lookup, ENV_SOUL_UPDATE_FREQUENCY)? {
            config.soul_update_frequency = v;
        }
        config.validate()?;
        Ok(config)
    }

    /// 从 YAML 文件加载，缺省字段取默认值
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        let config: MemoryConfig = serde_yaml::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// 拒绝会让压缩行为失去意义的取值
    pub fn validate(&self) -> Result<()> {
        if self.compaction_threshold == 0 {
            return Err(invalid("compaction_threshold", "must be greater than 0"));
        }
        if self.compaction_keep_hot > self.compaction_threshold {
            return Err(invalid(
                "compaction_keep_hot",
                &format!(
                    "{} exceeds compaction_threshold {}",
                    self.compaction_keep_hot, self.compaction_threshold
                ),
            ));
        }
        if self.compaction_keep_tasks > self.compaction_threshold {
            return Err(invalid(
                "compaction_keep_tasks",
                &format!(
                    "{} exceeds compaction_threshold {}",
                    self.compaction_keep_tasks, self.compaction_threshold
                ),
            ));
        }
        if self.soul_update_frequency == 0 {
            return Err(invalid("soul_update_frequency", "must be greater than 0"));
        }
        Ok(())
    }

    /// 展开 `~/` 后的实际目录
    pub fn resolved_dir(&self) -> PathBuf {
        expand_tilde(&self.memory_dir)
    }

    pub fn hot_file(&self) -> PathBuf {
        self.resolved_dir().join(HOT_FILE_NAME)
    }

    pub fn archive_file(&self) -> PathBuf {
        self.resolved_dir().join(ARCHIVE_FILE_NAME)
    }
}

// ── 私有工具函数 ──────────────────────────────────────────────────────────────

fn invalid(field: &str, message: &str) -> crate::error::SoulError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
    .into()
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|e| invalid(key, &format!("{raw:?}: {e}")))
}

fn parse_flag(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(invalid(key, &format!("{other:?} is not a boolean"))),
    }
}

fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if s.starts_with("~/")
        && let Some(home) = std::env::var("HOME")
            .ok()
            .or_else(|| std::env::var("USERPROFILE").ok())
    {
        return PathBuf::from(home).join(&s[2..]);
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SoulError;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MemoryConfig::default();
        assert_eq!(config.compaction_threshold, 1000);
        assert_eq!(config.compaction_keep_hot, 800);
        assert_eq!(config.compaction_keep_tasks, 100);
        assert!(config.auto_compact_enabled);
        assert_eq!(config.soul_update_frequency, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_vars_overrides() {
        let config = MemoryConfig::from_vars(vars(&[
            (ENV_MEMORY_DIR, "/tmp/soul"),
            (ENV_COMPACTION_THRESHOLD, "5"),
            (ENV_COMPACTION_KEEP_HOT, "3"),
            (ENV_COMPACTION_KEEP_TASKS, "2"),
            (ENV_AUTO_COMPACT, "off"),
        ]))
        .unwrap();
        assert_eq!(config.memory_dir, PathBuf::from("/tmp/soul"));
        assert_eq!(config.compaction_threshold, 5);
        assert_eq!(config.compaction_keep_hot, 3);
        assert_eq!(config.compaction_keep_tasks, 2);
        assert!(!config.auto_compact_enabled);
        assert_eq!(config.soul_update_frequency, 5, "未设置的项应保留默认值");
    }

    #[test]
    fn test_from_vars_rejects_garbage() {
        let err = MemoryConfig::from_vars(vars(&[(ENV_COMPACTION_THRESHOLD, "-3")])).unwrap_err();
        assert!(matches!(
            err,
            SoulError::Config(ConfigError::InvalidValue { ref field, .. }) if field == ENV_COMPACTION_THRESHOLD
        ));

        let err = MemoryConfig::from_vars(vars(&[(ENV_AUTO_COMPACT, "maybe")])).unwrap_err();
        assert!(matches!(err, SoulError::Config(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_validate_keep_exceeds_threshold() {
        let config = MemoryConfig::default()
            .compaction_threshold(10)
            .compaction_keep_hot(11);
        assert!(config.validate().is_err());

        let config = MemoryConfig::default()
            .compaction_threshold(10)
            .compaction_keep_hot(5)
            .compaction_keep_tasks(20);
        assert!(config.validate().is_err());

        assert!(MemoryConfig::default().compaction_threshold(0).validate().is_err());
        assert!(MemoryConfig::default().soul_update_frequency(0).validate().is_err());
    }

    #[test]
    fn test_load_yaml_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.yaml");
        std::fs::write(
            &path,
            "memory_dir: /var/lib/soul\ncompaction_threshold: 500\ncompaction_keep_hot: 400\n",
        )
        .unwrap();

        let config = MemoryConfig::load(&path).unwrap();
        assert_eq!(config.memory_dir, PathBuf::from("/var/lib/soul"));
        assert_eq!(config.compaction_threshold, 500);
        assert_eq!(config.compaction_keep_hot, 400);
        assert_eq!(config.compaction_keep_tasks, 100);
        assert_eq!(config.hot_file(), PathBuf::from("/var/lib/soul/memories.json"));
        assert_eq!(
            config.archive_file(),
            PathBuf::from("/var/lib/soul/memories_archive.json")
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = MemoryConfig::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, SoulError::Config(ConfigError::FileNotFound(_))));
    }
}
