//! 单个层级文件（热存储或归档）的读写
//!
//! 文件内容是 [`MemoryRecord`] 的 JSON 数组，每次写入都整体覆盖。
//! 写入先落到同目录的临时文件再 rename，避免进程中途退出留下半截文件。

use crate::error::{MemoryError, Result};
use crate::memory::record::MemoryRecord;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct TierFile {
    path: PathBuf,
    /// 日志中显示的层级名（`hot` / `archive`）
    label: &'static str,
}

impl TierFile {
    pub fn new(path: impl Into<PathBuf>, label: &'static str) -> Self {
        Self {
            path: path.into(),
            label,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取全部记录；文件缺失、不可读或解析失败时返回空集合
    ///
    /// 无法解码的文件（非法 UTF-8、JSON 结构错误）会先复制为 `<name>.corrupt`，
    /// 下一次写入才会覆盖原文件。
    pub fn load(&self) -> Vec<MemoryRecord> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(tier = self.label, path = %self.path.display(), "⚠️ 层级文件读取失败，按空集合处理: {e}");
                return Vec::new();
            }
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Vec::new();
        }
        match serde_json::from_slice::<Vec<MemoryRecord>>(&raw) {
            Ok(records) => records,
            Err(e) => {
                warn!(tier = self.label, path = %self.path.display(), "⚠️ 层级文件解析失败，按空集合处理: {e}");
                self.keep_corrupt_copy();
                Vec::new()
            }
        }
    }

    /// 整体覆盖写入
    pub fn save(&self, records: &[MemoryRecord]) -> Result<()> {
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| MemoryError::SerializationError(e.to_string()))?;
        let tmp = self.tmp_path();
        std::fs::write(&tmp, json).map_err(|e| self.write_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.write_error(e))?;
        debug!(tier = self.label, path = %self.path.display(), records = records.len(), "💾 层级文件已持久化");
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn keep_corrupt_copy(&self) {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".corrupt");
        let backup = self.path.with_file_name(name);
        if let Err(e) = std::fs::copy(&self.path, &backup) {
            warn!(tier = self.label, backup = %backup.display(), "损坏文件备份失败: {e}");
        }
    }

    fn write_error(&self, e: std::io::Error) -> MemoryError {
        MemoryError::StorageWrite {
            path: self.path.display().to_string(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SoulError;
    use serde_json::Map;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let tier = TierFile::new(dir.path().join("memories.json"), "hot");
        assert!(tier.load().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_empty_and_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memories.json");
        std::fs::write(&path, "[{\"id\": 0, \"type\": ").unwrap();

        let tier = TierFile::new(&path, "hot");
        assert!(tier.load().is_empty(), "损坏文件应按空集合处理");
        assert!(dir.path().join("memories.json.corrupt").exists());
    }

    #[test]
    fn test_invalid_utf8_is_backed_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memories.json");
        let bytes = b"[{\"text\": \"\xff\xfe\"}]";
        std::fs::write(&path, bytes).unwrap();

        let tier = TierFile::new(&path, "hot");
        assert!(tier.load().is_empty());
        let backup = dir.path().join("memories.json.corrupt");
        assert_eq!(std::fs::read(backup).unwrap(), bytes, "备份应与原文件逐字节一致");
    }

    #[test]
    fn test_whitespace_file_is_empty_without_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memories.json");
        std::fs::write(&path, " \n\t").unwrap();

        assert!(TierFile::new(&path, "hot").load().is_empty());
        assert!(!dir.path().join("memories.json.corrupt").exists());
    }

    #[test]
    fn test_save_then_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let tier = TierFile::new(dir.path().join("memories_archive.json"), "archive");
        let records = vec![
            MemoryRecord::conversation(0, "q", "a", Map::new()),
            MemoryRecord::fact(1, "f", Some("misc")),
            MemoryRecord::task(2, "t", None, None),
        ];
        tier.save(&records).unwrap();
        assert_eq!(tier.load(), records);
        assert!(!dir.path().join("memories_archive.json.tmp").exists());
    }

    #[test]
    fn test_write_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let tier = TierFile::new(dir.path().join("missing-dir").join("memories.json"), "hot");
        let err = tier.save(&[]).unwrap_err();
        assert!(matches!(err, SoulError::Memory(MemoryError::StorageWrite { .. })));
    }
}
