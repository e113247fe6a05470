//! 热存储 → 归档的压缩策略
//!
//! 事实永不迁移；对话与任务各自保留最近 N 条，其余按原顺序迁入归档。
//! 这里只做纯计算，落盘由 [`MemoryStore::compact`] 负责。
//!
//! [`MemoryStore::compact`]: crate::memory::MemoryStore::compact

use crate::config::MemoryConfig;
use crate::memory::record::{MemoryRecord, RecordKind};
use serde::Serialize;

/// 一次压缩的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompactionReport {
    /// 本次迁入归档的条数
    pub moved: usize,
    /// 压缩后热存储条数
    pub hot: usize,
    /// 压缩后归档条数
    pub archive: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionPolicy {
    pub threshold: usize,
    pub keep_conversations: usize,
    pub keep_tasks: usize,
}

impl From<&MemoryConfig> for CompactionPolicy {
    fn from(config: &MemoryConfig) -> Self {
        Self {
            threshold: config.compaction_threshold,
            keep_conversations: config.compaction_keep_hot,
            keep_tasks: config.compaction_keep_tasks,
        }
    }
}

impl CompactionPolicy {
    pub fn should_compact(&self, hot_len: usize) -> bool {
        hot_len > self.threshold
    }

    /// 将热存储拆成 `(保留, 迁出)`，两部分都保持原有相对顺序；没有可迁出的记录时返回 `None`
    ///
    /// 热存储按插入顺序即时间顺序排列，所以每类最早的若干条就是要迁出的部分。
    pub fn partition(
        &self,
        hot: &[MemoryRecord],
    ) -> Option<(Vec<MemoryRecord>, Vec<MemoryRecord>)> {
        let count = |kind| hot.iter().filter(|r| r.kind() == kind).count();
        let mut conversations_to_move =
            count(RecordKind::Conversation).saturating_sub(self.keep_conversations);
        let mut tasks_to_move = count(RecordKind::Task).saturating_sub(self.keep_tasks);
        if conversations_to_move == 0 && tasks_to_move == 0 {
            return None;
        }

        let mut kept = Vec::with_capacity(hot.len());
        let mut moved = Vec::with_capacity(conversations_to_move + tasks_to_move);
        for record in hot {
            let budget = match record.kind() {
                RecordKind::Fact => None,
                RecordKind::Conversation => Some(&mut conversations_to_move),
                RecordKind::Task => Some(&mut tasks_to_move),
            };
            match budget {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    moved.push(record.clone());
                }
                _ => kept.push(record.clone()),
            }
        }
        Some((kept, moved))
    }
}
