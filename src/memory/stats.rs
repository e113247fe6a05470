//! 统计与汇总

use crate::memory::record::{MemoryRecord, RecordBody};
use serde::Serialize;
use std::collections::BTreeMap;

/// 两个层级的条数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub hot: usize,
    pub archive: usize,
    pub total: usize,
}

/// 供 soul 档案生成使用的汇总，只统计热存储
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryAnalysis {
    pub total_memories: usize,
    pub conversations: usize,
    pub facts: usize,
    pub tasks: usize,
    /// 事实分类 → 条数，按分类名排序
    pub knowledge_areas: BTreeMap<String, usize>,
}

impl SummaryAnalysis {
    pub fn from_records(records: &[MemoryRecord]) -> Self {
        let mut analysis = Self {
            total_memories: records.len(),
            ..Self::default()
        };
        for record in records {
            match &record.body {
                RecordBody::Conversation { .. } => analysis.conversations += 1,
                RecordBody::Fact { category } => {
                    analysis.facts += 1;
                    *analysis
                        .knowledge_areas
                        .entry(category.clone())
                        .or_insert(0) += 1;
                }
                RecordBody::Task { .. } => analysis.tasks += 1,
            }
        }
        analysis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn test_tallies_by_kind_and_category() {
        let records = vec![
            MemoryRecord::fact(0, "a", None),
            MemoryRecord::fact(1, "b", Some("family")),
            MemoryRecord::fact(2, "c", Some("family")),
            MemoryRecord::conversation(3, "q", "a", Map::new()),
            MemoryRecord::task(4, "t", None, None),
        ];
        let analysis = SummaryAnalysis::from_records(&records);
        assert_eq!(analysis.total_memories, 5);
        assert_eq!(analysis.conversations, 1);
        assert_eq!(analysis.facts, 3);
        assert_eq!(analysis.tasks, 1);
        assert_eq!(analysis.knowledge_areas.get("general"), Some(&1));
        assert_eq!(analysis.knowledge_areas.get("family"), Some(&2));
    }

    #[test]
    fn test_empty() {
        assert_eq!(SummaryAnalysis::from_records(&[]), SummaryAnalysis::default());
    }
}
