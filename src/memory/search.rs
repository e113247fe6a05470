//! 关键词检索与上下文拼装
//!
//! 评分是词袋重叠：查询按空白切分后，每个词只要是记录合并文本的子串就记 1 分。
//! 重复的查询词分别计分，不做去重；也不要求整词匹配（`child` 能命中 `children`）。

use crate::memory::record::{MemoryRecord, RecordKind};

/// 对话回复在上下文块中保留的最大字符数
pub const CONTEXT_RESPONSE_CHARS: usize = 200;
/// 上下文块额外附带的最近事实条数
pub const CONTEXT_RECENT_FACTS: usize = 5;

// ── SearchOptions ────────────────────────────────────────────────────────────

/// 检索参数
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    /// 最多返回条数
    pub limit: usize,
    /// 只检索指定类型（`None` = 全部）
    pub kind: Option<RecordKind>,
    /// 是否同时检索归档
    pub include_archive: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 5,
            kind: None,
            include_archive: false,
        }
    }
}

impl SearchOptions {
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn kind(mut self, kind: Option<RecordKind>) -> Self {
        self.kind = kind;
        self
    }

    pub fn include_archive(mut self, include: bool) -> Self {
        self.include_archive = include;
        self
    }
}

// ── SearchHit ────────────────────────────────────────────────────────────────

/// 一条命中结果
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub record: MemoryRecord,
    /// 命中的查询词个数
    pub score: usize,
    /// 该记录来自归档
    pub from_archive: bool,
}

// ── 评分 ─────────────────────────────────────────────────────────────────────

/// 小写化后按空白切分，保留重复词
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(String::from)
        .collect()
}

/// `text`、`user_message`、`agent_response` 拼接后的小写文本
pub fn searchable_text(record: &MemoryRecord) -> String {
    format!(
        "{} {} {}",
        record.text,
        record.user_message().unwrap_or(""),
        record.agent_response().unwrap_or("")
    )
    .to_lowercase()
}

pub fn score(tokens: &[String], haystack: &str) -> usize {
    tokens
        .iter()
        .filter(|token| haystack.contains(token.as_str()))
        .count()
}

/// 在热存储（及可选的归档）上执行检索
///
/// 同分记录保持候选池顺序：热存储在前，归档在后，各自按插入顺序。
pub fn rank(
    hot: &[MemoryRecord],
    archive: &[MemoryRecord],
    query: &str,
    options: &SearchOptions,
) -> Vec<SearchHit> {
    let tokens = tokenize(query);
    if tokens.is_empty() || options.limit == 0 {
        return Vec::new();
    }

    let archive_pool: &[MemoryRecord] = if options.include_archive { archive } else { &[] };
    let pool = hot
        .iter()
        .map(|r| (r, false))
        .chain(archive_pool.iter().map(|r| (r, true)));

    let mut hits: Vec<SearchHit> = pool
        .filter(|(record, _)| options.kind.is_none_or(|kind| record.kind() == kind))
        .filter_map(|(record, from_archive)| {
            let score = score(&tokens, &searchable_text(record));
            (score > 0).then(|| SearchHit {
                record: record.clone(),
                score,
                from_archive,
            })
        })
        .collect();

    // sort_by 是稳定排序
    hits.sort_by(|a, b| b.score.cmp(&a.score));
    hits.truncate(options.limit);
    hits
}

// ── 上下文块 ─────────────────────────────────────────────────────────────────

/// 单条记录在上下文块中的呈现
pub fn format_context_entry(record: &MemoryRecord) -> String {
    match record.kind() {
        RecordKind::Fact => format!("[FACT]: {}", record.text),
        RecordKind::Conversation => {
            let response: String = record
                .agent_response()
                .unwrap_or("")
                .chars()
                .take(CONTEXT_RESPONSE_CHARS)
                .collect();
            format!(
                "[PAST CONVERSATION]\nUser: {}\nAgent: {}...",
                record.user_message().unwrap_or(""),
                response
            )
        }
        kind => format!("[{}]: {}", kind.as_str().to_uppercase(), record.text),
    }
}

/// 拼装上下文块：先检索命中，再补最近的事实，按 id 去重，最多 `max_results` 条
///
/// `facts` 需按插入顺序排列；没有任何条目时返回空串。
pub fn build_context(hits: &[SearchHit], facts: &[&MemoryRecord], max_results: usize) -> String {
    let mut seen = std::collections::HashSet::new();
    let recent_facts = &facts[facts.len().saturating_sub(CONTEXT_RECENT_FACTS)..];

    hits.iter()
        .map(|hit| &hit.record)
        .chain(recent_facts.iter().copied())
        .filter(|record| seen.insert(record.id))
        .take(max_results)
        .map(format_context_entry)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn conversation(id: u64, user: &str, agent: &str) -> MemoryRecord {
        MemoryRecord::conversation(id, user, agent, Map::new())
    }

    #[test]
    fn test_tokenize_keeps_duplicates() {
        assert_eq!(tokenize("  Rust rust\tASYNC "), vec!["rust", "rust", "async"]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_substring_scoring() {
        let tokens = tokenize("child tea");
        assert_eq!(score(&tokens, "alex has two children"), 1);
        assert_eq!(score(&tokens, "children drink tea"), 2);
        assert_eq!(score(&tokenize("tea tea"), "tea"), 2, "重复词应分别计分");
    }

    #[test]
    fn test_fact_ranks_before_unrelated_conversation() {
        let hot = vec![
            conversation(0, "what's the weather", "sunny today"),
            MemoryRecord::fact(1, "Alex has two children", Some("family")),
        ];
        let hits = rank(&hot, &[], "family children", &SearchOptions::default().limit(3));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.id, 1);
        assert!(hits[0].score >= 1);
    }

    #[test]
    fn test_scores_descending_and_zero_excluded() {
        let hot = vec![
            conversation(0, "rust", "ownership"),
            conversation(1, "rust ownership borrowing", "yes"),
            MemoryRecord::fact(2, "python is dynamic", None),
            MemoryRecord::task(3, "learn borrowing", None, None),
        ];
        let hits = rank(&hot, &[], "rust ownership borrowing", &SearchOptions::default());
        let ids: Vec<u64> = hits.iter().map(|h| h.record.id).collect();
        assert_eq!(ids, vec![1, 0, 3]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_ties_keep_pool_order() {
        let hot = vec![
            MemoryRecord::fact(0, "apple", None),
            MemoryRecord::fact(1, "apple pie", None),
            MemoryRecord::fact(2, "apple tart", None),
        ];
        let hits = rank(&hot, &[], "apple", &SearchOptions::default());
        let ids: Vec<u64> = hits.iter().map(|h| h.record.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn test_kind_filter_and_archive_flag() {
        let hot = vec![MemoryRecord::fact(5, "deploy notes", None)];
        let archive = vec![
            conversation(1, "how do I deploy", "use the script"),
            MemoryRecord::task(2, "deploy v2", None, None),
        ];

        let hot_only = rank(&hot, &archive, "deploy", &SearchOptions::default());
        assert_eq!(hot_only.len(), 1);
        assert!(!hot_only[0].from_archive);

        let all = rank(&hot, &archive, "deploy", &SearchOptions::default().include_archive(true));
        assert_eq!(all.len(), 3);
        assert_eq!(all.iter().filter(|h| h.from_archive).count(), 2);

        let tasks = rank(
            &hot,
            &archive,
            "deploy",
            &SearchOptions::default()
                .include_archive(true)
                .kind(Some(RecordKind::Task)),
        );
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].record.id, 2);
    }

    #[test]
    fn test_limit_applies_after_sort() {
        let hot: Vec<MemoryRecord> = (0..10)
            .map(|i| MemoryRecord::fact(i, &format!("note {i}"), None))
            .collect();
        let hits = rank(&hot, &[], "note", &SearchOptions::default().limit(3));
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_context_entry_formats() {
        let long_reply = "x".repeat(300);
        let convo = conversation(0, "tell me a story", &long_reply);
        let entry = format_context_entry(&convo);
        assert_eq!(
            entry,
            format!("[PAST CONVERSATION]\nUser: tell me a story\nAgent: {}...", "x".repeat(200))
        );

        let fact = MemoryRecord::fact(1, "likes tea", None);
        assert_eq!(format_context_entry(&fact), "[FACT]: likes tea");

        let task = MemoryRecord::task(2, "ship", None, None);
        assert_eq!(format_context_entry(&task), "[TASK]: Task: ship\nStatus: completed");
    }

    #[test]
    fn test_context_truncates_by_chars() {
        let reply = "记".repeat(250);
        let entry = format_context_entry(&conversation(0, "q", &reply));
        assert!(entry.ends_with(&format!("{}...", "记".repeat(200))));
    }

    #[test]
    fn test_build_context_dedups_and_caps() {
        let facts: Vec<MemoryRecord> = (0..7)
            .map(|i| MemoryRecord::fact(i, &format!("fact {i}"), None))
            .collect();
        let fact_refs: Vec<&MemoryRecord> = facts.iter().collect();
        let hits = vec![SearchHit {
            record: facts[6].clone(),
            score: 1,
            from_archive: false,
        }];

        let block = build_context(&hits, &fact_refs, 8);
        let entries: Vec<&str> = block.split("\n\n").collect();
        // 命中 fact 6 在前，随后是最近 5 条中尚未出现的 fact 2..=5
        assert_eq!(
            entries,
            vec!["[FACT]: fact 6", "[FACT]: fact 2", "[FACT]: fact 3", "[FACT]: fact 4", "[FACT]: fact 5"]
        );

        let capped = build_context(&hits, &fact_refs, 2);
        assert_eq!(capped, "[FACT]: fact 6\n\n[FACT]: fact 2");
    }

    #[test]
    fn test_build_context_empty() {
        assert_eq!(build_context(&[], &[], 8), "");
    }
}
