//! 记忆记录数据模型
//!
//! [`MemoryRecord`] 由公共字段和 [`RecordBody`] 变体组成，落盘格式：
//!
//! ```json
//! {
//!   "id": 3,
//!   "timestamp": "2026-02-02T17:09:45.123456",
//!   "text": "User: 你好\nAgent: 你好！",
//!   "metadata": {},
//!   "type": "conversation",
//!   "user_message": "你好",
//!   "agent_response": "你好！"
//! }
//! ```

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// 事实未指定分类时使用的默认分类
pub const DEFAULT_FACT_CATEGORY: &str = "general";
/// 任务未指定状态时使用的默认状态
pub const DEFAULT_TASK_STATUS: &str = "completed";

// ── RecordKind ───────────────────────────────────────────────────────────────

/// 记录类型判别符
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Conversation,
    Fact,
    Task,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Conversation => "conversation",
            RecordKind::Fact => "fact",
            RecordKind::Task => "task",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conversation" => Ok(RecordKind::Conversation),
            "fact" => Ok(RecordKind::Fact),
            "task" => Ok(RecordKind::Task),
            other => Err(format!(
                "unknown memory kind '{other}' (expected conversation, fact or task)"
            )),
        }
    }
}

// ── RecordBody ───────────────────────────────────────────────────────────────

/// 各类型独有的字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RecordBody {
    Conversation {
        user_message: String,
        agent_response: String,
    },
    Fact {
        #[serde(default = "default_category")]
        category: String,
    },
    Task {
        #[serde(default = "default_status")]
        status: String,
        #[serde(default)]
        outcome: Option<String>,
    },
}

fn default_category() -> String {
    DEFAULT_FACT_CATEGORY.to_string()
}

fn default_status() -> String {
    DEFAULT_TASK_STATUS.to_string()
}

// ── MemoryRecord ─────────────────────────────────────────────────────────────

/// Store 中的单条记忆，创建后不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// 在热存储与归档的并集内唯一，迁移归档时不重新分配
    pub id: u64,
    /// 创建时间（本地时间，ISO-8601，微秒精度）
    #[serde(with = "iso_timestamp")]
    pub timestamp: NaiveDateTime,
    /// 检索用的扁平化文本
    pub text: String,
    /// 附加标记，如 `manual_commit`
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(flatten)]
    pub body: RecordBody,
}

impl MemoryRecord {
    pub fn conversation(
        id: u64,
        user_message: &str,
        agent_response: &str,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            id,
            timestamp: now(),
            text: format!("User: {user_message}\nAgent: {agent_response}"),
            metadata,
            body: RecordBody::Conversation {
                user_message: user_message.to_string(),
                agent_response: agent_response.to_string(),
            },
        }
    }

    pub fn fact(id: u64, fact: &str, category: Option<&str>) -> Self {
        Self {
            id,
            timestamp: now(),
            text: fact.to_string(),
            metadata: Map::new(),
            body: RecordBody::Fact {
                category: category.unwrap_or(DEFAULT_FACT_CATEGORY).to_string(),
            },
        }
    }

    pub fn task(id: u64, task: &str, status: Option<&str>, outcome: Option<&str>) -> Self {
        let status = status.unwrap_or(DEFAULT_TASK_STATUS);
        let mut text = format!("Task: {task}\nStatus: {status}");
        // 空结果不写入 Outcome 行
        if let Some(outcome) = outcome.filter(|o| !o.is_empty()) {
            text.push_str("\nOutcome: ");
            text.push_str(outcome);
        }
        Self {
            id,
            timestamp: now(),
            text,
            metadata: Map::new(),
            body: RecordBody::Task {
                status: status.to_string(),
                outcome: outcome.map(String::from),
            },
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self.body {
            RecordBody::Conversation { .. } => RecordKind::Conversation,
            RecordBody::Fact { .. } => RecordKind::Fact,
            RecordBody::Task { .. } => RecordKind::Task,
        }
    }

    pub fn is_fact(&self) -> bool {
        matches!(self.body, RecordBody::Fact { .. })
    }

    pub fn user_message(&self) -> Option<&str> {
        match &self.body {
            RecordBody::Conversation { user_message, .. } => Some(user_message),
            _ => None,
        }
    }

    pub fn agent_response(&self) -> Option<&str> {
        match &self.body {
            RecordBody::Conversation { agent_response, .. } => Some(agent_response),
            _ => None,
        }
    }

    pub fn category(&self) -> Option<&str> {
        match &self.body {
            RecordBody::Fact { category } => Some(category),
            _ => None,
        }
    }
}

/// 当前本地时间，截断到微秒
fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(now.nanosecond() / 1_000 * 1_000).unwrap_or(now)
}

/// 与 Python `datetime.isoformat()` 同形：微秒为 0 时省略小数部分，否则固定 6 位
mod iso_timestamp {
    use chrono::{NaiveDateTime, Timelike};
    use serde::{Deserialize, Deserializer, Serializer};

    const WHOLE_SECONDS: &str = "%Y-%m-%dT%H:%M:%S";
    const MICROSECONDS: &str = "%Y-%m-%dT%H:%M:%S%.6f";

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        let format = if ts.nanosecond() / 1_000 == 0 {
            WHOLE_SECONDS
        } else {
            MICROSECONDS
        };
        serializer.collect_str(&ts.format(format))
    }

    /// 读取时接受任意位数的小数秒
    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<NaiveDateTime>().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_conversation_text() {
        let record = MemoryRecord::conversation(0, "hi", "hello there", Map::new());
        assert_eq!(record.text, "User: hi\nAgent: hello there");
        assert_eq!(record.kind(), RecordKind::Conversation);
        assert_eq!(record.user_message(), Some("hi"));
        assert_eq!(record.agent_response(), Some("hello there"));
        assert_eq!(record.category(), None);
    }

    #[test]
    fn test_task_text_with_and_without_outcome() {
        let done = MemoryRecord::task(1, "ship release", None, Some("tagged v1.0"));
        assert_eq!(done.text, "Task: ship release\nStatus: completed\nOutcome: tagged v1.0");

        let pending = MemoryRecord::task(2, "write docs", Some("pending"), None);
        assert_eq!(pending.text, "Task: write docs\nStatus: pending");

        let empty = MemoryRecord::task(3, "noop", None, Some(""));
        assert_eq!(empty.text, "Task: noop\nStatus: completed");
    }

    #[test]
    fn test_fact_default_category() {
        let fact = MemoryRecord::fact(4, "Alex has two children", None);
        assert_eq!(fact.category(), Some("general"));
        assert!(fact.is_fact());
    }

    #[test]
    fn test_wire_format_uses_type_tag() {
        let fact = MemoryRecord::fact(7, "likes tea", Some("preferences"));
        let value = serde_json::to_value(&fact).unwrap();
        assert_eq!(value["type"], "fact");
        assert_eq!(value["category"], "preferences");
        assert_eq!(value["id"], 7);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_reads_legacy_records_with_defaults() {
        // 旧数据：事实缺 category、任务缺 status、均缺 metadata
        let raw = json!([
            {"id": 0, "type": "fact", "text": "likes tea", "timestamp": "2026-02-02T17:09:45.123456"},
            {"id": 1, "type": "task", "text": "Task: x", "outcome": null, "timestamp": "2026-02-02T17:10:00"},
            {"id": 2, "type": "conversation", "user_message": "a", "agent_response": "b",
             "text": "User: a\nAgent: b", "timestamp": "2026-02-02T17:11:00.5", "metadata": {"manual_commit": true}}
        ]);
        let records: Vec<MemoryRecord> = serde_json::from_value(raw).unwrap();
        assert_eq!(records[0].category(), Some(DEFAULT_FACT_CATEGORY));
        assert!(records[0].metadata.is_empty());
        assert!(matches!(
            &records[1].body,
            RecordBody::Task { status, outcome: None } if status == DEFAULT_TASK_STATUS
        ));
        assert_eq!(records[2].metadata["manual_commit"], json!(true));
    }

    #[test]
    fn test_timestamp_matches_isoformat_shape() {
        let at = |micro| {
            chrono::NaiveDate::from_ymd_opt(2026, 2, 2)
                .unwrap()
                .and_hms_micro_opt(17, 9, 45, micro)
                .unwrap()
        };
        let mut fact = MemoryRecord::fact(0, "likes tea", None);

        fact.timestamp = at(123_000);
        let value = serde_json::to_value(&fact).unwrap();
        assert_eq!(value["timestamp"], "2026-02-02T17:09:45.123000");
        let back: MemoryRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.timestamp, fact.timestamp);

        fact.timestamp = at(0);
        assert_eq!(serde_json::to_value(&fact).unwrap()["timestamp"], "2026-02-02T17:09:45");
    }

    #[test]
    fn test_new_records_have_microsecond_precision() {
        let record = MemoryRecord::conversation(0, "q", "a", Map::new());
        assert_eq!(record.timestamp.nanosecond() % 1_000, 0);

        let raw = serde_json::to_value(&record).unwrap()["timestamp"]
            .as_str()
            .unwrap()
            .to_string();
        let fraction = raw.split_once('.').map(|(_, f)| f.len());
        assert!(matches!(fraction, None | Some(6)), "小数部分应为 6 位: {raw}");
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("Fact".parse::<RecordKind>(), Ok(RecordKind::Fact));
        assert_eq!(" task ".parse::<RecordKind>(), Ok(RecordKind::Task));
        assert!("note".parse::<RecordKind>().is_err());
    }
}
