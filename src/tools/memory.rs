//! Agent 记忆工具
//!
//! | 工具             | 对应 Store 操作                                  |
//! |------------------|--------------------------------------------------|
//! | `learn_fact`     | `store.add_fact(fact, category)`                 |
//! | `record_task`    | `store.add_task(task, status, outcome)`          |
//! | `recall`         | `store.search(query, options)`                   |
//! | `compact_memory` | `store.compact(force)`                           |
//! | `memory_stats`   | `store.stats()` + `store.analyze_for_summary()`  |
//!
//! 所有工具共享同一个 [`SharedMemoryStore`]。

use crate::error::{Result, ToolError};
use crate::memory::{RecordKind, SearchHit, SearchOptions, SharedMemoryStore};
use crate::tools::{
    Tool, ToolParameters, ToolResult, execution_failed, optional_bool, optional_str, required_str,
};
use serde_json::{Value, json};
use tracing::debug;

/// recall 单次最多返回条数
const RECALL_MAX_LIMIT: u64 = 20;

/// 一次性构造全部记忆工具
pub fn memory_tools(store: SharedMemoryStore) -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(LearnFactTool::new(store.clone())),
        Box::new(RecordTaskTool::new(store.clone())),
        Box::new(RecallTool::new(store.clone())),
        Box::new(CompactMemoryTool::new(store.clone())),
        Box::new(MemoryStatsTool::new(store)),
    ]
}

// ── LearnFactTool ────────────────────────────────────────────────────────────

/// 记住一条关于用户或世界的事实，事实永不归档
pub struct LearnFactTool {
    store: SharedMemoryStore,
}

impl LearnFactTool {
    pub fn new(store: SharedMemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for LearnFactTool {
    fn name(&self) -> &str {
        "learn_fact"
    }

    fn description(&self) -> &str {
        "将一条值得长期记住的事实存入记忆（如用户偏好、家庭情况、项目约定）。事实永远不会被归档。"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "fact": {
                    "type": "string",
                    "description": "要记住的事实，简洁完整地描述"
                },
                "category": {
                    "type": "string",
                    "description": "分类（可选，默认 general），例如 \"family\"、\"preferences\""
                }
            },
            "required": ["fact"]
        })
    }

    async fn execute(&self, parameters: ToolParameters) -> Result<ToolResult> {
        let fact = required_str(&parameters, "fact")?;
        let category = optional_str(&parameters, "category");

        let id = self
            .store
            .lock()
            .await
            .add_fact(fact, category)
            .map_err(execution_failed(self.name()))?;
        debug!(id = %id, category = ?category, "💡 learn_fact 写入记忆");

        let suffix = category
            .map(|c| format!("（分类：{c}）"))
            .unwrap_or_default();
        Ok(ToolResult::success(format!(
            "✅ 已记住（ID: {id}）：\"{fact}\"{suffix}"
        )))
    }
}

// ── RecordTaskTool ───────────────────────────────────────────────────────────

/// 记录一个已完成（或其他状态）的任务
pub struct RecordTaskTool {
    store: SharedMemoryStore,
}

impl RecordTaskTool {
    pub fn new(store: SharedMemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for RecordTaskTool {
    fn name(&self) -> &str {
        "record_task"
    }

    fn description(&self) -> &str {
        "记录一个任务及其结果，便于之后回忆做过什么。"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": { "type": "string", "description": "任务描述" },
                "status": { "type": "string", "description": "任务状态（可选，默认 completed）" },
                "outcome": { "type": "string", "description": "任务结果（可选）" }
            },
            "required": ["task"]
        })
    }

    async fn execute(&self, parameters: ToolParameters) -> Result<ToolResult> {
        let task = required_str(&parameters, "task")?;
        let status = optional_str(&parameters, "status");
        let outcome = optional_str(&parameters, "outcome");

        let id = self
            .store
            .lock()
            .await
            .add_task(task, status, outcome)
            .map_err(execution_failed(self.name()))?;
        debug!(id = %id, "📋 record_task 写入记忆");

        Ok(ToolResult::success(format!("✅ 任务已记录（ID: {id}）：{task}")))
    }
}

// ── RecallTool ───────────────────────────────────────────────────────────────

/// 关键词检索记忆
pub struct RecallTool {
    store: SharedMemoryStore,
}

impl RecallTool {
    pub fn new(store: SharedMemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for RecallTool {
    fn name(&self) -> &str {
        "recall"
    }

    fn description(&self) -> &str {
        "按关键词检索记忆，返回最相关的若干条。默认只查热存储，include_archive=true 时同时查归档。"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "检索关键词，空格分隔" },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": RECALL_MAX_LIMIT,
                    "description": "最多返回条数（默认 5）"
                },
                "kind": {
                    "type": "string",
                    "enum": ["conversation", "fact", "task"],
                    "description": "只检索指定类型（可选）"
                },
                "include_archive": { "type": "boolean", "description": "是否检索归档（默认 false）" }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, parameters: ToolParameters) -> Result<ToolResult> {
        let query = required_str(&parameters, "query")?;
        let limit = parameters
            .get("limit")
            .and_then(|v| v.as_u64())
            .map(|n| n.clamp(1, RECALL_MAX_LIMIT) as usize)
            .unwrap_or(5);
        let kind = optional_str(&parameters, "kind")
            .map(|k| {
                k.parse::<RecordKind>()
                    .map_err(|message| ToolError::InvalidParameter {
                        name: "kind".to_string(),
                        message,
                    })
            })
            .transpose()?;
        let include_archive = optional_bool(&parameters, "include_archive")?.unwrap_or(false);

        let options = SearchOptions::default()
            .limit(limit)
            .kind(kind)
            .include_archive(include_archive);
        let hits = self.store.lock().await.search(query, &options);

        if hits.is_empty() {
            return Ok(ToolResult::success(format!("未找到与「{query}」相关的记忆。")));
        }

        let mut lines = vec![format!("找到 {} 条相关记忆：", hits.len())];
        for (i, hit) in hits.iter().enumerate() {
            lines.push(format!("{}. {}", i + 1, format_hit(hit)));
        }
        Ok(ToolResult::success(lines.join("\n")))
    }
}

// ── CompactMemoryTool ────────────────────────────────────────────────────────

/// 手动触发压缩
pub struct CompactMemoryTool {
    store: SharedMemoryStore,
}

impl CompactMemoryTool {
    pub fn new(store: SharedMemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for CompactMemoryTool {
    fn name(&self) -> &str {
        "compact_memory"
    }

    fn description(&self) -> &str {
        "把旧对话和旧任务迁入归档，保持热存储精简。force=false 时仅在超过阈值时执行。"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "force": { "type": "boolean", "description": "忽略阈值强制压缩（默认 true）" }
            },
            "required": []
        })
    }

    async fn execute(&self, parameters: ToolParameters) -> Result<ToolResult> {
        let force = optional_bool(&parameters, "force")?.unwrap_or(true);
        let report = self
            .store
            .lock()
            .await
            .compact(force)
            .map_err(execution_failed(self.name()))?;
        Ok(ToolResult::success(format!(
            "🗜️ 迁移 {} 条记忆；热存储 {} 条，归档 {} 条",
            report.moved, report.hot, report.archive
        )))
    }
}

// ── MemoryStatsTool ──────────────────────────────────────────────────────────

pub struct MemoryStatsTool {
    store: SharedMemoryStore,
}

impl MemoryStatsTool {
    pub fn new(store: SharedMemoryStore) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for MemoryStatsTool {
    fn name(&self) -> &str {
        "memory_stats"
    }

    fn description(&self) -> &str {
        "查看记忆条数统计与知识分类。"
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {}, "required": [] })
    }

    async fn execute(&self, _parameters: ToolParameters) -> Result<ToolResult> {
        let store = self.store.lock().await;
        let output = json!({
            "stats": store.stats(),
            "summary": store.analyze_for_summary(),
        });
        Ok(ToolResult::success(serde_json::to_string_pretty(&output)?))
    }
}

// ── 辅助函数 ─────────────────────────────────────────────────────────────────

fn format_hit(hit: &SearchHit) -> String {
    let origin = if hit.from_archive { " [归档]" } else { "" };
    format!(
        "[ID:{}][{}][★{}]{} {}",
        hit.record.id,
        hit.record.kind(),
        hit.score,
        origin,
        hit.record.text.replace('\n', " | ")
    )
}
