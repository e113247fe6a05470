//! 工具系统
//!
//! 定义 [`Tool`] trait 和 [`ToolManager`]（注册、查找、执行）。
//! 对话循环通过这些工具驱动记忆 Store，具体工具位于 [`memory`]。

pub mod memory;

use crate::error::{Result, SoulError, ToolError};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

/// 工具执行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: String) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    pub fn error(error: String) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error),
        }
    }
}

pub type ToolParameters = HashMap<String, Value>;

/// 工具接口
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// 工具参数的 JSON Schema 定义
    fn parameters(&self) -> Value;
    async fn execute(&self, parameters: ToolParameters) -> Result<ToolResult>;
}

#[derive(Default)]
pub struct ToolManager {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn register_tools(&mut self, tools: Vec<Box<dyn Tool>>) {
        for tool in tools {
            self.register(tool);
        }
    }

    pub fn list_tools(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|name| name.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn get_tool(&self, tool_name: &str) -> Option<&dyn Tool> {
        self.tools.get(tool_name).map(|tool| &**tool)
    }

    /// OpenAI function-calling 格式的工具定义，供对话循环随请求下发
    pub fn tool_definitions(&self) -> Vec<Value> {
        self.list_tools()
            .into_iter()
            .filter_map(|name| self.get_tool(name))
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters(),
                    }
                })
            })
            .collect()
    }

    pub async fn execute_tool(
        &self,
        tool_name: &str,
        parameters: ToolParameters,
    ) -> Result<ToolResult> {
        let tool = self
            .get_tool(tool_name)
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))?;
        tool.execute(parameters).await
    }
}

// ── 参数解析 ─────────────────────────────────────────────────────────────────

pub(crate) fn required_str<'a>(parameters: &'a ToolParameters, name: &str) -> Result<&'a str> {
    parameters
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::MissingParameter(name.to_string()).into())
}

pub(crate) fn optional_str<'a>(parameters: &'a ToolParameters, name: &str) -> Option<&'a str> {
    parameters
        .get(name)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

pub(crate) fn optional_bool(parameters: &ToolParameters, name: &str) -> Result<Option<bool>> {
    match parameters.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(ToolError::InvalidParameter {
            name: name.to_string(),
            message: format!("expected boolean, got {other}"),
        }
        .into()),
    }
}

/// 把 Store 层错误包装成带工具名的执行失败
pub(crate) fn execution_failed(tool: &str) -> impl FnOnce(SoulError) -> SoulError + '_ {
    move |err| {
        ToolError::ExecutionFailed {
            tool: tool.to_string(),
            message: err.to_string(),
        }
        .into()
    }
}
