//! 会话内对话缓冲
//!
//! 保存当前进程里的 user / assistant 消息，不落盘。对话循环每轮把最近若干条
//! 随提示一起发送；用户也可以通过 [`ConversationHistory::commit`] 把最近几轮
//! 手动写入长期记忆（带 `manual_commit` 标记）。

use crate::error::Result;
use crate::memory::store::MemoryStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 手动提交的对话在 metadata 中携带的标记键
pub const MANUAL_COMMIT_KEY: &str = "manual_commit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    messages: Vec<HistoryMessage>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(HistoryMessage {
            role: Role::User,
            content: content.into(),
        });
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(HistoryMessage {
            role: Role::Assistant,
            content: content.into(),
        });
    }

    pub fn push_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.push_user(user);
        self.push_assistant(assistant);
    }

    /// 最近 `n` 条消息
    pub fn recent(&self, n: usize) -> &[HistoryMessage] {
        &self.messages[self.messages.len().saturating_sub(n)..]
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// 完整的 (user, assistant) 轮次，按时间顺序；落单的消息不计入
    fn exchanges(&self) -> Vec<(&str, &str)> {
        self.messages
            .windows(2)
            .filter_map(|pair| match (&pair[0], &pair[1]) {
                (
                    HistoryMessage {
                        role: Role::User,
                        content: user,
                    },
                    HistoryMessage {
                        role: Role::Assistant,
                        content: assistant,
                    },
                ) => Some((user.as_str(), assistant.as_str())),
                _ => None,
            })
            .collect()
    }

    /// 把最近 `n` 轮完整对话写入 Store，返回实际写入的轮数
    pub fn commit(&self, store: &mut MemoryStore, n: usize) -> Result<usize> {
        let exchanges = self.exchanges();
        let recent = &exchanges[exchanges.len().saturating_sub(n)..];
        for (user, assistant) in recent {
            let mut metadata = Map::new();
            metadata.insert(MANUAL_COMMIT_KEY.to_string(), Value::Bool(true));
            store.add_conversation(user, assistant, Some(metadata))?;
        }
        Ok(recent.len())
    }
}
