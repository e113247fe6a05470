//! 记忆系统
//!
//! | 层次 | 实现 | 作用域 |
//! |------|------|--------|
//! | 会话缓冲 | [`ConversationHistory`] | 当前进程内，不落盘 |
//! | 热存储 | [`MemoryStore`] → `memories.json` | 默认检索范围，容量受压缩策略约束 |
//! | 归档 | [`MemoryStore`] → `memories_archive.json` | 压缩迁出的旧记录，按需检索 |
//!
//! 事实（[`RecordKind::Fact`]）永远留在热存储；对话与任务超出保留数后迁入归档。
//!
//! ## 多任务共享
//!
//! [`MemoryStore`] 本身不加锁。需要在多个异步任务间共享时使用 [`SharedMemoryStore`]：
//!
//! ```rust,no_run
//! use soul_agent::config::MemoryConfig;
//! use soul_agent::memory::{self, MemoryStore};
//!
//! # async fn example() -> soul_agent::error::Result<()> {
//! let store = memory::shared(MemoryStore::open(MemoryConfig::from_env()?)?);
//! store.lock().await.add_fact("偏好深色主题", Some("preferences"))?;
//! # Ok(())
//! # }
//! ```

pub mod compaction;
pub mod history;
pub mod record;
pub mod search;
pub mod stats;
pub mod store;
pub mod tier;

pub use compaction::{CompactionPolicy, CompactionReport};
pub use history::{ConversationHistory, HistoryMessage, Role};
pub use record::{MemoryRecord, RecordBody, RecordKind};
pub use search::{SearchHit, SearchOptions};
pub use stats::{MemoryStats, SummaryAnalysis};
pub use store::MemoryStore;

use std::sync::Arc;
use tokio::sync::Mutex;

/// 跨任务共享的 Store 句柄
pub type SharedMemoryStore = Arc<Mutex<MemoryStore>>;

pub fn shared(store: MemoryStore) -> SharedMemoryStore {
    Arc::new(Mutex::new(store))
}
