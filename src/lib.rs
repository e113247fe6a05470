pub mod config;
pub mod error;
pub mod memory;
pub mod tools;

pub mod prelude {
    pub use crate::config::MemoryConfig;
    pub use crate::error::{Result, SoulError};
    pub use crate::memory::{
        ConversationHistory, MemoryRecord, MemoryStore, RecordKind, SearchOptions,
        SharedMemoryStore,
    };
    pub use crate::tools::memory::memory_tools;
    pub use crate::tools::{Tool, ToolManager, ToolParameters, ToolResult};
}
