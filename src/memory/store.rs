//! 分层记忆 Store
//!
//! 热存储（`memories.json`）承接全部写入并参与默认检索；归档
//! （`memories_archive.json`）只接收压缩迁出的旧记录，检索时按需纳入。
//!
//! ## 快速上手
//!
//! ```rust,no_run
//! use soul_agent::config::MemoryConfig;
//! use soul_agent::memory::{MemoryStore, SearchOptions};
//!
//! # fn example() -> soul_agent::error::Result<()> {
//! let mut store = MemoryStore::open(MemoryConfig::new("~/.soul-agent/memory_store"))?;
//! store.add_fact("Alex has two children", Some("family"))?;
//! store.add_conversation("我周末去爬山", "听起来不错！", None)?;
//!
//! let hits = store.search("children", &SearchOptions::default().limit(3));
//! let context = store.context_for_query("周末做什么", 8);
//! # Ok(())
//! # }
//! ```
//!
//! 单进程、单写者：所有方法同步执行，写操作返回前已整体覆盖对应文件。
//! 多线程宿主需自行加锁，见 [`SharedMemoryStore`](crate::memory::SharedMemoryStore)。

use crate::config::MemoryConfig;
use crate::error::{Result, SoulError};
use crate::memory::compaction::{CompactionPolicy, CompactionReport};
use crate::memory::record::{MemoryRecord, RecordKind};
use crate::memory::search::{self, SearchHit, SearchOptions};
use crate::memory::stats::{MemoryStats, SummaryAnalysis};
use crate::memory::tier::TierFile;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info, warn};

pub struct MemoryStore {
    config: MemoryConfig,
    policy: CompactionPolicy,
    hot_file: TierFile,
    archive_file: TierFile,
    hot: Vec<MemoryRecord>,
    archive: Vec<MemoryRecord>,
    /// 下一个可用 id，严格递增，取两层已有最大 id + 1
    next_id: u64,
    interaction_count: u64,
    last_compaction: Option<CompactionReport>,
    /// 写入后自动压缩失败的原因；记录本身已落盘
    compaction_error: Option<SoulError>,
}

impl MemoryStore {
    /// 校验配置、创建目录并加载两个层级文件
    pub fn open(config: MemoryConfig) -> Result<Self> {
        config.validate()?;
        let dir = config.resolved_dir();
        std::fs::create_dir_all(&dir)?;

        let hot_file = TierFile::new(config.hot_file(), "hot");
        let archive_file = TierFile::new(config.archive_file(), "archive");
        let hot = hot_file.load();
        let archive = archive_file.load();

        let next_id = hot
            .iter()
            .chain(archive.iter())
            .map(|r| r.id + 1)
            .max()
            .unwrap_or(0);
        let interaction_count = hot
            .iter()
            .chain(archive.iter())
            .filter(|r| r.kind() == RecordKind::Conversation)
            .count() as u64;

        info!(
            dir = %dir.display(),
            hot = hot.len(),
            archive = archive.len(),
            "🧠 MemoryStore 初始化"
        );

        Ok(Self {
            policy: CompactionPolicy::from(&config),
            config,
            hot_file,
            archive_file,
            hot,
            archive,
            next_id,
            interaction_count,
            last_compaction: None,
            compaction_error: None,
        })
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn hot_path(&self) -> &Path {
        self.hot_file.path()
    }

    pub fn archive_path(&self) -> &Path {
        self.archive_file.path()
    }

    // ── 写入 ─────────────────────────────────────────────────────────────────

    /// 记录一轮对话，返回新记录 id
    pub fn add_conversation(
        &mut self,
        user_message: &str,
        agent_response: &str,
        metadata: Option<Map<String, Value>>,
    ) -> Result<String> {
        let record = MemoryRecord::conversation(
            self.next_id,
            user_message,
            agent_response,
            metadata.unwrap_or_default(),
        );
        self.ingest(record)
    }

    /// 记录一条事实，`category` 缺省为 `general`
    pub fn add_fact(&mut self, fact: &str, category: Option<&str>) -> Result<String> {
        let record = MemoryRecord::fact(self.next_id, fact, category);
        self.ingest(record)
    }

    /// 记录一个任务，`status` 缺省为 `completed`
    pub fn add_task(
        &mut self,
        task: &str,
        status: Option<&str>,
        outcome: Option<&str>,
    ) -> Result<String> {
        let record = MemoryRecord::task(self.next_id, task, status, outcome);
        self.ingest(record)
    }

    fn ingest(&mut self, record: MemoryRecord) -> Result<String> {
        let id = record.id;
        let kind = record.kind();
        self.hot.push(record);
        if let Err(e) = self.hot_file.save(&self.hot) {
            // 内存与磁盘保持一致
            self.hot.pop();
            return Err(e);
        }
        self.next_id = id + 1;
        if kind == RecordKind::Conversation {
            self.interaction_count += 1;
        }
        debug!(id, kind = %kind, hot = self.hot.len(), "📝 写入记忆");

        // 记录已落盘：压缩失败只记录，不让本次写入报错
        if self.config.auto_compact_enabled
            && let Err(e) = self.check_auto_compact()
        {
            warn!(id, error = %e, "⚠️ 自动压缩失败，记录已保存");
            self.compaction_error = Some(e);
        }
        Ok(id.to_string())
    }

    // ── 检索 ─────────────────────────────────────────────────────────────────

    pub fn search(&self, query: &str, options: &SearchOptions) -> Vec<SearchHit> {
        let hits = search::rank(&self.hot, &self.archive, query, options);
        debug!(query = %query, hits = hits.len(), archive = options.include_archive, "🔍 记忆检索");
        hits
    }

    /// 组装注入对话的上下文块：检索命中在前，最近 5 条事实随后
    pub fn context_for_query(&self, query: &str, max_results: usize) -> String {
        let hits = self.search(query, &SearchOptions::default().limit(max_results));
        let facts = self.all_facts();
        search::build_context(&hits, &facts, max_results)
    }

    // ── 压缩 ─────────────────────────────────────────────────────────────────

    /// 热存储超过阈值时执行压缩，返回是否真的迁移了记录
    pub fn check_auto_compact(&mut self) -> Result<bool> {
        if !self.policy.should_compact(self.hot.len()) {
            return Ok(false);
        }
        let report = self.compact(false)?;
        Ok(report.moved > 0)
    }

    /// 将旧对话与旧任务迁入归档；`force = false` 且未超阈值时不做任何事
    ///
    /// 先写归档再写热存储：两次写之间崩溃只会让记录在两个文件里各出现一次，不会丢失。
    pub fn compact(&mut self, force: bool) -> Result<CompactionReport> {
        if !force && !self.policy.should_compact(self.hot.len()) {
            return Ok(self.report(0));
        }

        let Some((kept, moved)) = self.policy.partition(&self.hot) else {
            debug!(hot = self.hot.len(), "压缩跳过：没有可迁移的记录");
            return Ok(self.report(0));
        };

        let moved_count = moved.len();
        let mut archive = Vec::with_capacity(self.archive.len() + moved_count);
        archive.extend_from_slice(&self.archive);
        archive.extend(moved);

        self.archive_file.save(&archive)?;
        self.archive = archive;
        self.hot = kept;
        self.hot_file.save(&self.hot)?;

        let report = self.report(moved_count);
        info!(moved = report.moved, hot = report.hot, archive = report.archive, "🗜️ 记忆压缩完成");
        self.last_compaction = Some(report);
        Ok(report)
    }

    /// 取走最近一次实际发生的压缩结果（取后清空）
    pub fn take_compaction(&mut self) -> Option<CompactionReport> {
        self.last_compaction.take()
    }

    /// 取走最近一次自动压缩失败的错误（取后清空）
    pub fn take_compaction_error(&mut self) -> Option<SoulError> {
        self.compaction_error.take()
    }

    fn report(&self, moved: usize) -> CompactionReport {
        CompactionReport {
            moved,
            hot: self.hot.len(),
            archive: self.archive.len(),
        }
    }

    // ── 统计 ─────────────────────────────────────────────────────────────────

    pub fn stats(&self) -> MemoryStats {
        MemoryStats {
            hot: self.hot.len(),
            archive: self.archive.len(),
            total: self.hot.len() + self.archive.len(),
        }
    }

    /// 只统计热存储
    pub fn analyze_for_summary(&self) -> SummaryAnalysis {
        SummaryAnalysis::from_records(&self.hot)
    }

    pub fn memories(&self) -> &[MemoryRecord] {
        &self.hot
    }

    pub fn archive(&self) -> &[MemoryRecord] {
        &self.archive
    }

    /// 全部事实（事实只存在于热存储）
    pub fn all_facts(&self) -> Vec<&MemoryRecord> {
        self.hot.iter().filter(|r| r.is_fact()).collect()
    }

    pub fn interaction_count(&self) -> u64 {
        self.interaction_count
    }

    /// 外部 soul 档案是否该刷新：强制，或对话数恰好是刷新频率的整数倍
    pub fn soul_update_due(&self, force: bool) -> bool {
        force
            || (self.interaction_count > 0
                && self.interaction_count % self.config.soul_update_frequency == 0)
    }
}
