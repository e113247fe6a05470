//! soul-agent —— 记忆 Store 运维命令行
//!
//! ```bash
//! soul-agent learn "Alex has two children" --category family
//! soul-agent search "family children" --limit 3 --archive
//! soul-agent compact --force
//! soul-agent shell
//! ```
//!
//! 日志级别由 `RUST_LOG` 控制，默认 `soul_agent=info`。

use clap::{Parser, Subcommand};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde_json::{Value, json};
use soul_agent::config::MemoryConfig;
use soul_agent::error::{Result, SoulError};
use soul_agent::memory::{self, MemoryStore, RecordKind, SharedMemoryStore};
use soul_agent::tools::memory::memory_tools;
use soul_agent::tools::{ToolManager, ToolParameters, ToolResult};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "soul-agent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "分层长期记忆 Store（热存储 + 归档）", long_about = None)]
struct Cli {
    /// 记忆目录，覆盖配置文件与环境变量
    #[arg(long, global = true, env = "SOUL_MEMORY_DIR")]
    memory_dir: Option<PathBuf>,

    /// YAML 配置文件；缺省时从环境变量读取
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 记住一条事实
    Learn {
        fact: String,
        #[arg(short, long)]
        category: Option<String>,
    },

    /// 记录一个任务
    Task {
        task: String,
        #[arg(short, long)]
        status: Option<String>,
        #[arg(short, long)]
        outcome: Option<String>,
    },

    /// 关键词检索
    Search {
        query: String,
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
        /// conversation / fact / task
        #[arg(short, long)]
        kind: Option<RecordKind>,
        /// 同时检索归档
        #[arg(long)]
        archive: bool,
    },

    /// 打印注入对话的上下文块
    Context {
        query: String,
        #[arg(short, long, default_value_t = 8)]
        max: usize,
    },

    /// 条数统计与知识分类
    Stats,

    /// 列出全部事实
    Facts,

    /// 压缩热存储
    Compact {
        /// 忽略阈值
        #[arg(long)]
        force: bool,
    },

    /// 交互式 shell
    Shell,
}

// ── 入口 ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "soul_agent=info".into()),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => MemoryConfig::load(path)?,
        None => MemoryConfig::from_env()?,
    };
    if let Some(dir) = cli.memory_dir {
        config = config.memory_dir(dir);
    }

    let store = memory::shared(MemoryStore::open(config)?);
    let mut tools = ToolManager::new();
    tools.register_tools(memory_tools(store.clone()));

    match cli.command {
        Commands::Learn { fact, category } => {
            let params = params(json!({ "fact": fact, "category": category }));
            print_result(tools.execute_tool("learn_fact", params).await?);
        }
        Commands::Task {
            task,
            status,
            outcome,
        } => {
            let params = params(json!({ "task": task, "status": status, "outcome": outcome }));
            print_result(tools.execute_tool("record_task", params).await?);
        }
        Commands::Search {
            query,
            limit,
            kind,
            archive,
        } => {
            let params = params(json!({
                "query": query,
                "limit": limit,
                "kind": kind.map(|k| k.as_str()),
                "include_archive": archive,
            }));
            print_result(tools.execute_tool("recall", params).await?);
        }
        Commands::Context { query, max } => {
            println!("{}", store.lock().await.context_for_query(&query, max));
        }
        Commands::Stats => {
            print_result(tools.execute_tool("memory_stats", ToolParameters::new()).await?);
        }
        Commands::Facts => print_facts(&store).await,
        Commands::Compact { force } => {
            let params = params(json!({ "force": force }));
            print_result(tools.execute_tool("compact_memory", params).await?);
        }
        Commands::Shell => run_shell(&store, &tools).await?,
    }
    Ok(())
}

// ── Shell ─────────────────────────────────────────────────────────────────────

const SHELL_HELP: &str = "\
  /learn <事实> [#分类]      记住一条事实
  /task <任务> [=> 结果]     记录已完成的任务
  /search [--archive] <词>   关键词检索
  /context <词>              预览注入对话的上下文
  /facts                     列出全部事实
  /stats                     统计
  /compact                   强制压缩
  /help                      显示帮助
  /quit                      退出";

async fn run_shell(store: &SharedMemoryStore, tools: &ToolManager) -> Result<()> {
    let mut editor = DefaultEditor::new().map_err(|e| SoulError::Other(e.to_string()))?;
    {
        let store = store.lock().await;
        info!(
            dir = %store.config().resolved_dir().display(),
            hot = store.stats().hot,
            archive = store.stats().archive,
            "🧠 记忆 shell 启动"
        );
    }
    println!("输入 /help 查看命令，/quit 退出");

    loop {
        let line = match editor.readline("soul> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(SoulError::Other(e.to_string())),
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        let outcome = match command {
            "/quit" | "/exit" => break,
            "/help" => {
                println!("{SHELL_HELP}");
                Ok(())
            }
            "/learn" if !rest.is_empty() => {
                let (fact, category) = match rest.rsplit_once(" #") {
                    Some((fact, category)) => (fact.trim(), Some(category.trim())),
                    None => (rest, None),
                };
                let params = params(json!({ "fact": fact, "category": category }));
                shell_tool(tools, "learn_fact", params).await
            }
            "/task" if !rest.is_empty() => {
                let (task, outcome) = match rest.split_once("=>") {
                    Some((task, outcome)) => (task.trim(), Some(outcome.trim())),
                    None => (rest, None),
                };
                let params = params(json!({ "task": task, "outcome": outcome }));
                shell_tool(tools, "record_task", params).await
            }
            "/search" if !rest.is_empty() => {
                let (archive, query) = match rest.strip_prefix("--archive") {
                    Some(query) => (true, query.trim()),
                    None => (false, rest),
                };
                let params = params(json!({ "query": query, "include_archive": archive }));
                shell_tool(tools, "recall", params).await
            }
            "/context" if !rest.is_empty() => {
                println!("{}", store.lock().await.context_for_query(rest, 8));
                Ok(())
            }
            "/facts" => {
                print_facts(store).await;
                Ok(())
            }
            "/stats" => shell_tool(tools, "memory_stats", ToolParameters::new()).await,
            "/compact" => shell_tool(tools, "compact_memory", params(json!({ "force": true }))).await,
            _ => {
                println!("未知命令或缺少参数：{line}（输入 /help 查看用法）");
                Ok(())
            }
        };

        // 单条命令失败不退出 shell
        if let Err(e) = outcome {
            warn!(error = %e, "命令执行失败");
            println!("❌ {e}");
        }
    }

    println!("👋 再见");
    Ok(())
}

async fn shell_tool(tools: &ToolManager, name: &str, params: ToolParameters) -> Result<()> {
    print_result(tools.execute_tool(name, params).await?);
    Ok(())
}

// ── 输出 ──────────────────────────────────────────────────────────────────────

/// 丢弃值为 null 的参数，避免可选参数被当成字面量 "null"
fn params(value: Value) -> ToolParameters {
    match value {
        Value::Object(map) => map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
        _ => ToolParameters::new(),
    }
}

fn print_result(result: ToolResult) {
    if result.success {
        println!("{}", result.output);
    } else {
        println!("❌ {}", result.error.unwrap_or_default());
    }
}

async fn print_facts(store: &SharedMemoryStore) {
    let store = store.lock().await;
    let facts = store.all_facts();
    if facts.is_empty() {
        println!("（还没有任何事实）");
        return;
    }
    for fact in facts {
        println!(
            "[ID:{}][{}] {}",
            fact.id,
            fact.category().unwrap_or("general"),
            fact.text
        );
    }
}
