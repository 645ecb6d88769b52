//! Hive - Rust 多智能体协作系统
//!
//! 入口：初始化日志、加载配置、组装流水线，对命令行给出的任务跑
//! 知识 -> 规划 -> 执行 -> 审查 全链，Ctrl+C 取消当前任务。

use anyhow::Context;
use hive::agents::build_pipeline;
use hive::config::{load_config, AppConfig};
use hive::llm::create_llm_from_config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .with(fmt::layer())
        .init();

    let cfg = load_config(None).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let task: String = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let task = if task.trim().is_empty() {
        "列出当前工作目录的结构，并总结其中包含哪些类型的文件".to_string()
    } else {
        task
    };

    let llm = create_llm_from_config(&cfg);
    let (pipeline, registry) = build_pipeline(&cfg, llm);

    let cancel_token = tokio_util::sync::CancellationToken::new();
    {
        let cancel_token = cancel_token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Ctrl+C received, cancelling");
                cancel_token.cancel();
            }
        });
    }

    let state = pipeline
        .run(&task, cancel_token)
        .await
        .context("Pipeline run failed")?;

    println!("\n=== 最终执行结果 ===");
    println!("用户任务: {}", state.user_task);
    println!("计划步骤数: {}", state.task_list.len());
    for item in &state.task_list {
        println!(
            "  [{}] {} => {}",
            item.index,
            item.task,
            item.result.as_deref().unwrap_or("(未执行)")
        );
    }
    println!("执行工具数: {}", state.execution_results.len());
    println!("存活会话数: {}", registry.list().len());
    if let Some(review) = &state.review {
        if review.finished && !review.error {
            println!("审查结论: {}", review.content);
        } else {
            println!(
                "审查未通过 (error={}): {}",
                review.error, review.reject_reason
            );
        }
    }

    Ok(())
}
