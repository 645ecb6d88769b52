//! Hive - Rust 多智能体协作系统
//!
//! 模块划分：
//! - **agents**: 知识 / 规划 / 执行 / 审查智能体与主流水线（共享 AgentState）
//! - **assistant**: 对话循环（模型调用 -> 解析 -> 工具分发 -> 回填，直至无调用）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / 本地端点 / Mock）
//! - **plan**: 任务清单数据模型与按 index 合并
//! - **protocol**: 流式 `<tool_call>` 协议解析
//! - **session**: 命令会话注册表与子进程执行
//! - **tools**: 工具箱（命令会话、文件系统、网页查询、echo）与分发器

pub mod agents;
pub mod assistant;
pub mod config;
pub mod core;
pub mod llm;
pub mod plan;
pub mod protocol;
pub mod session;
pub mod tools;
