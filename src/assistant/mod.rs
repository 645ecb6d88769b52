//! 对话循环层：system prompt 组装与「模型 -> 解析 -> 分发 -> 回填」主循环

pub mod loop_;
pub mod prompt;

pub use loop_::{Assistant, ChatOutcome};
pub use prompt::fncall_system_prompt;
