//! Agent 错误类型
//!
//! 除 LlmError（模型后端传输失败）与 Cancelled 外，所有错误都在产生处就地降级：
//! 转为 ToolResult.is_error / CommandResult.error / 降级文本回填对话，不向上层循环抛出。

use thiserror::Error;

/// Agent 运行过程中可能出现的错误（会话、子进程、工具、解析等）
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Subprocess launch failed: {0}")]
    SpawnFailed(String),

    #[error("Command timed out after {0}s")]
    CommandTimeout(u64),

    #[error("Tool not registered: {0}")]
    ToolNotRegistered(String),

    #[error("Tool argument parse failed: {0}")]
    ArgumentParseError(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    /// 模型输出中缺少约定的结构（如期望的 ```json 块不存在）
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    /// 调用片段被流边界截断（arguments 不完整），不派发
    #[error("Tool call payload truncated: {0}")]
    TruncatedCall(String),

    /// 模型后端传输失败：唯一会终止当前轮次并上抛的错误
    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Cancelled")]
    Cancelled,
}
