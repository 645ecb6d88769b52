//! 知识智能体：为任务收集前置背景知识
//!
//! 带工具的对话循环：调用 list_sessions / 文件系统 / 网页工具获取必要信息，
//! 最终叙述内容即背景知识，写入 state.knowledge 供规划器使用。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::agents::AgentState;
use crate::assistant::Assistant;
use crate::core::AgentError;
use crate::llm::Message;

const SYSTEM_PROMPT: &str = "你是一个用于软件开发支持的前置知识分析助手。
用户希望你分析当前任务中可能需要的基础前置信息，例如文件结构、配置、关键代码文件、依赖说明等，并通过调用工具获取必要的信息。
前置信息仅作为基础知识背景或处理依据，提取必要的信息即可，不需要详细、全面。
若用户明确要求调用工具完成什么命令，则你可以直接完成。
完成工具调用后，你需要整理所有信息，将其汇总为知识文档。

**注意**
- 大多数情况你都需要调用 list_sessions 工具列举出当前存活的 session，以供后续使用";

/// 知识智能体：持有带工具的对话循环
pub struct KnowledgeAgent {
    assistant: Arc<Assistant>,
}

impl KnowledgeAgent {
    pub fn new(assistant: Arc<Assistant>) -> Self {
        Self { assistant }
    }

    /// 收集背景知识并写入 state.knowledge
    pub async fn acquire(
        &self,
        state: &mut AgentState,
        cancel_token: CancellationToken,
    ) -> Result<(), AgentError> {
        state.node = "knowledge".to_string();

        let request = format!(
            "请为任务提供前置知识或必要准备，并调用工具获取相关信息：\n任务：{}",
            state.user_task
        );
        let outcome = self
            .assistant
            .run(SYSTEM_PROMPT, vec![Message::user(request)], cancel_token)
            .await?;

        tracing::info!(knowledge = %outcome.response, "knowledge acquired");
        state.knowledge = outcome.response;
        state.execution_results.extend(outcome.tool_results);
        Ok(())
    }
}
