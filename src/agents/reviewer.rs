//! 审查智能体：对整条执行链做终审
//!
//! 只审查不执行：拿用户任务、子任务清单与执行结果判断是否达成预期，输出
//! {"finished", "error", "content", "rejectReason"} 判定块；finished=false 时
//! 规划器将依据 rejectReason 重新规划。块缺失按通过处理（默认判定）。

use std::sync::Arc;

use crate::agents::AgentState;
use crate::core::AgentError;
use crate::llm::{LlmClient, Message};
use crate::plan::parse_review_block;

const SYSTEM_PROMPT: &str = r#"你是一个代码开发任务的审查专家，你要对当前任务的执行结果进行审核。你禁止回答问题或帮助执行工具，仅被允许根据上下文做出审查。
整体流程：用户下达任务 ->> 规划器拆分任务 ->> 工具执行 ->> 审查专家。
你将获得用户原始问题、规划器拆分的子任务与各自的执行结果。你需要判断最终是否能完成用户下达的任务且符合预期：
如果不能，给出理由及调整建议，规划器将根据你的输出重新制定子任务；
如果可以，总结以上所有信息，你的总结将直接回传给用户。
如果规划器因某些报错无法继续执行且你认为无法修复，则 finished 设置为 true 且 error 为 true。

**输出格式**
```json
{
    "finished": bool,
    "error": bool,
    "content": "总结并回答用户原始问题",
    "rejectReason": "不通过的原因"
}
```
content 和 rejectReason 只能有一个有值。"#;

/// 审查智能体：持有 LLM（无工具）
pub struct ReviewerAgent {
    llm: Arc<dyn LlmClient>,
}

impl ReviewerAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 审查执行结果，判定写入 state.review
    pub async fn review(&self, state: &mut AgentState) -> Result<(), AgentError> {
        state.node = "review".to_string();

        let summary = serde_json::to_string_pretty(&state.task_list)
            .unwrap_or_else(|_| "[]".to_string());
        let mut messages = vec![Message::system(SYSTEM_PROMPT)];
        messages.push(Message::user(format!(
            "用户原始任务：{}\n\n子任务清单与执行结果：\n{}",
            state.user_task, summary
        )));

        let output = self
            .llm
            .complete(&messages)
            .await
            .map_err(AgentError::LlmError)?;

        let verdict = parse_review_block(&output);
        tracing::info!(
            finished = verdict.finished,
            error = verdict.error,
            "review verdict"
        );
        state.review = Some(verdict);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[tokio::test]
    async fn test_review_rejection() {
        let agent = ReviewerAgent::new(Arc::new(MockLlmClient::scripted(vec![
            "```json\n{\"finished\": false, \"error\": false, \"content\": \"\", \"rejectReason\": \"缺少对子目录的统计\"}\n```",
        ])));
        let mut state = AgentState::new("统计文件数");
        agent.review(&mut state).await.unwrap();
        let verdict = state.review.unwrap();
        assert!(!verdict.finished);
        assert_eq!(verdict.reject_reason, "缺少对子目录的统计");
    }

    #[tokio::test]
    async fn test_review_without_block_passes() {
        let agent = ReviewerAgent::new(Arc::new(MockLlmClient::scripted(vec![
            "看起来一切正常。",
        ])));
        let mut state = AgentState::new("t");
        agent.review(&mut state).await.unwrap();
        let verdict = state.review.unwrap();
        assert!(verdict.finished);
        assert!(!verdict.error);
    }
}
