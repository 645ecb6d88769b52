//! 对话主循环
//!
//! 一轮 = 模型调用 -> 流式解析 -> 分发 complete 调用 -> 结果回填对话；
//! 某轮没有任何 complete 调用即结束（截断调用不派发，下一轮模型输出会给出完整版本）。
//! 轮数受 max_rounds 上限约束，超限是上报的结果而非错误；
//! 只有模型后端传输失败会让本轮以 Err 终止。

use std::sync::Arc;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::assistant::fncall_system_prompt;
use crate::core::AgentError;
use crate::llm::{LlmClient, Message};
use crate::protocol::{parse_response, ToolResult};
use crate::tools::ToolDispatcher;

/// 对话循环执行结果
#[derive(Debug)]
pub struct ChatOutcome {
    /// 最后一轮的叙述内容（工具调用标记之外的文本）
    pub response: String,
    /// 完整对话（含 assistant 原始输出与 tool 结果消息）
    pub messages: Vec<Message>,
    /// 全部派发结果（审计用，每个 complete 请求恰好一条）
    pub tool_results: Vec<ToolResult>,
    /// 实际执行的轮数
    pub rounds: usize,
    /// 是否因触达轮数上限而结束
    pub capped: bool,
}

/// 对话循环：持有 LLM、工具分发器与轮数上限
pub struct Assistant {
    llm: Arc<dyn LlmClient>,
    dispatcher: Arc<ToolDispatcher>,
    max_rounds: usize,
}

impl Assistant {
    pub fn new(llm: Arc<dyn LlmClient>, dispatcher: Arc<ToolDispatcher>, max_rounds: usize) -> Self {
        Self {
            llm,
            dispatcher,
            max_rounds,
        }
    }

    pub fn dispatcher(&self) -> &Arc<ToolDispatcher> {
        &self.dispatcher
    }

    /// 运行对话循环直至某轮无 complete 调用或触达轮数上限
    ///
    /// base_system 为该智能体的基础 prompt，工具签名块在此注入。
    pub async fn run(
        &self,
        base_system: &str,
        user_messages: Vec<Message>,
        cancel_token: CancellationToken,
    ) -> Result<ChatOutcome, AgentError> {
        let system = fncall_system_prompt(base_system, self.dispatcher.registry());
        let mut messages = Vec::with_capacity(user_messages.len() + 1);
        messages.push(Message::system(system));
        messages.extend(user_messages);

        let mut tool_results: Vec<ToolResult> = Vec::new();
        let mut response = String::new();
        let mut rounds = 0;
        let mut capped = false;

        loop {
            if cancel_token.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            if rounds >= self.max_rounds {
                tracing::warn!(max_rounds = self.max_rounds, "chat loop hit round cap");
                capped = true;
                break;
            }

            let output = self.call_model(&messages).await?;
            rounds += 1;

            let parsed = parse_response(&output);
            if parsed.degraded > 0 {
                tracing::warn!(degraded = parsed.degraded, round = rounds, "degraded tool call parses this round");
            }
            if !parsed.narrative.trim().is_empty() {
                response = parsed.narrative.trim().to_string();
            }
            // 原始输出整体入史，含调用标记
            messages.push(Message::assistant(output.clone()));

            let complete: Vec<_> = parsed
                .calls
                .iter()
                .filter(|c| c.complete)
                .cloned()
                .collect();
            let truncated = parsed.calls.len() - complete.len();
            if truncated > 0 {
                tracing::debug!(truncated, round = rounds, "truncated calls left for next round");
            }

            // 本轮无可派发调用即结束
            if complete.is_empty() {
                break;
            }

            let results = self.dispatcher.dispatch(&complete).await;
            for r in &results {
                messages.push(Message::tool(
                    &r.call_id,
                    format!("<tool_response>\n{}\n</tool_response>", r.content),
                ));
            }
            tool_results.extend(results);
        }

        Ok(ChatOutcome {
            response,
            messages,
            tool_results,
            rounds,
            capped,
        })
    }

    /// 调用模型并累积流式输出；对增长中的缓冲区反复解析，跟踪新出现的完整调用
    async fn call_model(&self, messages: &[Message]) -> Result<String, AgentError> {
        let mut stream = self
            .llm
            .complete_stream(messages)
            .await
            .map_err(AgentError::LlmError)?;

        let mut buffer = String::new();
        let mut seen_complete = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(AgentError::LlmError)?;
            buffer.push_str(&chunk);
            let n = parse_response(&buffer).complete_calls();
            if n > seen_complete {
                tracing::debug!(complete_calls = n, "stream produced new complete call");
                seen_complete = n;
            }
        }
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::tools::{EchoTool, ToolDispatcher, ToolRegistry};

    fn assistant_with(script: Vec<&str>, max_rounds: usize) -> Assistant {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        let dispatcher = Arc::new(ToolDispatcher::new(registry, 5));
        let llm = Arc::new(MockLlmClient::scripted(script));
        Assistant::new(llm, dispatcher, max_rounds)
    }

    #[tokio::test]
    async fn test_plain_response_one_round() {
        let assistant = assistant_with(vec!["任务完成，无需工具。"], 10);
        let outcome = assistant
            .run("system", vec![Message::user("hi")], CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.rounds, 1);
        assert_eq!(outcome.response, "任务完成，无需工具。");
        assert!(outcome.tool_results.is_empty());
        assert!(!outcome.capped);
    }

    #[tokio::test]
    async fn test_two_complete_one_truncated_dispatches_two() {
        let round1 = concat!(
            "先做两件事。\n",
            "<tool_call>{\"name\": \"echo\", \"arguments\": {\"text\": \"one\"}}</tool_call>\n",
            "<tool_call>{\"name\": \"echo\", \"arguments\": {\"text\": \"two\"}}</tool_call>\n",
            "<tool_call>{\"name\": \"echo\", \"arguments\": {\"text\": \"thr"
        );
        let assistant = assistant_with(vec![round1, "全部完成。"], 10);
        let outcome = assistant
            .run("system", vec![Message::user("go")], CancellationToken::new())
            .await
            .unwrap();

        // 截断调用不派发；两个完整调用各产生一条结果后回到模型
        assert_eq!(outcome.tool_results.len(), 2);
        assert!(outcome.tool_results.iter().all(|r| !r.is_error));
        assert_eq!(outcome.rounds, 2);
        assert_eq!(outcome.response, "全部完成。");

        let tool_messages: Vec<_> = outcome
            .messages
            .iter()
            .filter(|m| matches!(m.role, crate::llm::Role::Tool))
            .collect();
        assert_eq!(tool_messages.len(), 2);
        assert!(tool_messages[0].content.contains("<tool_response>"));
    }

    #[tokio::test]
    async fn test_truncated_only_round_ends_loop() {
        let assistant = assistant_with(
            vec!["<tool_call>{\"name\": \"echo\", \"arguments\": {\"text\": \"cut"],
            10,
        );
        let outcome = assistant
            .run("system", vec![Message::user("go")], CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.rounds, 1);
        assert!(outcome.tool_results.is_empty());
    }

    #[tokio::test]
    async fn test_round_cap_reported_not_fatal() {
        // 空脚本 -> Mock 永远回显 echo 调用，循环只能被上限终止
        let assistant = assistant_with(vec![], 3);
        let outcome = assistant
            .run("system", vec![Message::user("loop")], CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.capped);
        assert_eq!(outcome.rounds, 3);
        assert_eq!(outcome.tool_results.len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_round() {
        let assistant = assistant_with(vec!["ignored"], 10);
        let token = CancellationToken::new();
        token.cancel();
        let err = assistant
            .run("system", vec![Message::user("hi")], token)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
    }

    #[tokio::test]
    async fn test_unknown_tool_folds_error_and_continues() {
        let round1 = "<tool_call>{\"name\": \"no_such_tool\", \"arguments\": {}}</tool_call>";
        let assistant = assistant_with(vec![round1, "收到错误，结束。"], 10);
        let outcome = assistant
            .run("system", vec![Message::user("go")], CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.tool_results.len(), 1);
        assert!(outcome.tool_results[0].is_error);
        // 错误作为普通工具输出回填，循环继续到下一轮
        assert_eq!(outcome.rounds, 2);
        assert_eq!(outcome.response, "收到错误，结束。");
    }
}
