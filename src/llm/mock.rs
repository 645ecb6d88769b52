//! Mock LLM 客户端（用于测试，无需 API）
//!
//! 两种用法：scripted 按序弹出预置回复（驱动多轮循环测试）；
//! 脚本耗尽或未设置时，回显最后一条 User 消息为 `<tool_call>` echo 调用。

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use crate::llm::{LlmClient, Message, Role};

/// Mock 客户端：预置脚本或回显用户最后一条消息
#[derive(Debug, Default)]
pub struct MockLlmClient {
    script: Mutex<VecDeque<String>>,
}

impl MockLlmClient {
    /// 预置一组按序返回的回复
    pub fn scripted(responses: Vec<impl Into<String>>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return Ok(next);
        }

        let last_user = messages
            .iter()
            .rev()
            .find(|m| matches!(m.role, Role::User))
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(format!(
            "<tool_call>\n{{\"name\": \"echo\", \"arguments\": {{\"text\": \"Echo from Mock: {}\"}}}}\n</tool_call>",
            last_user.replace('"', "'")
        ))
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
    ) -> Result<Pin<Box<dyn futures_util::Stream<Item = Result<String, String>> + Send>>, String>
    {
        let content = self.complete(messages).await?;
        Ok(Box::pin(stream::iter(vec![Ok(content)])))
    }
}
