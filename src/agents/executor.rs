//! 执行智能体：逐项完成规划器下发的子任务
//!
//! 每个未执行的子任务跑一次带工具的对话循环，从最终叙述中取
//! {"task_index", "status", "result", "reason"} 块回填 task.result；
//! 块缺失时以叙述全文降级回填。已执行过的 index 不重复执行。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::agents::AgentState;
use crate::assistant::Assistant;
use crate::core::AgentError;
use crate::llm::Message;
use crate::plan::{extract_json_block, ExecutionReport};

const SYSTEM_PROMPT: &str = r#"你是多智能体系统中的 **执行智能体**，规划智能体是你的上级，会给你下发子任务，完成后结果将返回给规划智能体。
你只关注当前子任务，不做全局规划，不处理与当前子任务无关的内容。
遵循 思考 -> 计划 -> 执行 -> 总结 四步：理解子任务目标；制定最优方案；灵活完成任务（工具调用不是必需的，只有在最优时才使用，工具返回异常可自我修正并重试）；校验结果是否满足子任务目标。

**输出格式**

```json
{
  "task_index": "1",
  "status": "success",
  "result": "str 具体结果或数据",
  "reason": ""
}
```

status 为 success / failed；如果失败或部分完成，在 reason 中写原因。"#;

const HUMAN_TEMPLATE: &str = r#"## 原始任务

{task}

## 背景知识

{knowledge}

## 子任务信息

{subtask}
"#;

/// 执行失败且未给原因时的占位
const UNKNOWN_FAILURE: &str = "未知原因失败";

/// 执行智能体：持有带工具的对话循环
pub struct ExecuteAgent {
    assistant: Arc<Assistant>,
}

impl ExecuteAgent {
    pub fn new(assistant: Arc<Assistant>) -> Self {
        Self { assistant }
    }

    /// 执行全部待办子任务，结果与审计写回 state
    pub async fn run(
        &self,
        state: &mut AgentState,
        cancel_token: CancellationToken,
    ) -> Result<(), AgentError> {
        state.node = "execute".to_string();

        for index in state.pending_indices() {
            let Some(position) = state.task_list.iter().position(|t| t.index == index) else {
                continue;
            };
            let subtask = serde_json::json!({
                "index": state.task_list[position].index,
                "task": state.task_list[position].task,
                "goal": state.task_list[position].goal,
                "desc": state.task_list[position].desc,
                "extra_info": state.task_list[position].extra_info,
            });
            let human = HUMAN_TEMPLATE
                .replace("{task}", &state.user_task)
                .replace("{knowledge}", &state.knowledge)
                .replace("{subtask}", &subtask.to_string());

            let outcome = self
                .assistant
                .run(SYSTEM_PROMPT, vec![Message::user(human)], cancel_token.clone())
                .await?;

            let result = match extract_json_block(&outcome.response)
                .and_then(|b| serde_json::from_str::<ExecutionReport>(&b).ok())
            {
                Some(report) if report.succeeded() => report.result,
                Some(report) => {
                    if report.reason.is_empty() {
                        UNKNOWN_FAILURE.to_string()
                    } else {
                        report.reason
                    }
                }
                None => {
                    // 结果块缺失：叙述全文降级回填
                    tracing::warn!(index, "execute output had no report block, using narrative");
                    outcome.response.clone()
                }
            };

            tracing::info!(index, result = %result, "subtask executed");
            state.task_list[position].result = Some(result);
            state.executed.push(index);
            state.execution_results.extend(outcome.tool_results);
        }
        Ok(())
    }
}
