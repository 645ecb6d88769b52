//! 规划智能体：把任务拆解为带 index 的子任务清单
//!
//! 不调用工具，直接取模型回复中的 ```json 块（{"finish", "taskItems"}）；
//! 代码块缺失或非法按「本轮无新任务」降级。新产出的清单与既有清单按 index 合并，
//! 既有清单为主（已执行的任务不会被重规划冲掉），见 plan::reconcile。

use std::sync::Arc;

use crate::agents::AgentState;
use crate::core::AgentError;
use crate::llm::{LlmClient, Message};
use crate::plan::{merge_task_lists, parse_task_block};

const SYSTEM_PROMPT: &str = r#"你是 **PlannerAgent**，唯一职责是 **制定任务计划**。在你之前存在一个背景知识专家，他提供与用户需求相关的已知事实，你应默认其真实有效，不得生成“查询/验证”任务。
你需要把用户需求和背景知识拆解成可执行的子任务；若需要依赖某个子任务的执行结果来动态制定后续计划，可先制定确定的子任务，等结果返回后再制定后续子任务。
子任务必须独立可执行且服务于最终任务目标；执行者只能看到分配给它的 `task`、`goal`、`desc`、`extra_info`，无法感知其他子任务或其结果，需要的上下文必须在这些字段中明确提供。
子任务索引 `index` 严格递增，表示执行顺序。

输出结构为：

```json
{
  "finish": false,
  "taskItems": [
    {
      "index": "1",
      "task": "任务内容",
      "goal": "任务目标",
      "desc": "任务详细描述或说明",
      "correlation": "相关性数值（1-5）",
      "extra_info": "附加说明或信息"
    }
  ]
}
```

- `finish`：true 表示所有子任务制定完成，根据子任务执行结果可以推导最终答案；false 表示还有后续子任务需要动态生成。
- `taskItems`：子任务列表，每个子任务独立可执行。"#;

/// 规划智能体：持有 LLM，维护跨轮规划对话
pub struct PlannerAgent {
    llm: Arc<dyn LlmClient>,
}

impl PlannerAgent {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 规划一轮：产出任务块并合并进 state.task_list
    pub async fn plan(&self, state: &mut AgentState) -> Result<(), AgentError> {
        state.node = "plan".to_string();

        // 首轮：注入背景知识与用户任务
        if state.messages.is_empty() {
            state.messages.push(Message::user(format!(
                "以下是其他专家给出的背景知识:\n{}\n--- \n*用户任务*：{}",
                state.knowledge, state.user_task
            )));
        }

        let mut messages = vec![Message::system(SYSTEM_PROMPT)];
        messages.extend(state.messages.iter().cloned());
        let output = self
            .llm
            .complete(&messages)
            .await
            .map_err(AgentError::LlmError)?;
        state.messages.push(Message::assistant(output.clone()));

        let block = match parse_task_block(&output) {
            Ok(block) => block,
            Err(e) => {
                // 无新任务，本轮规划视为空产出
                tracing::warn!(error = %e, "planner output had no task block");
                Default::default()
            }
        };
        state.task_finish = block.finish;
        state.task_list = merge_task_lists(&state.task_list, &block.task_items);
        tracing::info!(
            tasks = state.task_list.len(),
            finish = state.task_finish,
            "plan round merged"
        );
        Ok(())
    }
}
