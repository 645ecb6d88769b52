//! 智能体链共享的可变任务状态

use crate::llm::Message;
use crate::plan::{ReviewVerdict, TaskItem};
use crate::protocol::ToolResult;

/// 流水线各节点共同读写的状态
#[derive(Debug, Default)]
pub struct AgentState {
    /// 用户原始任务
    pub user_task: String,
    /// 当前所处节点（knowledge / plan / execute / review）
    pub node: String,
    /// 知识智能体产出的背景知识
    pub knowledge: String,
    /// 累积的任务清单（按 index 升序，合并语义见 plan::reconcile）
    pub task_list: Vec<TaskItem>,
    /// 已执行任务的 index，重规划后不重复执行
    pub executed: Vec<i64>,
    /// 规划器是否宣告子任务制定完成
    pub task_finish: bool,
    /// 审查判定
    pub review: Option<ReviewVerdict>,
    /// 规划对话历史（跨规划轮次累积）
    pub messages: Vec<Message>,
    /// 全部工具派发结果（审计）
    pub execution_results: Vec<ToolResult>,
}

impl AgentState {
    pub fn new(user_task: impl Into<String>) -> Self {
        Self {
            user_task: user_task.into(),
            ..Default::default()
        }
    }

    /// 尚未执行的任务 index（升序）
    pub fn pending_indices(&self) -> Vec<i64> {
        self.task_list
            .iter()
            .map(|t| t.index)
            .filter(|i| !self.executed.contains(i))
            .collect()
    }
}
