//! 主流水线：知识 -> (规划 -> 执行)* -> 审查
//!
//! 单线程协作式推进：一个节点完整跑完才进入下一个。规划-执行循环直到规划器宣告
//! finish；审查不通过（finished=false）则带着 rejectReason 回到规划。
//! 整体轮数受 max_plan_rounds 上限约束，超限是上报的结果而非错误。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::agents::{AgentState, ExecuteAgent, KnowledgeAgent, PlannerAgent, ReviewerAgent};
use crate::assistant::Assistant;
use crate::config::AppConfig;
use crate::core::AgentError;
use crate::llm::{LlmClient, Message};
use crate::session::{CommandRunner, SessionRegistry};
use crate::tools::{
    CreateSessionTool, DeleteFileTool, EchoTool, ExecuteCommandTool, ListDirTool,
    ListSessionsTool, QueryUrlTool, ReadFileLinesTool, ReadOutputTool, ReplaceInFileTool, SafeFs,
    SearchWebTool, ToolDispatcher, ToolRegistry, TreeDirTool, WriteFileTool,
};

/// 流水线：四个智能体的编排器
pub struct Pipeline {
    knowledge: KnowledgeAgent,
    planner: PlannerAgent,
    executor: ExecuteAgent,
    reviewer: ReviewerAgent,
    max_plan_rounds: usize,
}

impl Pipeline {
    pub fn new(
        knowledge: KnowledgeAgent,
        planner: PlannerAgent,
        executor: ExecuteAgent,
        reviewer: ReviewerAgent,
        max_plan_rounds: usize,
    ) -> Self {
        Self {
            knowledge,
            planner,
            executor,
            reviewer,
            max_plan_rounds,
        }
    }

    /// 驱动整条链直至审查通过或触达轮数上限，返回最终状态
    pub async fn run(
        &self,
        user_task: &str,
        cancel_token: CancellationToken,
    ) -> Result<AgentState, AgentError> {
        let mut state = AgentState::new(user_task);

        self.knowledge.acquire(&mut state, cancel_token.clone()).await?;

        let mut rounds = 0;
        loop {
            if cancel_token.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            if rounds >= self.max_plan_rounds {
                tracing::warn!(max_plan_rounds = self.max_plan_rounds, "planning loop hit round cap");
                break;
            }
            rounds += 1;

            self.planner.plan(&mut state).await?;
            self.executor.run(&mut state, cancel_token.clone()).await?;

            // 规划未完结：带着执行结果回到规划器动态续规划
            if !state.task_finish {
                let progress = serde_json::to_string(&state.task_list)
                    .unwrap_or_else(|_| "[]".to_string());
                state.messages.push(Message::user(format!(
                    "以下子任务已执行完成，结果如下：\n{}\n请继续制定后续子任务，或确认制定完成。",
                    progress
                )));
                continue;
            }

            self.reviewer.review(&mut state).await?;
            let (finished, reject_reason) = state
                .review
                .as_ref()
                .map(|v| (v.finished, v.reject_reason.clone()))
                .unwrap_or((true, String::new()));
            if finished {
                break;
            }
            // 审查驳回：把理由喂回规划对话重新规划
            tracing::info!(reject = %reject_reason, "review rejected, replanning");
            state.messages.push(Message::user(format!(
                "审查专家认为当前结果不满足用户任务，原因：{}\n请据此调整并重新制定子任务。",
                reject_reason
            )));
            state.task_finish = false;
        }

        Ok(state)
    }
}

/// 按配置组装整个运行时：会话注册表、工具箱、四个智能体
///
/// 返回流水线与会话注册表（后者供外部查询审计信息）。
pub fn build_pipeline(cfg: &AppConfig, llm: Arc<dyn LlmClient>) -> (Pipeline, Arc<SessionRegistry>) {
    let registry = Arc::new(SessionRegistry::new());
    let runner = Arc::new(CommandRunner::new(registry.clone()));

    // 工作目录：tools.filesystem_root > app.workspace_root > ./workspace
    let workspace = cfg
        .tools
        .filesystem_root
        .clone()
        .or_else(|| cfg.app.workspace_root.clone())
        .unwrap_or_else(|| std::path::PathBuf::from("workspace"));
    std::fs::create_dir_all(&workspace).ok();
    let fs = SafeFs::new(&workspace);

    let mut tools = ToolRegistry::new();
    tools.register(ExecuteCommandTool::new(
        runner.clone(),
        cfg.tools.command.timeout_secs,
    ));
    tools.register(CreateSessionTool::new(registry.clone()));
    tools.register(ListSessionsTool::new(registry.clone()));
    tools.register(ReadOutputTool::new(registry.clone()));
    tools.register(ListDirTool::new(fs.clone()));
    tools.register(ReadFileLinesTool::new(fs.clone()));
    tools.register(WriteFileTool::new(fs.clone()));
    tools.register(DeleteFileTool::new(fs.clone()));
    tools.register(ReplaceInFileTool::new(fs.clone()));
    tools.register(TreeDirTool::new(fs));
    tools.register(QueryUrlTool::new(
        cfg.tools.web.timeout_secs,
        cfg.tools.web.max_result_chars,
    ));
    tools.register(SearchWebTool::new(
        cfg.tools.web.timeout_secs,
        cfg.tools.web.topn,
    ));
    tools.register(EchoTool);

    let dispatcher = Arc::new(ToolDispatcher::new(tools, cfg.tools.tool_timeout_secs));
    let assistant = Arc::new(Assistant::new(
        llm.clone(),
        dispatcher,
        cfg.chat.max_rounds,
    ));

    let pipeline = Pipeline::new(
        KnowledgeAgent::new(assistant.clone()),
        PlannerAgent::new(llm.clone()),
        ExecuteAgent::new(assistant),
        ReviewerAgent::new(llm),
        cfg.app.max_plan_rounds,
    );
    (pipeline, registry)
}
