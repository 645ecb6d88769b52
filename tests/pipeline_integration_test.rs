//! 流水线集成测试：脚本化 Mock LLM 驱动 知识 -> 规划 -> 执行 -> 审查 全链

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use hive::agents::{ExecuteAgent, KnowledgeAgent, Pipeline, PlannerAgent, ReviewerAgent};
use hive::assistant::Assistant;
use hive::llm::MockLlmClient;
use hive::session::{CommandRunner, SessionRegistry};
use hive::tools::{
    CreateSessionTool, EchoTool, ExecuteCommandTool, ListSessionsTool, ReadOutputTool,
    ToolDispatcher, ToolRegistry,
};

/// 组装一条只依赖 Mock LLM 与 echo/会话工具的流水线
fn pipeline_with(script: Vec<&str>) -> (Pipeline, Arc<SessionRegistry>) {
    let registry = Arc::new(SessionRegistry::new());
    let runner = Arc::new(CommandRunner::new(registry.clone()));

    let mut tools = ToolRegistry::new();
    tools.register(EchoTool);
    tools.register(ExecuteCommandTool::new(runner, 10));
    tools.register(CreateSessionTool::new(registry.clone()));
    tools.register(ListSessionsTool::new(registry.clone()));
    tools.register(ReadOutputTool::new(registry.clone()));
    let dispatcher = Arc::new(ToolDispatcher::new(tools, 10));

    let llm = Arc::new(MockLlmClient::scripted(script));
    let assistant = Arc::new(Assistant::new(llm.clone(), dispatcher, 10));

    let pipeline = Pipeline::new(
        KnowledgeAgent::new(assistant.clone()),
        PlannerAgent::new(llm.clone()),
        ExecuteAgent::new(assistant),
        ReviewerAgent::new(llm),
        6,
    );
    (pipeline, registry)
}

#[tokio::test]
async fn test_full_chain_with_dynamic_replan() {
    let script = vec![
        // 知识智能体：无工具调用，直接给背景
        "工作区为空目录，当前无存活会话。",
        // 规划第一轮：先制定一个子任务，等结果再续规划
        "```json\n{\"finish\": false, \"taskItems\": [{\"index\": \"1\", \"task\": \"任务一原文\", \"goal\": \"g1\", \"desc\": \"d1\", \"correlation\": \"5\", \"extra_info\": \"\"}]}\n```",
        // 执行任务一
        "```json\n{\"task_index\": \"1\", \"status\": \"success\", \"result\": \"结果一\", \"reason\": \"\"}\n```",
        // 规划第二轮：重发 index 1（文本已改）并补充 index 2，宣告完成
        "```json\n{\"finish\": true, \"taskItems\": [{\"index\": \"1\", \"task\": \"任务一重写\", \"goal\": \"\", \"desc\": \"\", \"correlation\": \"3\", \"extra_info\": \"\"}, {\"index\": \"2\", \"task\": \"任务二\", \"goal\": \"g2\", \"desc\": \"d2\", \"correlation\": \"4\", \"extra_info\": \"\"}]}\n```",
        // 执行任务二：先调一次 echo 工具，再给结果块
        "<tool_call>{\"name\": \"echo\", \"arguments\": {\"text\": \"probe\"}}</tool_call>",
        "```json\n{\"task_index\": \"2\", \"status\": \"success\", \"result\": \"结果二\", \"reason\": \"\"}\n```",
        // 审查通过
        "```json\n{\"finished\": true, \"error\": false, \"content\": \"两个子任务均完成\", \"rejectReason\": \"\"}\n```",
    ];
    let (pipeline, _registry) = pipeline_with(script);

    let state = pipeline
        .run("统计并汇总", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(state.knowledge, "工作区为空目录，当前无存活会话。");
    assert_eq!(state.task_list.len(), 2);
    // 重规划重复 index 1：既有项为主，已执行的任务一不被替换
    assert_eq!(state.task_list[0].task, "任务一原文");
    assert_eq!(state.task_list[0].result.as_deref(), Some("结果一"));
    assert_eq!(state.task_list[1].task, "任务二");
    assert_eq!(state.task_list[1].result.as_deref(), Some("结果二"));
    assert_eq!(state.executed, vec![1, 2]);

    // echo 工具调用进入审计列表
    assert!(state
        .execution_results
        .iter()
        .any(|r| r.tool_name == "echo" && r.content == "probe"));

    let review = state.review.unwrap();
    assert!(review.finished);
    assert!(!review.error);
    assert_eq!(review.content, "两个子任务均完成");
}

#[tokio::test]
async fn test_review_rejection_triggers_replan() {
    let script = vec![
        "无需额外背景。",
        "```json\n{\"finish\": true, \"taskItems\": [{\"index\": 1, \"task\": \"初版任务\", \"goal\": \"\", \"desc\": \"\", \"correlation\": 3, \"extra_info\": \"\"}]}\n```",
        "```json\n{\"task_index\": 1, \"status\": \"success\", \"result\": \"初版结果\", \"reason\": \"\"}\n```",
        // 审查驳回
        "```json\n{\"finished\": false, \"error\": false, \"content\": \"\", \"rejectReason\": \"覆盖面不足\"}\n```",
        // 依据驳回理由补一个子任务
        "```json\n{\"finish\": true, \"taskItems\": [{\"index\": 2, \"task\": \"补充任务\", \"goal\": \"\", \"desc\": \"\", \"correlation\": 3, \"extra_info\": \"\"}]}\n```",
        "```json\n{\"task_index\": 2, \"status\": \"success\", \"result\": \"补充结果\", \"reason\": \"\"}\n```",
        "```json\n{\"finished\": true, \"error\": false, \"content\": \"补充后满足预期\", \"rejectReason\": \"\"}\n```",
    ];
    let (pipeline, _registry) = pipeline_with(script);

    let state = pipeline.run("demo", CancellationToken::new()).await.unwrap();

    assert_eq!(state.task_list.len(), 2);
    assert_eq!(state.task_list[0].result.as_deref(), Some("初版结果"));
    assert_eq!(state.task_list[1].result.as_deref(), Some("补充结果"));
    let review = state.review.unwrap();
    assert!(review.finished);
    assert_eq!(review.content, "补充后满足预期");
    // 驳回理由被喂回了规划对话
    assert!(state
        .messages
        .iter()
        .any(|m| m.content.contains("覆盖面不足")));
}

#[tokio::test]
async fn test_pipeline_drives_command_session_tools() {
    let script = vec![
        // 知识智能体先列会话再总结（一次工具轮 + 一次总结轮）
        "<tool_call>{\"name\": \"list_sessions\", \"arguments\": {}}</tool_call>",
        "当前无存活会话。",
        "```json\n{\"finish\": true, \"taskItems\": [{\"index\": 1, \"task\": \"执行 echo 命令\", \"goal\": \"\", \"desc\": \"\", \"correlation\": 5, \"extra_info\": \"\"}]}\n```",
        // 执行器通过 execute_command 真正跑一条命令
        "<tool_call>{\"name\": \"execute_command\", \"arguments\": {\"command\": \"echo from_pipeline\", \"path\": \".\"}}</tool_call>",
        "```json\n{\"task_index\": 1, \"status\": \"success\", \"result\": \"命令已执行\", \"reason\": \"\"}\n```",
        "```json\n{\"finished\": true, \"error\": false, \"content\": \"完成\", \"rejectReason\": \"\"}\n```",
    ];
    let (pipeline, registry) = pipeline_with(script);

    let state = pipeline.run("跑一条命令", CancellationToken::new()).await.unwrap();

    // execute_command 自动新建了会话并留下审计记录
    let sessions = registry.list();
    assert_eq!(sessions.len(), 1);
    let session = registry.snapshot(&sessions[0].sessionid).unwrap();
    assert_eq!(session.history.len(), 1);
    assert!(session.output.iter().any(|l| l.contains("from_pipeline")));

    assert_eq!(state.task_list[0].result.as_deref(), Some("命令已执行"));
    assert!(state
        .execution_results
        .iter()
        .any(|r| r.tool_name == "execute_command" && r.content.contains("from_pipeline")));
}

#[tokio::test]
async fn test_plan_round_cap_is_reported_not_fatal() {
    // 规划器永远 finish=false 且不产出新任务：只能靠轮数上限收尾
    let script = vec![
        "背景。",
        "```json\n{\"finish\": false, \"taskItems\": []}\n```",
        "```json\n{\"finish\": false, \"taskItems\": []}\n```",
        "```json\n{\"finish\": false, \"taskItems\": []}\n```",
        "```json\n{\"finish\": false, \"taskItems\": []}\n```",
        "```json\n{\"finish\": false, \"taskItems\": []}\n```",
        "```json\n{\"finish\": false, \"taskItems\": []}\n```",
    ];
    let (pipeline, _registry) = pipeline_with(script);

    let state = pipeline.run("永不收敛", CancellationToken::new()).await.unwrap();
    // 未 panic、未报错，审查从未运行
    assert!(state.review.is_none());
    assert!(state.task_list.is_empty());
}
