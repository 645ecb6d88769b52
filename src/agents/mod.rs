//! 智能体层：知识 / 规划 / 执行 / 审查四个智能体与主流水线
//!
//! 各智能体通过共享的 AgentState 协作：KnowledgeAgent 产出背景知识，
//! PlannerAgent 产出并合并任务清单，ExecuteAgent 逐项执行并回填结果，
//! ReviewerAgent 给出终审判定；Pipeline 按 知识 -> (规划 -> 执行)* -> 审查 驱动。

pub mod executor;
pub mod knowledge;
pub mod pipeline;
pub mod planner;
pub mod reviewer;
pub mod state;

pub use executor::ExecuteAgent;
pub use knowledge::KnowledgeAgent;
pub use pipeline::{build_pipeline, Pipeline};
pub use planner::PlannerAgent;
pub use reviewer::ReviewerAgent;
pub use state::AgentState;
