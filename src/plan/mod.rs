//! 任务清单层：任务项数据模型、```json 代码块解析、按 index 合并

pub mod reconcile;
pub mod task;

pub use reconcile::merge_task_lists;
pub use task::{
    extract_json_block, parse_review_block, parse_task_block, ExecutionReport, ReviewVerdict,
    TaskItem, TaskListBlock,
};
