//! 任务项与模型输出中的 ```json 代码块
//!
//! 规划器 / 执行器 / 审查器都以围栏 JSON 块传递结构化结果；模型常把数字输出成
//! 字符串（"index": "1"），index / correlation / task_index 一律宽松解析。
//! 代码块整体缺失按「无新内容」处理，由调用方决定降级行为。

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::core::AgentError;

/// 单个子任务；identity 是 index，同 index 的两个任务项是同一逻辑任务的不同时点
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskItem {
    #[serde(deserialize_with = "flexible_i64")]
    pub index: i64,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub desc: String,
    /// 与最终答案的相关程度（1-5，5 最关键）
    #[serde(default = "default_correlation", deserialize_with = "flexible_i64")]
    pub correlation: i64,
    #[serde(default)]
    pub extra_info: String,
    /// 执行后回填的结果
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

fn default_correlation() -> i64 {
    3
}

/// 规划器输出块：{"finish": bool, "taskItems": [...]}
#[derive(Clone, Debug, Default, Deserialize)]
pub struct TaskListBlock {
    #[serde(default)]
    pub finish: bool,
    #[serde(default, rename = "taskItems")]
    pub task_items: Vec<TaskItem>,
}

/// 审查器输出块：{"finished": bool, "error": bool, "content": str, "rejectReason": str}
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ReviewVerdict {
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub error: bool,
    #[serde(default)]
    pub content: String,
    #[serde(default, rename = "rejectReason")]
    pub reject_reason: String,
}

impl Default for ReviewVerdict {
    /// 未检测到 json 代码块时的默认判定（视为通过）
    fn default() -> Self {
        Self {
            finished: true,
            error: false,
            content: String::new(),
            reject_reason: String::new(),
        }
    }
}

/// 执行器输出块：{"task_index", "status", "result", "reason"}
#[derive(Clone, Debug, Deserialize)]
pub struct ExecutionReport {
    #[serde(default, deserialize_with = "flexible_i64")]
    pub task_index: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub reason: String,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> bool {
        self.status.eq_ignore_ascii_case("success")
    }
}

/// 宽松整数解析：接受 JSON 数字或数字字符串
fn flexible_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let value = serde_json::Value::deserialize(deserializer)?;
    match &value {
        serde_json::Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| D::Error::custom(format!("not an integer: {}", n))),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| D::Error::custom(format!("not an integer: {} ({})", s, e))),
        other => Err(D::Error::custom(format!("expected integer, got {}", other))),
    }
}

/// 从文本中提取第一个 ```json 围栏代码块的内容
pub fn extract_json_block(text: &str) -> Option<String> {
    // 与规划/审查 prompt 约定一致：```json { ... } ```
    let re = Regex::new(r"(?s)```json\s*(\[.*?\]|\{.*?\})\s*```").expect("valid regex");
    re.captures(text).map(|c| c[1].to_string())
}

/// 解析规划器输出；缺少代码块或 JSON 非法返回 MalformedResponse，由调用方降级
pub fn parse_task_block(text: &str) -> Result<TaskListBlock, AgentError> {
    let block = extract_json_block(text)
        .ok_or_else(|| AgentError::MalformedResponse("no ```json task block".to_string()))?;
    serde_json::from_str(&block).map_err(|e| AgentError::MalformedResponse(e.to_string()))
}

/// 解析审查器输出；缺少代码块按默认判定（finished=true, error=false）处理
pub fn parse_review_block(text: &str) -> ReviewVerdict {
    match extract_json_block(text) {
        Some(block) => serde_json::from_str(&block).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "review block not valid JSON, using default verdict");
            ReviewVerdict::default()
        }),
        None => {
            tracing::warn!("no review block detected, using default verdict");
            ReviewVerdict::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_item_string_numbers() {
        let json = r#"{
            "index": "2",
            "task": "统计关键词",
            "goal": "生成频率表",
            "desc": "对第一步结果计数",
            "correlation": "5",
            "extra_info": ""
        }"#;
        let item: TaskItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.index, 2);
        assert_eq!(item.correlation, 5);
        assert!(item.result.is_none());
    }

    #[test]
    fn test_task_item_int_numbers() {
        let json = r#"{"index": 1, "task": "t", "goal": "g", "desc": "d", "correlation": 4, "extra_info": "x"}"#;
        let item: TaskItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.index, 1);
        assert_eq!(item.correlation, 4);
    }

    #[test]
    fn test_parse_task_block() {
        let text = r#"好的，计划如下：
```json
{"finish": false, "taskItems": [{"index": "1", "task": "查文件", "goal": "了解结构", "desc": "", "correlation": "5", "extra_info": ""}]}
```
后续将按结果继续规划。"#;
        let block = parse_task_block(text).unwrap();
        assert!(!block.finish);
        assert_eq!(block.task_items.len(), 1);
        assert_eq!(block.task_items[0].index, 1);
    }

    #[test]
    fn test_parse_task_block_absent() {
        let err = parse_task_block("没有任何代码块的普通回复").unwrap_err();
        assert!(matches!(err, AgentError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_review_block() {
        let text = r#"审查结论：
```json
{"finished": false, "error": false, "content": "", "rejectReason": "子任务 2 未覆盖边界情况"}
```"#;
        let verdict = parse_review_block(text);
        assert!(!verdict.finished);
        assert!(!verdict.error);
        assert_eq!(verdict.reject_reason, "子任务 2 未覆盖边界情况");
    }

    #[test]
    fn test_parse_review_block_absent_defaults_finished() {
        let verdict = parse_review_block("无代码块");
        assert!(verdict.finished);
        assert!(!verdict.error);
    }

    #[test]
    fn test_execution_report() {
        let text = r#"```json
{"task_index": "1", "status": "success", "result": "共 3 个文件", "reason": ""}
```"#;
        let block = extract_json_block(text).unwrap();
        let report: ExecutionReport = serde_json::from_str(&block).unwrap();
        assert!(report.succeeded());
        assert_eq!(report.task_index, 1);
        assert_eq!(report.result, "共 3 个文件");
    }

    #[test]
    fn test_extract_first_block_only() {
        let text = "```json\n{\"a\": 1}\n```\n然后\n```json\n{\"b\": 2}\n```";
        assert_eq!(extract_json_block(text).unwrap(), "{\"a\": 1}");
    }
}
