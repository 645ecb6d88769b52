//! 工具调用请求与结果

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 从模型输出中提取的一次工具调用请求
///
/// 后端未提供独立 id 时，id 取 name。complete=false 表示调用片段被流边界截断
/// （arguments 不完整），只能恢复出 name，不会被派发。
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    pub complete: bool,
}

impl ToolCallRequest {
    pub fn complete(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            complete: true,
        }
    }

    pub fn truncated(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            arguments: Value::Object(serde_json::Map::new()),
            complete: false,
        }
    }
}

/// 一次工具派发的结果；每个请求恰好产生一个（含未注册、参数解析失败等情况）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(call_id: impl Into<String>, tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
            is_error: true,
        }
    }
}
