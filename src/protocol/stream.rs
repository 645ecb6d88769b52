//! 流式 `<tool_call>` 协议解析
//!
//! 模型输出是一段只增不减的文本，自由叙述中穿插 `<tool_call>{...}</tool_call>` 标记。
//! 解析器是整个缓冲区上的纯函数，可在流式累积过程中对同一缓冲区反复调用；
//! 首个开标记之前的文本为叙述内容，之后按「先到的闭标记生效」切出各调用载荷。
//! 载荷严格 JSON 解析失败时，退化为仅提取 name 的字面标记扫描（degraded 计数上报，
//! 用于暴露上游格式漂移）；闭标记缺失（流被截断）时同样只恢复 name，产出
//! complete=false 的请求，不视为错误。

use serde::Deserialize;
use serde_json::Value;

use crate::protocol::ToolCallRequest;

pub const TOOL_CALL_OPEN: &str = "<tool_call>";
pub const TOOL_CALL_CLOSE: &str = "</tool_call>";

/// 一次解析的产物：叙述前缀 + 按出现顺序排列的调用请求
#[derive(Clone, Debug, Default)]
pub struct ParsedResponse {
    pub narrative: String,
    pub calls: Vec<ToolCallRequest>,
    /// 严格解析失败、走了字面扫描回退的载荷数
    pub degraded: usize,
}

impl ParsedResponse {
    /// 本次解析中 complete=true 的调用数
    pub fn complete_calls(&self) -> usize {
        self.calls.iter().filter(|c| c.complete).count()
    }
}

/// 载荷的严格结构：{"name": ..., "arguments": ...}；id 缺省取 name
#[derive(Deserialize)]
struct RawCall {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// 解析整个输出缓冲区
pub fn parse_response(buffer: &str) -> ParsedResponse {
    let mut parsed = ParsedResponse::default();

    let Some(first_open) = buffer.find(TOOL_CALL_OPEN) else {
        // 无任何标记：整段是叙述
        parsed.narrative = buffer.to_string();
        return parsed;
    };
    parsed.narrative = buffer[..first_open].to_string();

    let mut pos = first_open;
    while let Some(open_rel) = buffer[pos..].find(TOOL_CALL_OPEN) {
        let payload_start = pos + open_rel + TOOL_CALL_OPEN.len();
        match buffer[payload_start..].find(TOOL_CALL_CLOSE) {
            Some(close_rel) => {
                // 先到的闭标记生效：载荷内部再出现的开标记按字面内容处理
                let payload = &buffer[payload_start..payload_start + close_rel];
                if let Some(call) = parse_payload(payload, &mut parsed.degraded) {
                    parsed.calls.push(call);
                }
                pos = payload_start + close_rel + TOOL_CALL_CLOSE.len();
            }
            None => {
                // 流在调用中途被截断：尽力恢复 name，不报错
                let payload = &buffer[payload_start..];
                if let Some(name) = extract_name(payload) {
                    parsed.calls.push(ToolCallRequest::truncated(name));
                }
                break;
            }
        }
    }

    parsed
}

/// 解析单个闭合载荷：严格 JSON 优先，失败则字面扫描回退
fn parse_payload(payload: &str, degraded: &mut usize) -> Option<ToolCallRequest> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<RawCall>(trimmed) {
        Ok(raw) if !raw.name.is_empty() => {
            let arguments = match raw.arguments {
                Value::Null => Value::Object(serde_json::Map::new()),
                other => other,
            };
            let id = raw.id.unwrap_or_else(|| raw.name.clone());
            Some(ToolCallRequest::complete(id, raw.name, arguments))
        }
        _ => {
            *degraded += 1;
            tracing::warn!(payload = %trimmed, "tool call payload not valid JSON, falling back to name scan");
            extract_name(trimmed).map(|name| {
                ToolCallRequest::complete(name.clone(), name, Value::Object(serde_json::Map::new()))
            })
        }
    }
}

/// 字面标记扫描：仅恢复 name 字段
fn extract_name(text: &str) -> Option<String> {
    for marker in ["\"name\": \"", "\"name\":\""] {
        if let Some(idx) = text.find(marker) {
            let rest = &text[idx + marker.len()..];
            if let Some(end) = rest.find('"') {
                let name = &rest[..end];
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        }
    }
    None
}
