//! 模型输出协议层：`<tool_call>` 文本协议的流式解析

pub mod call;
pub mod stream;

pub use call::{ToolCallRequest, ToolResult};
pub use stream::{parse_response, ParsedResponse, TOOL_CALL_CLOSE, TOOL_CALL_OPEN};
