//! 工具分发器
//!
//! 把解析出的调用请求映射到注册的工具并执行，统一收敛为 ToolResult：
//! 未注册、参数解析失败、执行异常、超时、截断调用全部降级为 is_error 结果，
//! 绝不向上抛出；每个请求恰好产生一个结果，一个失败不影响其余请求。
//! 同一轮内的请求相互独立，并发执行；每次调用输出结构化审计日志（JSON）。

use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde_json::Value;
use tokio::time::timeout;

use crate::core::AgentError;
use crate::protocol::{ToolCallRequest, ToolResult};
use crate::tools::ToolRegistry;

/// 工具分发器：持有注册表与单次调用超时
pub struct ToolDispatcher {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 分发一批请求：每个请求独立处理，返回结果数恒等于请求数
    pub async fn dispatch(&self, requests: &[ToolCallRequest]) -> Vec<ToolResult> {
        join_all(requests.iter().map(|req| self.dispatch_one(req))).await
    }

    async fn dispatch_one(&self, req: &ToolCallRequest) -> ToolResult {
        if !req.complete {
            // 截断的调用不派发：下一轮流式输出会带来完整版本
            return ToolResult::error(
                &req.id,
                &req.name,
                AgentError::TruncatedCall(req.name.clone()).to_string(),
            );
        }

        let Some(tool) = self.registry.get(&req.name) else {
            return ToolResult::error(
                &req.id,
                &req.name,
                AgentError::ToolNotRegistered(req.name.clone()).to_string(),
            );
        };

        let args = Self::normalize_args(&req.name, &req.arguments);

        let start = Instant::now();
        let result = timeout(self.timeout, tool.execute(args)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": req.name,
            "call_id": req.id,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview(&req.arguments),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(Ok(content)) => ToolResult::ok(&req.id, &req.name, content),
            Ok(Err(e)) => ToolResult::error(
                &req.id,
                &req.name,
                AgentError::ToolExecutionFailed(e).to_string(),
            ),
            Err(_) => ToolResult::error(
                &req.id,
                &req.name,
                AgentError::ToolTimeout(req.name.clone()).to_string(),
            ),
        }
    }

    /// 参数归一化：已是结构化映射直接用；字符串再解码一次；
    /// 解码失败降级为空参数调用，而不是放弃该请求
    fn normalize_args(tool: &str, raw: &Value) -> Value {
        match raw {
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Value::Object(serde_json::Map::new());
                }
                serde_json::from_str(s).unwrap_or_else(|e| {
                    let err = AgentError::ArgumentParseError(e.to_string());
                    tracing::warn!(tool = %tool, error = %err, "using empty args");
                    Value::Object(serde_json::Map::new())
                })
            }
            Value::Null => Value::Object(serde_json::Map::new()),
            other => other.clone(),
        }
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
