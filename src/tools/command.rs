//! 命令会话工具：execute_command / create_session / list_sessions / read_output
//!
//! 全部落在同一个 SessionRegistry 上；execute_command 经 CommandRunner 执行，
//! 默认自动新建 bash 会话，复用旧会话时必须显式给 sessionid。
//! 错误（会话不存在等）以输出行或 error 字段返回给模型，不抛出。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::session::{CommandRunner, SessionRegistry, ShellKind};
use crate::tools::Tool;

/// execute_command 的默认超时（秒）
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 10;

/// 执行命令：自动新建会话或复用指定会话
pub struct ExecuteCommandTool {
    runner: Arc<CommandRunner>,
    default_timeout_secs: u64,
}

impl ExecuteCommandTool {
    pub fn new(runner: Arc<CommandRunner>, default_timeout_secs: u64) -> Self {
        Self {
            runner,
            default_timeout_secs,
        }
    }
}

#[async_trait]
impl Tool for ExecuteCommandTool {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Run a shell command in a command session. new_session defaults to true (a fresh session is created); pass sessionid with new_session=false to reuse a previous session."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "The command to execute" },
                "path": { "type": "string", "description": "Working directory for the command" },
                "sessionid": { "type": "string", "description": "Session id to reuse (required when new_session is false)" },
                "timeout": { "type": "integer", "description": "Timeout in seconds (default 10)" },
                "new_session": { "type": "boolean", "description": "Create a fresh session (default true)" }
            },
            "required": ["command", "path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        if command.is_empty() {
            return Err("Missing command".to_string());
        }
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or(".")
            .to_string();
        let timeout = args
            .get("timeout")
            .and_then(|v| v.as_u64())
            .unwrap_or(if self.default_timeout_secs > 0 {
                self.default_timeout_secs
            } else {
                DEFAULT_COMMAND_TIMEOUT_SECS
            });
        let new_session = args
            .get("new_session")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        let session_id = if new_session {
            self.runner.registry().create(ShellKind::Bash)
        } else {
            match args.get("sessionid").and_then(|v| v.as_str()) {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => {
                    return Ok(serde_json::json!({
                        "error": "sessionid is required unless new_session is true"
                    })
                    .to_string())
                }
            }
        };

        let result = self.runner.run(&session_id, &path, &command, timeout).await;

        let body = if let Some(err) = &result.error {
            serde_json::json!({
                "sessionid": result.session_id,
                "output": result.output,
                "error": err,
            })
        } else {
            serde_json::json!({
                "sessionid": result.session_id,
                "output": result.output,
                "timeout": result.timed_out,
            })
        };
        Ok(body.to_string())
    }
}

/// 新建会话：shell 支持 cmd / powershell / bash，默认 cmd
pub struct CreateSessionTool {
    registry: Arc<SessionRegistry>,
}

impl CreateSessionTool {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for CreateSessionTool {
    fn name(&self) -> &str {
        "create_session"
    }

    fn description(&self) -> &str {
        "Create a new command session and return its sessionid. Args: {\"shell\": \"cmd\"|\"powershell\"|\"bash\"} (default cmd)."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "shell": { "type": "string", "description": "Shell kind: cmd, powershell or bash (default cmd)" }
            },
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let shell = ShellKind::parse(args.get("shell").and_then(|v| v.as_str()).unwrap_or("cmd"));
        Ok(self.registry.create(shell))
    }
}

/// 列举存活会话
pub struct ListSessionsTool {
    registry: Arc<SessionRegistry>,
}

impl ListSessionsTool {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for ListSessionsTool {
    fn name(&self) -> &str {
        "list_sessions"
    }

    fn description(&self) -> &str {
        "List alive command sessions: [{sessionid, last_command, shell, created_at}]."
    }

    async fn execute(&self, _args: Value) -> Result<String, String> {
        serde_json::to_string(&self.registry.list()).map_err(|e| e.to_string())
    }
}

/// 读取指定会话的输出尾部
pub struct ReadOutputTool {
    registry: Arc<SessionRegistry>,
}

impl ReadOutputTool {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for ReadOutputTool {
    fn name(&self) -> &str {
        "read_output"
    }

    fn description(&self) -> &str {
        "Read the output of a session. Args: {\"sessionid\": \"...\", \"lines\": 10}; lines=0 returns everything."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "sessionid": { "type": "string", "description": "Session id" },
                "lines": { "type": "integer", "description": "Number of tail lines to read (default 10, 0 = all)" }
            },
            "required": ["sessionid"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let sessionid = args
            .get("sessionid")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let lines = args.get("lines").and_then(|v| v.as_u64()).unwrap_or(10) as usize;

        let output = match self.registry.read_output(sessionid, lines) {
            Ok(lines) => lines,
            // 会话不存在降级为错误输出行，与会话输出同构
            Err(e) => vec![format!("[Error] {}", e)],
        };
        serde_json::to_string(&output).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn setup() -> (Arc<SessionRegistry>, Arc<CommandRunner>) {
        let registry = Arc::new(SessionRegistry::new());
        let runner = Arc::new(CommandRunner::new(registry.clone()));
        (registry, runner)
    }

    #[tokio::test]
    async fn test_execute_command_new_session() {
        let (registry, runner) = setup();
        let tool = ExecuteCommandTool::new(runner, 10);
        let out = tool
            .execute(json!({"command": "echo hello_hive", "path": "."}))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        let sid = v["sessionid"].as_str().unwrap();
        assert!(v["output"]
            .as_array()
            .unwrap()
            .iter()
            .any(|l| l.as_str().unwrap().contains("hello_hive")));
        assert_eq!(v["timeout"], json!(false));
        // 新建的是 bash 会话且已入注册表
        assert_eq!(registry.shell_kind(sid).unwrap(), ShellKind::Bash);
    }

    #[tokio::test]
    async fn test_execute_command_reuse_requires_sessionid() {
        let (_registry, runner) = setup();
        let tool = ExecuteCommandTool::new(runner, 10);
        let out = tool
            .execute(json!({"command": "echo x", "path": ".", "new_session": false}))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert!(v["error"].as_str().unwrap().contains("sessionid"));
    }

    #[tokio::test]
    async fn test_session_tool_round_trip() {
        let (registry, runner) = setup();
        let create = CreateSessionTool::new(registry.clone());
        let sid = create.execute(json!({"shell": "bash"})).await.unwrap();

        let exec = ExecuteCommandTool::new(runner, 10);
        exec.execute(json!({
            "command": "echo round_trip",
            "path": ".",
            "sessionid": sid,
            "new_session": false
        }))
        .await
        .unwrap();

        let read = ReadOutputTool::new(registry.clone());
        let out = read
            .execute(json!({"sessionid": sid, "lines": 10}))
            .await
            .unwrap();
        assert!(out.contains("round_trip"));

        let list = ListSessionsTool::new(registry);
        let listed = list.execute(json!({})).await.unwrap();
        assert!(listed.contains(&sid));
        assert!(listed.contains("echo round_trip"));
    }

    #[tokio::test]
    async fn test_read_output_unknown_session_degrades() {
        let (registry, _runner) = setup();
        let read = ReadOutputTool::new(registry);
        let out = read
            .execute(json!({"sessionid": "ghost", "lines": 5}))
            .await
            .unwrap();
        assert!(out.contains("[Error]"));
    }
}
