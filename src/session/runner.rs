//! 命令执行器
//!
//! 在指定会话的 shell 配置下启动一个子进程并监督其生命周期：限时等待、超时强杀、
//! 合并 stdout/stderr 为行日志。无论成功、超时还是启动失败，都把命令与输出写回
//! 会话（list_sessions / read_output 依赖这份审计记录），绝不静默丢弃。
//! 子进程执行全程在注册表锁外进行。

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use crate::core::AgentError;
use crate::session::{SessionRegistry, ShellKind};

/// 超时后追加到输出末尾的标记行
const TIMEOUT_MARKER: &str = "[Timeout]";

/// 一次命令执行的结果；创建后不可变
#[derive(Clone, Debug)]
pub struct CommandResult {
    pub session_id: String,
    pub output: Vec<String>,
    pub timed_out: bool,
    pub error: Option<String>,
}

/// 命令执行器：持有会话注册表，按会话 shell 类型启动并监督子进程
pub struct CommandRunner {
    registry: Arc<SessionRegistry>,
}

impl CommandRunner {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// 按 shell 类型构造启动命令
    fn build_command(shell: ShellKind, command: &str) -> Command {
        match shell {
            ShellKind::Bash => {
                let mut c = Command::new("bash");
                c.args(["-c", command]);
                c
            }
            ShellKind::PowerShell => {
                let mut c = Command::new("powershell");
                c.args(["-Command", command]);
                c
            }
            ShellKind::Cmd => {
                if cfg!(target_os = "windows") {
                    let mut c = Command::new("cmd");
                    c.args(["/C", command]);
                    c
                } else {
                    let mut c = Command::new("sh");
                    c.args(["-c", command]);
                    c
                }
            }
        }
    }

    /// 在已有会话中执行命令，阻塞直到完成或超时
    ///
    /// 超时：强杀子进程并回收，保留已产生的部分输出并追加 `[Timeout]` 标记；
    /// 启动/运行异常：异常文本作为 `[Error]` 输出行记录。两种情况都更新会话历史。
    pub async fn run(
        &self,
        session_id: &str,
        path: &str,
        command: &str,
        timeout_secs: u64,
    ) -> CommandResult {
        let shell = match self.registry.shell_kind(session_id) {
            Ok(s) => s,
            Err(e) => {
                // 会话不存在：无处记账，降级为错误结果
                return CommandResult {
                    session_id: session_id.to_string(),
                    output: vec![format!("[Error] {}", e)],
                    timed_out: false,
                    error: Some(e.to_string()),
                };
            }
        };

        tracing::info!(sessionid = %session_id, shell = shell.as_str(), command = %command, "run command");

        let mut cmd = Self::build_command(shell, command);
        cmd.current_dir(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => {
                let err = AgentError::SpawnFailed(e.to_string());
                let lines = vec![format!("[Error] {}", err)];
                let _ = self.registry.append_output(session_id, &lines, command);
                return CommandResult {
                    session_id: session_id.to_string(),
                    output: lines,
                    timed_out: false,
                    error: Some(err.to_string()),
                };
            }
        };

        // 先接管输出管道，超时强杀后仍能收集到已产生的部分输出
        let (stdout_task, stdout_buf) = Self::drain(child.stdout.take());
        let (stderr_task, stderr_buf) = Self::drain(child.stderr.take());

        let (timed_out, wait_error) =
            match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait()).await {
                Ok(Ok(_status)) => (false, None),
                Ok(Err(e)) => (false, Some(e.to_string())),
                Err(_) => {
                    tracing::warn!(
                        sessionid = %session_id,
                        error = %AgentError::CommandTimeout(timeout_secs),
                        "killing subprocess"
                    );
                    Self::kill_and_reap(&mut child).await;
                    (true, None)
                }
            };

        // 孤儿孙进程可能继续持有管道不放；限定宽限期，到点直接取已读到的部分
        let grace = if timed_out {
            Duration::from_millis(500)
        } else {
            Duration::from_secs(5)
        };
        let _ = tokio::time::timeout(grace, stdout_task).await;
        let _ = tokio::time::timeout(grace, stderr_task).await;

        let mut lines = Self::to_lines(&stdout_buf);
        lines.extend(Self::to_lines(&stderr_buf));
        if timed_out {
            lines.push(TIMEOUT_MARKER.to_string());
        }
        if let Some(ref e) = wait_error {
            lines.push(format!("[Error] {}", e));
        }

        let _ = self.registry.append_output(session_id, &lines, command);

        CommandResult {
            session_id: session_id.to_string(),
            output: lines,
            timed_out,
            error: wait_error,
        }
    }

    /// 后台增量读一个输出管道，读到的字节随时可从共享缓冲取走
    fn drain(
        pipe: Option<impl AsyncReadExt + Unpin + Send + 'static>,
    ) -> (tokio::task::JoinHandle<()>, Arc<Mutex<Vec<u8>>>) {
        let buf: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let shared = buf.clone();
        let handle = tokio::spawn(async move {
            if let Some(mut pipe) = pipe {
                let mut chunk = [0u8; 4096];
                loop {
                    match pipe.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => shared.lock().unwrap().extend_from_slice(&chunk[..n]),
                    }
                }
            }
        });
        (handle, buf)
    }

    /// 强杀并回收子进程，run 返回后不残留
    async fn kill_and_reap(child: &mut Child) {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }

    fn to_lines(buf: &Arc<Mutex<Vec<u8>>>) -> Vec<String> {
        let bytes = buf.lock().unwrap();
        let text = String::from_utf8_lossy(&bytes);
        text.lines().map(|l| l.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn runner() -> (CommandRunner, Arc<SessionRegistry>) {
        let registry = Arc::new(SessionRegistry::new());
        (CommandRunner::new(registry.clone()), registry)
    }

    #[tokio::test]
    async fn test_run_appends_history_once() {
        let (runner, registry) = runner();
        let id = registry.create(ShellKind::Cmd);
        let before = registry.snapshot(&id).unwrap();

        let result = runner.run(&id, ".", "echo hive_test_line", 5).await;
        assert!(!result.timed_out);
        assert!(result.error.is_none());
        assert!(result.output.iter().any(|l| l.contains("hive_test_line")));

        let after = registry.snapshot(&id).unwrap();
        assert_eq!(after.history.len(), before.history.len() + 1);
        assert!(after.output.len() >= before.output.len());
        assert_eq!(after.last_command.as_deref(), Some("echo hive_test_line"));
    }

    #[tokio::test]
    async fn test_run_timeout_kills_process() {
        let (runner, registry) = runner();
        let id = registry.create(ShellKind::Cmd);

        let start = Instant::now();
        let result = runner.run(&id, ".", "echo partial && sleep 30", 1).await;
        // 超时后必须立刻返回，而不是等 sleep 跑完
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(result.timed_out);
        assert!(result.output.iter().any(|l| l == TIMEOUT_MARKER));
        // 部分输出保留
        assert!(result.output.iter().any(|l| l.contains("partial")));

        // 审计记录照常写入
        let session = registry.snapshot(&id).unwrap();
        assert_eq!(session.history.len(), 1);
        assert!(session.output.iter().any(|l| l == TIMEOUT_MARKER));
    }

    #[tokio::test]
    async fn test_run_spawn_failure_recorded() {
        let (runner, registry) = runner();
        let id = registry.create(ShellKind::Cmd);

        // 不存在的工作目录导致启动失败
        let result = runner
            .run(&id, "/nonexistent/hive/cwd", "echo hi", 5)
            .await;
        assert!(result.error.is_some());
        assert!(result.output.iter().any(|l| l.starts_with("[Error]")));

        // 崩溃的命令也是被记录的事件
        let session = registry.snapshot(&id).unwrap();
        assert_eq!(session.history.len(), 1);
        assert!(session.output.iter().any(|l| l.starts_with("[Error]")));
    }

    #[tokio::test]
    async fn test_run_unknown_session() {
        let (runner, _registry) = runner();
        let result = runner.run("no-such-id", ".", "echo hi", 5).await;
        assert!(result.error.is_some());
        assert!(!result.timed_out);
        assert!(result.output.iter().any(|l| l.starts_with("[Error]")));
    }

    #[tokio::test]
    async fn test_run_captures_stderr() {
        let (runner, registry) = runner();
        let id = registry.create(ShellKind::Cmd);
        let result = runner.run(&id, ".", "echo oops >&2", 5).await;
        assert!(result.output.iter().any(|l| l.contains("oops")));
    }
}
