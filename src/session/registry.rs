//! 会话注册表
//!
//! 持有全部存活命令会话：create / get / append_output / list / read_output。
//! 整个映射用一把粗粒度互斥锁保护（非逐会话锁）：会话数量少、临界区仅为映射读写，
//! 简单性优先于吞吐。子进程执行发生在锁外，长命令不会阻塞其他会话的注册表操作。
//! 会话在进程生命周期内不删除，history 与 output 只增不减。

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::core::AgentError;

/// 会话的 shell 类型，决定子进程启动方式
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShellKind {
    /// POSIX shell：bash -c
    Bash,
    /// 平台默认解释器：Windows cmd /C，其余 sh -c
    Cmd,
    /// powershell -Command
    PowerShell,
}

impl ShellKind {
    /// 从字符串解析；未知值回退 Cmd
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "bash" => ShellKind::Bash,
            "powershell" => ShellKind::PowerShell,
            _ => ShellKind::Cmd,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShellKind::Bash => "bash",
            ShellKind::Cmd => "cmd",
            ShellKind::PowerShell => "powershell",
        }
    }
}

/// 单个命令会话：命令历史与输出日志均为追加式
#[derive(Clone, Debug)]
pub struct Session {
    pub id: String,
    pub shell: ShellKind,
    pub history: Vec<String>,
    pub output: Vec<String>,
    pub last_command: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// list() 返回的会话摘要
#[derive(Clone, Debug, Serialize)]
pub struct SessionSummary {
    pub sessionid: String,
    pub last_command: Option<String>,
    pub shell: &'static str,
    pub created_at: DateTime<Utc>,
}

/// 会话注册表：一把锁保护的 id -> Session 映射
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新建会话，返回进程生命周期内唯一的 id
    pub fn create(&self, shell: ShellKind) -> String {
        let id = Uuid::new_v4().to_string();
        let session = Session {
            id: id.clone(),
            shell,
            history: Vec::new(),
            output: Vec::new(),
            last_command: None,
            created_at: Utc::now(),
        };
        self.sessions.lock().unwrap().insert(id.clone(), session);
        tracing::debug!(sessionid = %id, shell = shell.as_str(), "session created");
        id
    }

    /// 读取会话快照（克隆），未知 id 返回 SessionNotFound
    pub fn snapshot(&self, id: &str) -> Result<Session, AgentError> {
        self.sessions
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| AgentError::SessionNotFound(id.to_string()))
    }

    /// 查询会话的 shell 类型
    pub fn shell_kind(&self, id: &str) -> Result<ShellKind, AgentError> {
        self.sessions
            .lock()
            .unwrap()
            .get(id)
            .map(|s| s.shell)
            .ok_or_else(|| AgentError::SessionNotFound(id.to_string()))
    }

    /// 追加一次命令执行的输出与命令本身（成功、超时、报错都要记账）
    pub fn append_output(
        &self,
        id: &str,
        lines: &[String],
        command: &str,
    ) -> Result<(), AgentError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| AgentError::SessionNotFound(id.to_string()))?;
        session.output.extend(lines.iter().cloned());
        session.history.push(command.to_string());
        session.last_command = Some(command.to_string());
        Ok(())
    }

    /// 列出全部会话摘要
    pub fn list(&self) -> Vec<SessionSummary> {
        self.sessions
            .lock()
            .unwrap()
            .values()
            .map(|s| SessionSummary {
                sessionid: s.id.clone(),
                last_command: s.last_command.clone(),
                shell: s.shell.as_str(),
                created_at: s.created_at,
            })
            .collect()
    }

    /// 读取末尾 lines 行输出；lines 为 0 时返回全部
    pub fn read_output(&self, id: &str, lines: usize) -> Result<Vec<String>, AgentError> {
        let sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get(id)
            .ok_or_else(|| AgentError::SessionNotFound(id.to_string()))?;
        if lines == 0 || lines >= session.output.len() {
            Ok(session.output.clone())
        } else {
            Ok(session.output[session.output.len() - lines..].to_vec())
        }
    }
}
