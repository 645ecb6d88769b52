//! 命令会话层：注册表（并发安全的会话映射）与子进程执行

pub mod registry;
pub mod runner;

pub use registry::{Session, SessionRegistry, SessionSummary, ShellKind};
pub use runner::{CommandResult, CommandRunner};
