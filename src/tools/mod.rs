//! 工具箱：命令会话、文件系统、网页查询、echo，与统一分发器

pub mod command;
pub mod dispatcher;
pub mod echo;
pub mod filesystem;
pub mod registry;
pub mod web;

pub use command::{CreateSessionTool, ExecuteCommandTool, ListSessionsTool, ReadOutputTool};
pub use dispatcher::ToolDispatcher;
pub use echo::EchoTool;
pub use filesystem::{
    DeleteFileTool, ListDirTool, ReadFileLinesTool, ReplaceInFileTool, SafeFs, TreeDirTool,
    WriteFileTool,
};
pub use registry::{Tool, ToolRegistry};
pub use web::{QueryUrlTool, SearchWebTool};
