//! 沙箱文件系统工具
//!
//! SafeFs 绑定 root_dir，所有路径经 resolve 校验必须在 root 下（禁止 ../ 逃逸）；
//! 其上提供 list_dir / read_file_lines / write_file / delete_file / replace_in_file / tree_dir。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use walkdir::WalkDir;

use crate::tools::Tool;

/// tree_dir 默认不展开的目录
const DEFAULT_TREE_EXCLUDES: &[&str] = &[
    "target",
    "node_modules",
    "dist",
    "build",
    "__pycache__",
    ".git",
    ".idea",
];

/// 沙箱文件系统：绑定根目录，resolve 校验路径在根下，防止路径逃逸
#[derive(Debug, Clone)]
pub struct SafeFs {
    root_dir: PathBuf,
}

impl SafeFs {
    pub fn new(root_dir: impl AsRef<Path>) -> Self {
        let root = root_dir.as_ref().to_path_buf();
        let root_dir = root.canonicalize().unwrap_or(root);
        Self { root_dir }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// 校验已存在路径在沙箱内
    pub fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        let path = path.trim_start_matches("./");
        let full = self.root_dir.join(path);
        let canonical = full
            .canonicalize()
            .map_err(|_| format!("Path not found: {}", path))?;
        if canonical.starts_with(&self.root_dir) {
            Ok(canonical)
        } else {
            Err(format!("Path escape attempt: {}", path)) // 如 ../../etc/passwd
        }
    }

    /// 写入场景：目标可以尚不存在，校验其父目录在沙箱内
    pub fn resolve_for_write(&self, path: &str) -> Result<PathBuf, String> {
        let path = path.trim_start_matches("./");
        let full = self.root_dir.join(path);
        let parent = full
            .parent()
            .ok_or_else(|| format!("Invalid path: {}", path))?;
        let parent = parent
            .canonicalize()
            .map_err(|_| format!("Parent dir not found: {}", path))?;
        if !parent.starts_with(&self.root_dir) {
            return Err(format!("Path escape attempt: {}", path));
        }
        let name = full
            .file_name()
            .ok_or_else(|| format!("Invalid path: {}", path))?;
        Ok(parent.join(name))
    }
}

/// 查询目录下的文件与子目录名
pub struct ListDirTool {
    fs: SafeFs,
}

impl ListDirTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List files and directories under a path. Args: {\"path\": \"...\"}."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Directory path relative to the workspace" }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let resolved = self.fs.resolve(path)?;
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&resolved).map_err(|e| e.to_string())? {
            let entry = entry.map_err(|e| e.to_string())?;
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        names.sort();
        serde_json::to_string(&names).map_err(|e| e.to_string())
    }
}

/// 读取文件的部分内容（1 为首行，end 包含）
pub struct ReadFileLinesTool {
    fs: SafeFs,
}

impl ReadFileLinesTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for ReadFileLinesTool {
    fn name(&self) -> &str {
        "read_file_lines"
    }

    fn description(&self) -> &str {
        "Read part of a file. Args: {\"path\": \"...\", \"start\": 1, \"end\": 50}; returns {lines, total_lines}."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path" },
                "start": { "type": "integer", "description": "First line, 1-based" },
                "end": { "type": "integer", "description": "Last line, inclusive" }
            },
            "required": ["path", "start", "end"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
        let start = args.get("start").and_then(|v| v.as_u64()).unwrap_or(1) as usize;
        let end = args.get("end").and_then(|v| v.as_u64()).unwrap_or(u64::MAX) as usize;

        let resolved = self.fs.resolve(path)?;
        let content = std::fs::read_to_string(&resolved).map_err(|e| e.to_string())?;
        let all: Vec<&str> = content.lines().collect();
        let total = all.len();
        let start = start.max(1) - 1;
        let end = end.min(total);
        let lines: Vec<&str> = if start < end { all[start..end].to_vec() } else { Vec::new() };

        serde_json::to_string(&serde_json::json!({
            "lines": lines,
            "total_lines": total,
        }))
        .map_err(|e| e.to_string())
    }
}

/// 写入文件（append 为 true 时追加，默认覆盖）
pub struct WriteFileTool {
    fs: SafeFs,
}

impl WriteFileTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write a file. Args: {\"path\": \"...\", \"content\": \"...\", \"append\": false}."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path" },
                "content": { "type": "string", "description": "Content to write" },
                "append": { "type": "boolean", "description": "Append instead of overwrite (default false)" }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
        let content = args.get("content").and_then(|v| v.as_str()).unwrap_or("");
        let append = args.get("append").and_then(|v| v.as_bool()).unwrap_or(false);

        let resolved = self.fs.resolve_for_write(path)?;
        if append {
            use std::io::Write;
            let mut f = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&resolved)
                .map_err(|e| e.to_string())?;
            f.write_all(content.as_bytes()).map_err(|e| e.to_string())?;
        } else {
            std::fs::write(&resolved, content).map_err(|e| e.to_string())?;
        }
        Ok("success".to_string())
    }
}

/// 删除文件
pub struct DeleteFileTool {
    fs: SafeFs,
}

impl DeleteFileTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a file. Args: {\"path\": \"...\"}."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path" }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
        let resolved = self.fs.resolve(path)?;
        std::fs::remove_file(&resolved).map_err(|e| e.to_string())?;
        Ok("success".to_string())
    }
}

/// 替换文件中的指定文本（可多行）
pub struct ReplaceInFileTool {
    fs: SafeFs,
}

impl ReplaceInFileTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for ReplaceInFileTool {
    fn name(&self) -> &str {
        "replace_in_file"
    }

    fn description(&self) -> &str {
        "Replace text in a file. Args: {\"path\": \"...\", \"old\": \"...\", \"new\": \"...\"}."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File path" },
                "old": { "type": "string", "description": "Text to replace" },
                "new": { "type": "string", "description": "Replacement text" }
            },
            "required": ["path", "old", "new"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
        let old = args.get("old").and_then(|v| v.as_str()).unwrap_or("");
        let new = args.get("new").and_then(|v| v.as_str()).unwrap_or("");
        if old.is_empty() {
            return Err("Missing old text".to_string());
        }

        let resolved = self.fs.resolve(path)?;
        let content = std::fs::read_to_string(&resolved).map_err(|e| e.to_string())?;
        let replaced = content.replace(old, new);
        std::fs::write(&resolved, replaced).map_err(|e| e.to_string())?;
        Ok("success".to_string())
    }
}

/// 递归列出目录树，排除指定目录与隐藏目录
pub struct TreeDirTool {
    fs: SafeFs,
}

impl TreeDirTool {
    pub fn new(fs: SafeFs) -> Self {
        Self { fs }
    }
}

#[async_trait]
impl Tool for TreeDirTool {
    fn name(&self) -> &str {
        "tree_dir"
    }

    fn description(&self) -> &str {
        "Recursively list a directory tree, skipping build/hidden directories. Args: {\"path\": \"...\", \"exclude_dirs\": [...] (optional)}."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Root directory" },
                "exclude_dirs": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Directory names not to expand (defaults to build artifacts and hidden dirs)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let excludes: Vec<String> = args
            .get("exclude_dirs")
            .and_then(|v| v.as_array())
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_else(|| DEFAULT_TREE_EXCLUDES.iter().map(|s| s.to_string()).collect());

        let resolved = self.fs.resolve(path)?;
        let mut lines = Vec::new();
        let walker = WalkDir::new(&resolved).min_depth(1).into_iter();
        for entry in walker.filter_entry(|e| {
            let name = e.file_name().to_string_lossy();
            !(e.file_type().is_dir()
                && (name.starts_with('.') || excludes.iter().any(|x| name == x.as_str())))
        }) {
            let entry = entry.map_err(|e| e.to_string())?;
            let depth = entry.depth();
            let name = entry.file_name().to_string_lossy();
            let suffix = if entry.file_type().is_dir() { "/" } else { "" };
            lines.push(format!("{}{}{}", "  ".repeat(depth - 1), name, suffix));
        }
        serde_json::to_string(&lines).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> (tempfile::TempDir, SafeFs) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "line1\nline2\nline3\n").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), "nested").unwrap();
        std::fs::create_dir(dir.path().join("target")).unwrap();
        std::fs::write(dir.path().join("target/skip.o"), "").unwrap();
        let fs = SafeFs::new(dir.path());
        (dir, fs)
    }

    #[tokio::test]
    async fn test_list_dir() {
        let (_dir, fs) = fixture();
        let out = ListDirTool::new(fs)
            .execute(json!({"path": "."}))
            .await
            .unwrap();
        assert!(out.contains("a.txt"));
        assert!(out.contains("sub"));
    }

    #[tokio::test]
    async fn test_read_file_lines_range() {
        let (_dir, fs) = fixture();
        let out = ReadFileLinesTool::new(fs)
            .execute(json!({"path": "a.txt", "start": 2, "end": 3}))
            .await
            .unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["lines"], json!(["line2", "line3"]));
        assert_eq!(v["total_lines"], json!(3));
    }

    #[tokio::test]
    async fn test_write_then_replace_then_delete() {
        let (_dir, fs) = fixture();
        let write = WriteFileTool::new(fs.clone());
        assert_eq!(
            write
                .execute(json!({"path": "new.txt", "content": "hello world"}))
                .await
                .unwrap(),
            "success"
        );
        write
            .execute(json!({"path": "new.txt", "content": "!", "append": true}))
            .await
            .unwrap();

        let replace = ReplaceInFileTool::new(fs.clone());
        replace
            .execute(json!({"path": "new.txt", "old": "world", "new": "hive"}))
            .await
            .unwrap();
        let content = std::fs::read_to_string(fs.root().join("new.txt")).unwrap();
        assert_eq!(content, "hello hive!");

        let delete = DeleteFileTool::new(fs.clone());
        assert_eq!(
            delete.execute(json!({"path": "new.txt"})).await.unwrap(),
            "success"
        );
        assert!(!fs.root().join("new.txt").exists());
    }

    #[tokio::test]
    async fn test_path_escape_rejected() {
        let (_dir, fs) = fixture();
        let read = ReadFileLinesTool::new(fs.clone());
        let err = read
            .execute(json!({"path": "../../etc/passwd", "start": 1, "end": 5}))
            .await
            .unwrap_err();
        assert!(err.contains("Path"));

        let write = WriteFileTool::new(fs);
        assert!(write
            .execute(json!({"path": "../outside.txt", "content": "x"}))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_tree_dir_excludes_build_dirs() {
        let (_dir, fs) = fixture();
        let out = TreeDirTool::new(fs).execute(json!({"path": "."})).await.unwrap();
        assert!(out.contains("sub/"));
        assert!(out.contains("b.txt"));
        assert!(!out.contains("skip.o"));
    }
}
