//! 网页查询工具：query_url 抓取指定页面，search_web 关键字搜索
//!
//! query_url 对 HTML 响应用 html2text 提取可读文本，超长截断并追加 ...[truncated]；
//! search_web 走 DuckDuckGo HTML 端点，正则提取 topn 条 {title, url, snippet}。

use async_trait::async_trait;
use html2text::from_read;
use regex::Regex;
use reqwest::Client;
use serde_json::Value;

use crate::tools::Tool;

/// 搜索端点（无需 API Key 的 HTML 版本）
const SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// 构造带超时与浏览器 UA 的 HTTP 客户端
fn build_client(timeout_secs: u64) -> Client {
    const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
    Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
}

/// 判断内容是否像 HTML（需提取可读文本）
fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.starts_with("<html")
        || s.starts_with("<HTML")
        || (s.len() > 20 && s.contains('<') && (s.contains("</") || s.contains("<meta") || s.contains("<head") || s.contains("<title")))
}

/// 简易去除 HTML 标签（html2text 失败时的回退，也用于搜索结果片段）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ").trim().to_string()
}

/// 抓取用户指定 URL 的网页文本
pub struct QueryUrlTool {
    client: Client,
    max_result_chars: usize,
}

impl QueryUrlTool {
    pub fn new(timeout_secs: u64, max_result_chars: usize) -> Self {
        Self {
            client: build_client(timeout_secs),
            max_result_chars,
        }
    }

    fn html_to_text(&self, html: &str) -> String {
        match from_read(html.as_bytes(), 120) {
            Ok(text) if !text.trim().is_empty() => text,
            _ => strip_html_tags(html),
        }
    }
}

#[async_trait]
impl Tool for QueryUrlTool {
    fn name(&self) -> &str {
        "query_url"
    }

    fn description(&self) -> &str {
        "Fetch the text content of a specific URL. Args: {\"url\": \"https://...\"}."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "Page URL" }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let url = args.get("url").and_then(|v| v.as_str()).unwrap_or("").trim();
        if url.is_empty() {
            return Err("Missing url".to_string());
        }
        tracing::info!(url = %url, "query_url fetch");

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let mut body = resp.text().await.map_err(|e| format!("Read body: {}", e))?;

        // 去除 BOM，避免 HTML 检测失败
        if body.starts_with('\u{FEFF}') {
            body = body[1..].to_string();
        }

        let body = if looks_like_html(&body) {
            self.html_to_text(&body)
        } else {
            body
        };

        if body.chars().count() > self.max_result_chars {
            Ok(body.chars().take(self.max_result_chars).collect::<String>() + "\n...[truncated]")
        } else {
            Ok(body)
        }
    }
}

/// 关键字搜索，返回 topn 条结果；禁止直接传 URL（那是 query_url 的职责）
pub struct SearchWebTool {
    client: Client,
    default_topn: usize,
}

impl SearchWebTool {
    pub fn new(timeout_secs: u64, default_topn: usize) -> Self {
        Self {
            client: build_client(timeout_secs),
            default_topn,
        }
    }

    /// 从结果页 HTML 中提取 (title, url, snippet) 列表
    fn extract_results(html: &str, topn: usize) -> Vec<Value> {
        // DuckDuckGo HTML 版的结果链接与摘要节点
        let link_re = Regex::new(r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#)
            .expect("valid regex");
        let snippet_re =
            Regex::new(r#"(?s)class="result__snippet"[^>]*>(.*?)</a>"#).expect("valid regex");

        let snippets: Vec<String> = snippet_re
            .captures_iter(html)
            .map(|c| strip_html_tags(&c[1]))
            .collect();

        link_re
            .captures_iter(html)
            .take(topn)
            .enumerate()
            .map(|(i, c)| {
                serde_json::json!({
                    "title": strip_html_tags(&c[2]),
                    "url": c[1].to_string(),
                    "snippet": snippets.get(i).cloned().unwrap_or_default(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl Tool for SearchWebTool {
    fn name(&self) -> &str {
        "search_web"
    }

    fn description(&self) -> &str {
        "Search the web by keyword and return the top results as [{title, url, snippet}]. Args: {\"keyword\": \"...\", \"topn\": 3}. Do not pass a URL here."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "keyword": { "type": "string", "description": "Search keyword" },
                "topn": { "type": "integer", "description": "Number of results to return (default 3)" }
            },
            "required": ["keyword"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let keyword = args
            .get("keyword")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim();
        if keyword.is_empty() {
            return Err("Missing keyword".to_string());
        }
        let topn = args
            .get("topn")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(self.default_topn);

        tracing::info!(keyword = %keyword, topn, "search_web");

        let resp = self
            .client
            .get(SEARCH_ENDPOINT)
            .query(&[("q", keyword)])
            .send()
            .await
            .map_err(|e| format!("Request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let html = resp.text().await.map_err(|e| format!("Read body: {}", e))?;

        let results = Self::extract_results(&html, topn);
        serde_json::to_string(&results).map_err(|e| e.to_string())
    }
}
