//! 后端选择：远程 DeepSeek 与本地 OpenAI 兼容端点
//!
//! 两种模式对应配置 [llm].provider = "deepseek" / "local"；无 API Key 时回退 Mock。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};

/// DeepSeek API 常量
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

/// 本地 OpenAI 兼容端点（vLLM / Ollama 等）
pub const LOCAL_BASE_URL: &str = "http://localhost:8000/v1";

/// 创建 DeepSeek 客户端
///
/// - 优先使用环境变量 `DEEPSEEK_API_KEY`
/// - 模型可通过 `model` 参数或 `DEEPSEEK_MODEL` 环境变量指定
pub fn create_deepseek_client(model: Option<&str>) -> OpenAiClient {
    let api_key = std::env::var("DEEPSEEK_API_KEY")
        .ok()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .unwrap_or_else(|| "sk-placeholder".to_string());

    let model = model
        .map(String::from)
        .or_else(|| std::env::var("DEEPSEEK_MODEL").ok())
        .unwrap_or_else(|| DEEPSEEK_CHAT.to_string());

    OpenAiClient::new(Some(DEEPSEEK_BASE_URL), &model, Some(api_key.as_str()))
}

/// 创建本地端点客户端：base_url 可配置，API Key 固定为 EMPTY
pub fn create_local_client(base_url: Option<&str>, model: &str) -> OpenAiClient {
    OpenAiClient::new(
        Some(base_url.unwrap_or(LOCAL_BASE_URL)),
        model,
        Some("EMPTY"),
    )
}

/// 根据配置与环境变量选择 LLM 后端（DeepSeek / 本地端点 / Mock）
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();

    if provider == "local" {
        tracing::info!("Using local LLM endpoint ({})", cfg.llm.model);
        return Arc::new(create_local_client(
            cfg.llm.base_url.as_deref(),
            &cfg.llm.model,
        ));
    }

    let has_key =
        std::env::var("DEEPSEEK_API_KEY").is_ok() || std::env::var("OPENAI_API_KEY").is_ok();
    if has_key {
        tracing::info!("Using DeepSeek LLM ({})", cfg.llm.model);
        Arc::new(create_deepseek_client(Some(&cfg.llm.model)))
    } else {
        tracing::warn!("No API key set, using Mock LLM");
        Arc::new(MockLlmClient::default())
    }
}
