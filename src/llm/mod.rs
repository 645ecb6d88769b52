//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / 本地端点 / Mock）

pub mod backends;
pub mod message;
pub mod mock;
pub mod openai;
pub mod traits;

pub use backends::{create_deepseek_client, create_llm_from_config, create_local_client};
pub use message::{Message, Role};
pub use mock::MockLlmClient;
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::LlmClient;
