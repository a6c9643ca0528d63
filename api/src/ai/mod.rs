pub mod llm;
pub mod llm_client;
pub mod processor;
pub mod types;

pub use llm::LlmWrapper;
pub use llm_client::{ArticleText, LLMClient, OpenAiLlmClient};
pub use processor::{AIProcessor, CycleProgress};
