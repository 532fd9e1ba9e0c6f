pub mod llm;
pub mod service;

pub use llm::{ChatMessage, ChatModel, OpenAIChatModel};
pub use service::{Answer, QueryService, NO_ANSWER_SENTINEL};
