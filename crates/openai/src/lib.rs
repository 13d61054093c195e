pub mod client;
pub mod embeddings;
pub mod risk_model;

pub use client::{OpenAiClient, API_KEY_ENV, DEFAULT_BASE_URL};
pub use embeddings::OpenAiEmbedder;
pub use risk_model::OpenAiRiskModel;
