//! Query embedding for semantic search
//!
//! ```text
//! EmbeddingProvider (trait)
//!     └── OpenAIProvider    - HTTP client for /v1/embeddings API
//! ```
//!
//! Article vectors are produced elsewhere; this module only embeds queries.

pub mod openai;
mod provider;

pub use openai::{OpenAIConfig, OpenAIProvider};
pub use provider::{EmbeddingProvider, ProviderStatus};
