//! Embedding generation
//!
//! Provides the backend trait, an HTTP implementation for external services
//! (vLLM, OpenAI, etc.), a deterministic offline fallback, and the
//! lazily-initialized provider that the index and cache depend on.

mod fallback;
mod http;
mod provider;
mod traits;

pub use fallback::{FallbackEmbedder, FALLBACK_MODEL_NAME};
pub use http::HttpEmbedder;
pub use provider::EmbeddingProvider;
pub use traits::EmbeddingBackend;
