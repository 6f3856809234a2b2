// AI resume screening.
// Pipeline: extractor → prompts → retry (model) → parser/repair/normalize,
// with fallback scoring when the model path fails.
// All model calls go through llm_client::TextGenerator.

pub mod error;
pub mod extractor;
pub mod fallback;
pub mod handlers;
pub mod models;
pub mod normalize;
pub mod parser;
pub mod prompts;
pub mod repair;
pub mod retry;
pub mod service;

// Re-export the public API consumed by other modules (state, main).
pub use service::{CvSource, Screener};
