// src/extractors/mod.rs
pub mod content;
pub mod header;
pub mod mentions;

// Re-export key extraction types for convenience
pub use mentions::{MentionClassifier, OpenAiClassifier};
