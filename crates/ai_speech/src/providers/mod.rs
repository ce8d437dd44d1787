//! Speech pipeline implementations
//!
//! Contains concrete implementations of the `SpeechPipeline` trait.

pub mod kokoro;

pub use kokoro::{KokoroEngine, ModelSource};
