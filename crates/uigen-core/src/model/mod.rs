//! Language model boundary.
//!
//! The pipeline only ever sees `&dyn LanguageModel`: prompt text in,
//! response text out. Transport, authentication and provider quirks live
//! behind the trait.
//!
//! ```text
//! GenerationPipeline
//!     |
//!     |  complete(prompt) ----> Arc<dyn LanguageModel>
//!     |                              |
//!     |                              +-- CommandModel (subprocess)
//!     |                              +-- test doubles
//!     v
//! response text (untrusted)
//! ```

pub mod command;

use anyhow::Result;
use async_trait::async_trait;

pub use command::CommandModel;

/// A single-shot text completion backend.
///
/// Every error is opaque to the core: any failure fails the calling
/// pipeline stage.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Human-readable backend name, used in logs.
    fn name(&self) -> &str;

    /// Send one prompt and return the complete response text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

// Compile-time assertion: LanguageModel must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn LanguageModel) {}
};
