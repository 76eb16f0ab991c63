use std::future::Future;
use std::pin::Pin;

pub mod gemini;
pub mod media;

pub use gemini::GeminiClient;
pub use media::{prepare_image, ImageError, PreparedImage};

pub type GenerateFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;

/// A hosted multimodal model that answers a text prompt about one image.
pub trait VisionModel: Send + Sync {
    /// Model identifier used in logs.
    fn name(&self) -> &str;

    /// Sends the prompt and image as a single request and returns the reply
    /// text as the model produced it.
    fn generate<'a>(&'a self, prompt: &'a str, image: &'a PreparedImage) -> GenerateFuture<'a>;
}
