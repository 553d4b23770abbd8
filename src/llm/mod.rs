pub mod gemini;

pub use gemini::{generate_image, translate_prompt, ImageGenerationError, TranslationError};
