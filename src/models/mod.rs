pub mod paper;
pub mod prompt;

pub use paper::{PaperDocument, NOT_AVAILABLE};
pub use prompt::{GeneratedArtifact, PromptRole, PromptVersion};
