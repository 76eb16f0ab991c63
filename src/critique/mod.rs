pub mod normalize;
pub mod prompt;
pub mod service;
pub mod types;

pub use service::{CritiqueError, CritiqueOutcome, CritiqueRequest, CritiqueService};
