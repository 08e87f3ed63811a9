pub mod mutation;

mod document;
mod error;
mod types;

pub use crate::document::Document;
pub use crate::error::DomError;
pub use crate::mutation::{MutationBatch, MutationRecord, ObserveOptions, ObserverId};
pub use crate::types::NodeKey;
