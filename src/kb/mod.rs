//! Knowledge base model and loader.

pub mod entry;
pub mod loader;

pub use entry::{
    ApiEntry, Complexity, ExampleEntry, KbEntry, KbMetadata, LibraryOverview, Parameter,
    ResultKind,
};
pub use loader::{KnowledgeBase, safe_file_stem};
