//! Lexical search and rank fusion.
//!
//! This module provides TF-IDF based search over knowledge base entries,
//! including tokenization, indexing, scoring, filtering and RRF fusion.

pub mod filters;
pub mod fusion;
pub mod index;
pub(crate) mod scoring;
pub mod tokenize;

pub use filters::{ApiFilter, ExampleFilter};
pub use fusion::{FusedHit, RrfConfig, fuse, fuse_rankings};
pub use index::{IdfScope, IdfTable, IndexedEntry, LexicalIndex};
pub use tokenize::tokenize;

pub(crate) use filters::EntryFilter;
