//! Train/test partitioning and the aligned corpora built from it.

pub mod corpus;
pub mod prepare;
pub mod split;

pub use corpus::{CorpusWriter, Split};
pub use prepare::{prepare_corpus, PrepareReport};
pub use split::SplitAssignment;
