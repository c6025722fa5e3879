//! Performance event logs and their integer-backed vocabulary.

pub mod encoder;
pub mod vocabulary;

pub use encoder::{encode_performance, encode_performance_file};
pub use vocabulary::{PerformanceEvent, PerformanceVocabulary};
