//! midi2xml - aligned performance / notation training corpora from MusicXML scores
//!
//! This library provides:
//! - Fragmentation of MusicXML scores into overlapping measure windows,
//!   rendered as MIDI and MusicXML
//! - Simplification of notation documents into single-line training text
//! - Encoding of performance event logs with an integer vocabulary
//! - Seeded train/test splitting and corpus writing
//!
//! # Example
//!
//! ```no_run
//! use midi2xml::{prepare_corpus, PrepareConfig};
//!
//! let config = PrepareConfig::new("performances", "xml", "corpus");
//! let report = prepare_corpus(&config).unwrap();
//! println!("{} training rows", report.train_rows);
//! ```

pub mod config;
pub mod dataset;
pub mod decode;
pub mod document;
pub mod error;
pub mod fragment;
pub mod notation;
pub mod performance;

// Re-export main types for convenience
pub use config::{FragmentConfig, PrepareConfig, SamplingPolicy};
pub use dataset::{prepare_corpus, CorpusWriter, PrepareReport, Split, SplitAssignment};
pub use document::flatten::flatten;
pub use document::sanitize::{sanitize, ExcludedFields, EXCLUDED_FIELDS};
pub use document::tree::parse_document;
pub use document::{simplify_notation, simplify_notation_file};
pub use error::Midi2XmlError;
pub use fragment::{fragment_corpus, Fragment, FragmentReport, Fragmenter};
pub use notation::model::{Measure, Part, PartWindow, Piece, PieceWindow};
pub use notation::{MusicXmlEngine, NotationEngine};
pub use performance::{
    encode_performance, encode_performance_file, PerformanceEvent, PerformanceVocabulary,
};
