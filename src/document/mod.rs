//! Notation document trees: parsing, sanitizing and flattening to one line of text.

pub mod flatten;
pub mod sanitize;
pub mod tree;

use crate::decode::read_document;
use crate::Midi2XmlError;
use sanitize::ExcludedFields;
use std::path::Path;

/// Canonical training text for a notation document.
pub fn simplify_notation(xml: &str, excluded: &ExcludedFields) -> Result<String, Midi2XmlError> {
    let tree = tree::parse_document(xml)?;
    let clean = sanitize::sanitize(tree, excluded);
    Ok(flatten::flatten(&clean))
}

pub fn simplify_notation_file(
    path: &Path,
    excluded: &ExcludedFields,
) -> Result<String, Midi2XmlError> {
    let xml = read_document(path)?;
    simplify_notation(&xml, excluded)
        .map_err(|e| Midi2XmlError::ParsingError(format!("{}: {e}", path.display())))
}
