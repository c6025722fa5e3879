use crate::document::tree::{ATTRIBUTE_PREFIX, TEXT_KEY};
use serde_json::Value;
use std::collections::HashSet;

/// Presentation-only or non-reproducible fields dropped from notation documents.
pub const EXCLUDED_FIELDS: [&str; 21] = [
    "lyric",
    "default-x",
    "default-y",
    "part-abbreviation",
    "work",
    "encoding",
    "version",
    "identification",
    "movement-title",
    "defaults",
    "color",
    "font-style",
    "font-weight",
    "font-family",
    "system-layout",
    "id",
    "parentheses",
    "words",
    "text-content",
    "print",
    "notehead",
];

/// Name under which the text content of a mixed element is excluded.
pub const TEXT_CONTENT_FIELD: &str = "text-content";

/// Field name as matched against the excluded set: `@id` is `id`, `#text` is `text-content`.
pub fn bare_field_name(key: &str) -> &str {
    if key == TEXT_KEY {
        TEXT_CONTENT_FIELD
    } else {
        key.strip_prefix(ATTRIBUTE_PREFIX).unwrap_or(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedFields {
    names: HashSet<String>,
}

impl Default for ExcludedFields {
    fn default() -> Self {
        Self::new(EXCLUDED_FIELDS)
    }
}

impl ExcludedFields {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn excludes(&self, key: &str) -> bool {
        self.names.contains(bare_field_name(key))
    }
}

/// Remove every excluded field, at any depth, including inside lists.
pub fn sanitize(mut tree: Value, excluded: &ExcludedFields) -> Value {
    sanitize_in_place(&mut tree, excluded);
    tree
}

/// Worklist traversal so deeply nested documents do not grow the call stack.
pub fn sanitize_in_place(tree: &mut Value, excluded: &ExcludedFields) {
    let mut pending: Vec<&mut Value> = vec![tree];
    while let Some(node) = pending.pop() {
        match node {
            Value::Object(fields) => {
                fields.retain(|key, _| !excluded.excludes(key));
                pending.extend(fields.values_mut());
            }
            Value::Array(items) => pending.extend(items.iter_mut()),
            _ => {}
        }
    }
}
