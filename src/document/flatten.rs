use serde_json::Value;

const QUOTES: [char; 2] = ['"', '\''];

enum Piece<'a> {
    Node(&'a Value),
    Key(&'a str),
    Punct(&'static str),
}

/// Serialize a tree as `{key: value, ...}` / `[value, ...]` with raw strings.
///
/// Deterministic for a given tree since object keys keep document order.
pub fn serialize(tree: &Value) -> String {
    let mut out = String::new();
    let mut pending = vec![Piece::Node(tree)];
    while let Some(piece) = pending.pop() {
        match piece {
            Piece::Punct(p) => out.push_str(p),
            Piece::Key(k) => out.push_str(k),
            Piece::Node(Value::Null) => out.push_str("null"),
            Piece::Node(Value::Bool(b)) => out.push_str(if *b { "true" } else { "false" }),
            Piece::Node(Value::Number(n)) => out.push_str(&n.to_string()),
            Piece::Node(Value::String(s)) => out.push_str(s),
            Piece::Node(Value::Array(items)) => {
                let mut frame = Vec::with_capacity(items.len() * 2 + 2);
                frame.push(Piece::Punct("["));
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        frame.push(Piece::Punct(", "));
                    }
                    frame.push(Piece::Node(item));
                }
                frame.push(Piece::Punct("]"));
                pending.extend(frame.into_iter().rev());
            }
            Piece::Node(Value::Object(fields)) => {
                let mut frame = Vec::with_capacity(fields.len() * 4 + 2);
                frame.push(Piece::Punct("{"));
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        frame.push(Piece::Punct(", "));
                    }
                    frame.push(Piece::Key(key));
                    frame.push(Piece::Punct(": "));
                    frame.push(Piece::Node(value));
                }
                frame.push(Piece::Punct("}"));
                pending.extend(frame.into_iter().rev());
            }
        }
    }
    out
}

/// Drop quote characters and collapse whitespace runs to single spaces.
pub fn normalize(text: &str) -> String {
    let unquoted: String = text.chars().filter(|c| !QUOTES.contains(c)).collect();
    unquoted.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Single-line, quote-free rendering of a sanitized tree.
pub fn flatten(tree: &Value) -> String {
    normalize(&serialize(tree))
}
