use crate::Midi2XmlError;
use encoding_rs::UTF_8;
use std::path::Path;

/// Materialize a document as text, honouring a UTF-8 or UTF-16 byte order mark.
pub fn decode_document(bytes: &[u8]) -> String {
    let (cow, encoding_used, had_errors) = UTF_8.decode(bytes);
    if had_errors {
        log::debug!("Replaced malformed sequences while decoding with {encoding_used:?}");
    }
    cow.into_owned()
}

/// Read and decode a text document from disk.
pub fn read_document(path: &Path) -> Result<String, Midi2XmlError> {
    let bytes = std::fs::read(path)
        .map_err(|e| Midi2XmlError::IoError(format!("{}: {e}", path.display())))?;
    Ok(decode_document(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8_with_and_without_bom() {
        assert_eq!(decode_document(b"<a>caf\xc3\xa9</a>"), "<a>café</a>");
        assert_eq!(decode_document(b"\xef\xbb\xbf<a/>"), "<a/>");
    }

    #[test]
    fn test_decode_utf16_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<a>é</a>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_document(&bytes), "<a>é</a>");
    }

    #[test]
    fn test_decode_malformed_is_lossy() {
        assert_eq!(decode_document(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_read_missing_document() {
        let err = read_document(Path::new("does/not/exist.xml")).unwrap_err();
        assert!(matches!(err, Midi2XmlError::IoError(msg) if msg.contains("exist.xml")));
    }
}
