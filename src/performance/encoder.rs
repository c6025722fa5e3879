use crate::decode::read_document;
use crate::performance::vocabulary::PerformanceVocabulary;
use crate::Midi2XmlError;
use std::path::Path;

/// Encode a newline-delimited event log as space-delimited vocabulary codes.
///
/// Blank lines are skipped; surrounding whitespace (including a trailing `\r`)
/// is not part of a token. `file` only names the log in errors.
pub fn encode_performance(
    log: &str,
    vocabulary: &PerformanceVocabulary,
    file: &str,
) -> Result<String, Midi2XmlError> {
    let mut codes = Vec::new();
    for token in log.lines().map(str::trim).filter(|t| !t.is_empty()) {
        let Some(code) = vocabulary.code(token) else {
            return Err(Midi2XmlError::UnknownToken {
                token: token.to_string(),
                file: file.to_string(),
            });
        };
        codes.push(code);
    }
    Ok(codes.join(" "))
}

pub fn encode_performance_file(
    path: &Path,
    vocabulary: &PerformanceVocabulary,
) -> Result<String, Midi2XmlError> {
    let log = read_document(path)?;
    encode_performance(&log, vocabulary, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> PerformanceVocabulary {
        [("note_on_60", "5"), ("note_off_60", "12"), ("time_shift_10", "40")]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_encode_skips_blank_lines() {
        let encoded = encode_performance("note_on_60\n\nnote_off_60\n", &fixture(), "p").unwrap();
        assert_eq!(encoded, "5 12");
    }

    #[test]
    fn test_encode_preserves_order_and_count() {
        let log = "time_shift_10\r\nnote_off_60\r\nnote_on_60\r\n  \r\ntime_shift_10";
        let encoded = encode_performance(log, &fixture(), "p").unwrap();
        assert_eq!(encoded, "40 12 5 40");
        assert_eq!(encoded.split(' ').count(), 4);
    }

    #[test]
    fn test_encode_empty_log() {
        assert_eq!(encode_performance("", &fixture(), "p").unwrap(), "");
        assert_eq!(encode_performance("\n\n", &fixture(), "p").unwrap(), "");
    }

    #[test]
    fn test_unknown_token_is_fatal() {
        let err = encode_performance("note_on_60\nnote_on_61\n", &fixture(), "perf/3.midi.txt")
            .unwrap_err();
        assert!(err.is_fatal());
        match err {
            Midi2XmlError::UnknownToken { token, file } => {
                assert_eq!(token, "note_on_61");
                assert_eq!(file, "perf/3.midi.txt");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_encode_file_with_builtin_vocabulary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0.midi.txt");
        std::fs::write(&path, "velocity_16\nnote_on_60\ntime_shift_100\nnote_off_60\n").unwrap();
        let encoded = encode_performance_file(&path, &PerformanceVocabulary::default()).unwrap();
        assert_eq!(encoded, "373 62 357 190");

        let missing = encode_performance_file(&dir.path().join("nope"), &fixture());
        assert!(matches!(missing, Err(Midi2XmlError::IoError(_))));
    }
}
