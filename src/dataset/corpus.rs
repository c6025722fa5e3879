use crate::Midi2XmlError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Side of the split a row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

/// Paths of the four corpus files for a corpus name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusPaths {
    pub train_tsv: PathBuf,
    pub test_tsv: PathBuf,
    pub train_input: PathBuf,
    pub train_output: PathBuf,
}

impl CorpusPaths {
    pub fn new(dir: &Path, corpus_name: &str) -> Self {
        Self {
            train_tsv: dir.join(format!("{corpus_name}.train.tsv")),
            test_tsv: dir.join(format!("{corpus_name}.test.tsv")),
            train_input: dir.join(format!("{corpus_name}.train.input")),
            train_output: dir.join(format!("{corpus_name}.train.output")),
        }
    }
}

/// Appends aligned (performance, notation) rows to the corpus files.
///
/// Every file is opened once at creation and flushed by [`CorpusWriter::finish`].
#[derive(Debug)]
pub struct CorpusWriter {
    train_tsv: BufWriter<File>,
    test_tsv: BufWriter<File>,
    train_input: BufWriter<File>,
    train_output: BufWriter<File>,
}

impl CorpusWriter {
    pub fn create(dir: &Path, corpus_name: &str) -> Result<Self, Midi2XmlError> {
        let paths = CorpusPaths::new(dir, corpus_name);
        let open = |path: &Path| -> Result<BufWriter<File>, Midi2XmlError> {
            let file = File::create(path)
                .map_err(|e| Midi2XmlError::IoError(format!("{}: {e}", path.display())))?;
            Ok(BufWriter::new(file))
        };
        Ok(Self {
            train_tsv: open(&paths.train_tsv)?,
            test_tsv: open(&paths.test_tsv)?,
            train_input: open(&paths.train_input)?,
            train_output: open(&paths.train_output)?,
        })
    }

    /// Train rows also feed the separate input and output corpora.
    pub fn write_row(
        &mut self,
        split: Split,
        performance: &str,
        notation: &str,
    ) -> Result<(), Midi2XmlError> {
        for field in [performance, notation] {
            if field.contains(['\t', '\n', '\r']) {
                return Err(Midi2XmlError::RenderError(format!(
                    "corpus field contains a tab or line break: {:?}",
                    truncate(field)
                )));
            }
        }
        match split {
            Split::Test => writeln!(self.test_tsv, "{performance}\t{notation}")?,
            Split::Train => {
                writeln!(self.train_tsv, "{performance}\t{notation}")?;
                writeln!(self.train_input, "{performance}")?;
                writeln!(self.train_output, "{notation}")?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<(), Midi2XmlError> {
        self.train_tsv.flush()?;
        self.test_tsv.flush()?;
        self.train_input.flush()?;
        self.train_output.flush()?;
        Ok(())
    }
}

fn truncate(field: &str) -> &str {
    field.char_indices().nth(40).map_or(field, |(i, _)| &field[..i])
}

/// Newline-joined identifiers, no trailing newline.
pub fn write_id_list(path: &Path, ids: &[String]) -> Result<(), Midi2XmlError> {
    std::fs::write(path, ids.join("\n"))
        .map_err(|e| Midi2XmlError::IoError(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_rows_are_routed_by_split() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = CorpusWriter::create(dir.path(), "music21").unwrap();
        writer.write_row(Split::Train, "5 12", "{note: C4}").unwrap();
        writer.write_row(Split::Test, "7", "{rest: null}").unwrap();
        writer.write_row(Split::Train, "", "{}").unwrap();
        writer.finish().unwrap();

        let paths = CorpusPaths::new(dir.path(), "music21");
        assert_eq!(
            fs::read_to_string(&paths.train_tsv).unwrap(),
            "5 12\t{note: C4}\n\t{}\n"
        );
        assert_eq!(
            fs::read_to_string(&paths.test_tsv).unwrap(),
            "7\t{rest: null}\n"
        );
        assert_eq!(fs::read_to_string(&paths.train_input).unwrap(), "5 12\n\n");
        assert_eq!(
            fs::read_to_string(&paths.train_output).unwrap(),
            "{note: C4}\n{}\n"
        );
    }

    #[test]
    fn test_rejects_fields_breaking_alignment() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = CorpusWriter::create(dir.path(), "c").unwrap();
        assert!(writer.write_row(Split::Train, "5\t6", "x").is_err());
        assert!(writer.write_row(Split::Test, "5", "a\nb").is_err());
        writer.finish().unwrap();
        let paths = CorpusPaths::new(dir.path(), "c");
        assert_eq!(fs::read_to_string(paths.train_tsv).unwrap(), "");
        assert_eq!(fs::read_to_string(paths.train_input).unwrap(), "");
    }

    #[test]
    fn test_write_id_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train_pieces.txt");
        write_id_list(&path, &["a.midi.txt".to_string(), "b.midi.txt".to_string()]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a.midi.txt\nb.midi.txt");
        write_id_list(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}
