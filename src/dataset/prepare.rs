use crate::config::{save_config, PrepareConfig};
use crate::dataset::corpus::{write_id_list, CorpusWriter, Split};
use crate::dataset::split::SplitAssignment;
use crate::document::sanitize::ExcludedFields;
use crate::document::simplify_notation_file;
use crate::performance::{encode_performance_file, PerformanceVocabulary};
use crate::Midi2XmlError;
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix of performance log file names, stripped to find the notation file.
pub const PERFORMANCE_SUFFIX: &str = ".midi.txt";
pub const TRAIN_PIECES_FILE: &str = "train_pieces.txt";
pub const TEST_PIECES_FILE: &str = "test_pieces.txt";

/// Identifier with the performance suffix removed, if it has one.
pub fn piece_stem(id: &str) -> &str {
    id.strip_suffix(PERFORMANCE_SUFFIX).unwrap_or(id)
}

pub fn notation_path_for(xml_dir: &Path, id: &str) -> PathBuf {
    xml_dir.join(format!("{}.xml", piece_stem(id)))
}

/// File names of the regular files in the performances directory, sorted.
pub fn list_piece_ids(performances_dir: &Path) -> Result<Vec<String>, Midi2XmlError> {
    let mut ids = Vec::new();
    for entry in fs::read_dir(performances_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => ids.push(name),
            Err(name) => log::warn!("ignoring performance file with a non UTF-8 name {name:?}"),
        }
    }
    ids.sort();
    Ok(ids)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PrepareReport {
    pub train_rows: usize,
    pub test_rows: usize,
    pub skipped: usize,
}

/// Build the train/test corpora from performance logs and their notation files.
///
/// Missing, unreadable or unparseable inputs skip the identifier. An unknown
/// performance token aborts the run.
pub fn prepare_corpus(config: &PrepareConfig) -> Result<PrepareReport, Midi2XmlError> {
    config.validate()?;
    let vocabulary = match &config.vocabulary {
        Some(path) => PerformanceVocabulary::from_json_file(path)?,
        None => PerformanceVocabulary::default(),
    };
    let excluded = ExcludedFields::default();
    let ids = list_piece_ids(&config.performances_dir)?;

    let split = SplitAssignment::new(&ids, config.test_set_size, config.seed, config.sampling);

    fs::create_dir_all(&config.output_dir)?;
    save_config(config, &config.output_dir)?;
    write_id_list(&config.output_dir.join(TRAIN_PIECES_FILE), split.train_ids())?;
    write_id_list(&config.output_dir.join(TEST_PIECES_FILE), split.test_ids())?;
    log::info!(
        "{} pieces, {} for training and {} for testing",
        ids.len(),
        split.train_ids().len(),
        split.test_ids().len()
    );

    let mut writer = CorpusWriter::create(&config.output_dir, &config.corpus_name)?;
    let mut report = PrepareReport::default();
    let total = ids.len();
    for (i, id) in ids.iter().enumerate() {
        log::info!("processing id: {i} / {total} {id}");
        let performance_path = config.performances_dir.join(id);
        let notation_path = notation_path_for(&config.xml_dir, id);
        if !performance_path.is_file() || !notation_path.is_file() {
            log::warn!(
                "skipping {id}: either performance path {} or xml path {} does not exist",
                performance_path.display(),
                notation_path.display()
            );
            report.skipped += 1;
            continue;
        }

        let row = encode_performance_file(&performance_path, &vocabulary).and_then(|performance| {
            let notation = simplify_notation_file(&notation_path, &excluded)?;
            Ok((performance, notation))
        });
        let (performance, notation) = match row {
            Ok(row) => row,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                log::warn!("skipping {id}: {err}");
                report.skipped += 1;
                continue;
            }
        };

        if split.is_test(id) {
            writer.write_row(Split::Test, &performance, &notation)?;
            report.test_rows += 1;
        } else {
            writer.write_row(Split::Train, &performance, &notation)?;
            report.train_rows += 1;
        }
    }
    writer.finish()?;

    log::info!(
        "wrote {} train rows and {} test rows, skipped {}",
        report.train_rows,
        report.test_rows,
        report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SamplingPolicy;
    use crate::dataset::corpus::CorpusPaths;

    const NOTATION: &str = r#"<score-partwise version="3.1"><part id="P1"><measure number="1"><note default-x="3"><pitch><step>C</step><octave>4</octave></pitch></note></measure></part></score-partwise>"#;

    fn init_logger() {
        env_logger::builder()
            .is_test(true)
            .try_init()
            .unwrap_or_default();
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        config: PrepareConfig,
    }

    /// `count` complete pieces, each with a performance log and its notation file.
    fn fixture(count: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let performances = dir.path().join("performances");
        let xml = dir.path().join("xml");
        fs::create_dir_all(&performances).unwrap();
        fs::create_dir_all(&xml).unwrap();
        for i in 0..count {
            fs::write(
                performances.join(format!("piece{i}.midi.txt")),
                format!("note_on_{i}\n\nnote_off_{i}\n"),
            )
            .unwrap();
            fs::write(xml.join(format!("piece{i}.xml")), NOTATION).unwrap();
        }
        let config = PrepareConfig::new(&performances, &xml, dir.path().join("out"));
        Fixture { _dir: dir, config }
    }

    #[test]
    fn test_piece_stem_strips_suffix_only() {
        assert_eq!(piece_stem("bwv1.midi.txt"), "bwv1");
        // only the trailing suffix is removed, not any of its characters
        assert_eq!(piece_stem("txt_dim.midi.txt"), "txt_dim");
        assert_eq!(piece_stem("bwv1"), "bwv1");
        assert_eq!(
            notation_path_for(Path::new("xml"), "a.midi.txt"),
            Path::new("xml").join("a.xml")
        );
    }

    #[test]
    fn test_prepare_corpus() {
        init_logger();
        let mut fixture = fixture(6);
        fixture.config.test_set_size = 2;
        fixture.config.seed = 9;
        let report = prepare_corpus(&fixture.config).unwrap();
        assert_eq!(
            report,
            PrepareReport {
                train_rows: 4,
                test_rows: 2,
                skipped: 0
            }
        );

        let out = &fixture.config.output_dir;
        let train_ids = fs::read_to_string(out.join(TRAIN_PIECES_FILE)).unwrap();
        let test_ids = fs::read_to_string(out.join(TEST_PIECES_FILE)).unwrap();
        assert_eq!(train_ids.lines().count(), 4);
        assert_eq!(test_ids.lines().count(), 2);
        assert!(test_ids.lines().all(|id| !train_ids.lines().any(|t| t == id)));

        let paths = CorpusPaths::new(out, "music21");
        let train = fs::read_to_string(&paths.train_tsv).unwrap();
        let input = fs::read_to_string(&paths.train_input).unwrap();
        let output = fs::read_to_string(&paths.train_output).unwrap();
        assert_eq!(train.lines().count(), 4);
        assert_eq!(input.lines().count(), 4);
        assert_eq!(output.lines().count(), 4);
        for ((row, perf), notation) in train.lines().zip(input.lines()).zip(output.lines()) {
            assert_eq!(row, format!("{perf}\t{notation}"));
            assert_eq!(
                notation,
                "{score-partwise: {part: {measure: {@number: 1, note: {pitch: {step: C, octave: 4}}}}}}"
            );
        }
        assert_eq!(fs::read_to_string(&paths.test_tsv).unwrap().lines().count(), 2);
        assert!(out.join("config.json").exists());
    }

    #[test]
    fn test_first_train_row_encoding() {
        let mut fixture = fixture(1);
        fixture.config.test_set_size = 0;
        prepare_corpus(&fixture.config).unwrap();
        let paths = CorpusPaths::new(&fixture.config.output_dir, "music21");
        // note_on_0 and note_off_0 with the built-in vocabulary
        assert_eq!(fs::read_to_string(paths.train_input).unwrap(), "2 130\n");
    }

    #[test]
    fn test_missing_and_broken_inputs_are_skipped() {
        init_logger();
        let mut fixture = fixture(3);
        fixture.config.test_set_size = 0;
        fs::remove_file(fixture.config.xml_dir.join("piece1.xml")).unwrap();
        fs::write(fixture.config.xml_dir.join("piece2.xml"), "<score-partwise>").unwrap();
        fs::create_dir(fixture.config.performances_dir.join("subdir")).unwrap();

        let report = prepare_corpus(&fixture.config).unwrap();
        assert_eq!(
            report,
            PrepareReport {
                train_rows: 1,
                test_rows: 0,
                skipped: 2
            }
        );
        let train_ids =
            fs::read_to_string(fixture.config.output_dir.join(TRAIN_PIECES_FILE)).unwrap();
        assert_eq!(train_ids, "piece0.midi.txt\npiece1.midi.txt\npiece2.midi.txt");
    }

    #[test]
    fn test_unknown_token_aborts_the_run() {
        let fixture = fixture(3);
        fs::write(
            fixture.config.performances_dir.join("piece1.midi.txt"),
            "note_on_1\nsustain_on\n",
        )
        .unwrap();
        let err = prepare_corpus(&fixture.config).unwrap_err();
        match err {
            Midi2XmlError::UnknownToken { token, file } => {
                assert_eq!(token, "sustain_on");
                assert!(file.ends_with("piece1.midi.txt"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_custom_vocabulary_and_corpus_name() {
        let mut fixture = fixture(1);
        let vocabulary = fixture.config.xml_dir.join("vocab.json");
        fs::write(&vocabulary, r#"{"note_on_0": "5", "note_off_0": "12"}"#).unwrap();
        fixture.config.vocabulary = Some(vocabulary);
        fixture.config.corpus_name = "bach".to_string();
        fixture.config.test_set_size = 1;
        fixture.config.sampling = SamplingPolicy::WithReplacement;

        let report = prepare_corpus(&fixture.config).unwrap();
        assert_eq!(report.test_rows, 1);
        let paths = CorpusPaths::new(&fixture.config.output_dir, "bach");
        let test = fs::read_to_string(paths.test_tsv).unwrap();
        assert!(test.starts_with("5 12\t{score-partwise"));
        assert_eq!(fs::read_to_string(paths.train_tsv).unwrap(), "");
    }

    #[test]
    fn test_existing_output_fails_before_writing() {
        let fixture = fixture(2);
        fs::create_dir_all(&fixture.config.output_dir).unwrap();
        assert!(matches!(
            prepare_corpus(&fixture.config),
            Err(Midi2XmlError::ConfigError(_))
        ));
        assert!(!fixture.config.output_dir.join(TRAIN_PIECES_FILE).exists());
    }
}
