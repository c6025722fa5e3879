use clap::{Parser, Subcommand, ValueEnum};
use midi2xml::{
    fragment_corpus, prepare_corpus, FragmentConfig, Midi2XmlError, MusicXmlEngine,
    PrepareConfig, SamplingPolicy,
};
use std::path::PathBuf;

fn main() {
    let result = main_result();
    std::process::exit(match result {
        Ok(()) => 0,
        Err(err) => {
            // use Display instead of Debug for user friendly error messages
            log::error!("{err}");
            1
        }
    });
}

pub fn main_result() -> Result<(), AppError> {
    // setup logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("midi2xml=info"))
        .init();

    match CliArgs::parse().command {
        Command::Fragment {
            source_dir,
            output_dir,
            fragment_measure_length,
            name_filter,
        } => {
            let config = FragmentConfig {
                source_dir,
                output_dir,
                fragment_measure_length,
                name_filter,
            };
            log::info!("Fragmenting scores from {:?}", config.source_dir);
            let report = fragment_corpus(&MusicXmlEngine, &config)?;
            log::info!(
                "Done: {} fragments from {} pieces ({} skipped) in {:?}",
                report.fragments,
                report.pieces,
                report.skipped,
                config.output_dir
            );
        }
        Command::Prepare {
            performances_dir,
            xml_dir,
            output_dir,
            test_set_size,
            seed,
            corpus_name,
            sampling,
            vocabulary,
        } => {
            let config = PrepareConfig {
                performances_dir,
                xml_dir,
                output_dir,
                test_set_size,
                seed,
                corpus_name,
                sampling: sampling.into(),
                vocabulary,
            };
            if let Some(vocabulary) = &config.vocabulary {
                log::info!("Using vocabulary file {vocabulary:?}");
            }
            let report = prepare_corpus(&config)?;
            log::info!(
                "Done: {} train rows, {} test rows ({} skipped) in {:?}",
                report.train_rows,
                report.test_rows,
                report.skipped,
                config.output_dir
            );
        }
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Cut scores into overlapping measure windows rendered as MIDI and MusicXML.
    Fragment {
        /// Directory searched recursively for .xml and .musicxml scores.
        #[arg(long)]
        source_dir: PathBuf,
        /// Output directory, must not exist yet.
        #[arg(long)]
        output_dir: PathBuf,
        /// Number of measures per fragment.
        #[arg(long, default_value_t = FragmentConfig::DEFAULT_FRAGMENT_MEASURE_LENGTH)]
        fragment_measure_length: usize,
        /// Only keep scores whose file name contains this text.
        #[arg(long)]
        name_filter: Option<String>,
    },
    /// Build train/test corpora from performance logs and MusicXML files.
    Prepare {
        /// Directory of performance logs named `<id>.midi.txt`.
        #[arg(long)]
        performances_dir: PathBuf,
        /// Directory of MusicXML files named `<id>.xml`.
        #[arg(long)]
        xml_dir: PathBuf,
        /// Output directory, must not exist yet.
        #[arg(long)]
        output_dir: PathBuf,
        /// Number of pieces held out for testing.
        #[arg(long, default_value_t = PrepareConfig::DEFAULT_TEST_SET_SIZE)]
        test_set_size: usize,
        /// Seed of the test set selection.
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Prefix of the corpus files.
        #[arg(long, default_value = PrepareConfig::DEFAULT_CORPUS_NAME)]
        corpus_name: String,
        /// How the test set is drawn.
        #[arg(long, value_enum, default_value_t = Sampling::WithoutReplacement)]
        sampling: Sampling,
        /// Optional JSON vocabulary file mapping event tokens to codes.
        #[arg(long)]
        vocabulary: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Sampling {
    WithoutReplacement,
    WithReplacement,
}

impl From<Sampling> for SamplingPolicy {
    fn from(sampling: Sampling) -> Self {
        match sampling {
            Sampling::WithoutReplacement => Self::WithoutReplacement,
            Sampling::WithReplacement => Self::WithReplacement,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    ConfigError(String),
    #[error("parsing error: {0}")]
    ParsingError(String),
    #[error("data error: {0}")]
    DataError(String),
    #[error("other error: {0}")]
    OtherError(String),
}

impl From<Midi2XmlError> for AppError {
    fn from(error: Midi2XmlError) -> Self {
        match error {
            Midi2XmlError::ConfigError(s) => Self::ConfigError(s),
            Midi2XmlError::ParsingError(s) => Self::ParsingError(s),
            err @ Midi2XmlError::UnknownToken { .. } => Self::DataError(err.to_string()),
            Midi2XmlError::IoError(s) | Midi2XmlError::RenderError(s) => Self::OtherError(s),
            err @ Midi2XmlError::InconsistentMeasures { .. } => Self::OtherError(err.to_string()),
        }
    }
}
