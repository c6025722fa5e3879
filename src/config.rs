use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::Midi2XmlError;

/// Name of the file recording the configuration a corpus was built with.
pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentConfig {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub fragment_measure_length: usize,
    /// Only keep sources whose file name contains this text (case-insensitive)
    pub name_filter: Option<String>,
}

impl FragmentConfig {
    pub const DEFAULT_FRAGMENT_MEASURE_LENGTH: usize = 2;

    pub fn new(source_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            output_dir: output_dir.into(),
            fragment_measure_length: Self::DEFAULT_FRAGMENT_MEASURE_LENGTH,
            name_filter: None,
        }
    }

    /// Checked before anything is written
    pub fn validate(&self) -> Result<(), Midi2XmlError> {
        if self.fragment_measure_length == 0 {
            return Err(Midi2XmlError::ConfigError(
                "fragment measure length must be positive".to_string(),
            ));
        }
        require_dir(&self.source_dir, "source")?;
        require_fresh(&self.output_dir)
    }
}

/// How the test set is drawn from the piece identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SamplingPolicy {
    /// Distinct identifiers, the test set has exactly the requested size
    #[default]
    WithoutReplacement,
    /// Independent draws that may repeat an identifier
    WithReplacement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareConfig {
    pub performances_dir: PathBuf,
    pub xml_dir: PathBuf,
    pub output_dir: PathBuf,
    pub test_set_size: usize,
    pub seed: u64,
    pub corpus_name: String,
    pub sampling: SamplingPolicy,
    /// JSON vocabulary file, the built-in vocabulary when absent
    pub vocabulary: Option<PathBuf>,
}

impl PrepareConfig {
    pub const DEFAULT_TEST_SET_SIZE: usize = 10;
    pub const DEFAULT_CORPUS_NAME: &'static str = "music21";

    pub fn new(
        performances_dir: impl Into<PathBuf>,
        xml_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            performances_dir: performances_dir.into(),
            xml_dir: xml_dir.into(),
            output_dir: output_dir.into(),
            test_set_size: Self::DEFAULT_TEST_SET_SIZE,
            seed: 0,
            corpus_name: Self::DEFAULT_CORPUS_NAME.to_string(),
            sampling: SamplingPolicy::default(),
            vocabulary: None,
        }
    }

    /// Checked before anything is written
    pub fn validate(&self) -> Result<(), Midi2XmlError> {
        if self.corpus_name.is_empty() || self.corpus_name.contains(['/', '\\']) {
            return Err(Midi2XmlError::ConfigError(format!(
                "invalid corpus name {:?}",
                self.corpus_name
            )));
        }
        require_dir(&self.performances_dir, "performances")?;
        require_dir(&self.xml_dir, "xml")?;
        if let Some(vocabulary) = &self.vocabulary {
            if !vocabulary.is_file() {
                return Err(Midi2XmlError::ConfigError(format!(
                    "vocabulary file not found {vocabulary:?}"
                )));
            }
        }
        require_fresh(&self.output_dir)
    }
}

fn require_dir(path: &Path, what: &str) -> Result<(), Midi2XmlError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(Midi2XmlError::ConfigError(format!(
            "{what} directory not found {path:?}"
        )))
    }
}

fn require_fresh(path: &Path) -> Result<(), Midi2XmlError> {
    if path.exists() {
        Err(Midi2XmlError::ConfigError(format!(
            "output directory already exists {path:?}"
        )))
    } else {
        Ok(())
    }
}

/// Assumes the folder exists
pub fn save_config<T: Serialize>(config: &T, dir: &Path) -> Result<(), Midi2XmlError> {
    let json = serde_json::to_string_pretty(config).map_err(|err| {
        Midi2XmlError::ConfigError(format!("Could not save configuration {err:}"))
    })?;
    let mut file = File::create(dir.join(CONFIG_FILE_NAME))?;
    file.write_all(json.as_bytes())?;
    Ok(())
}
