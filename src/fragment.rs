use crate::config::{save_config, FragmentConfig};
use crate::notation::model::{PartWindow, Piece, PieceWindow};
use crate::notation::NotationEngine;
use crate::Midi2XmlError;
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Directory, under the output directory, holding the MIDI side of each fragment.
pub const PIECES_DIR: &str = "pieces";

const SOURCE_EXTENSIONS: [&str; 2] = ["xml", "musicxml"];

/// Slides a fixed-width measure window over a piece with a stride of one measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragmenter {
    length: usize,
}

impl Fragmenter {
    pub fn new(length: usize) -> Result<Self, Midi2XmlError> {
        if length == 0 {
            return Err(Midi2XmlError::ConfigError(
                "fragment measure length must be positive".to_string(),
            ));
        }
        Ok(Self { length })
    }

    pub const fn length(&self) -> usize {
        self.length
    }

    /// Fragments of the piece in emission order.
    ///
    /// A piece shorter than the fragment length yields nothing. Calling this
    /// again restarts the sequence.
    pub fn fragments<'a>(&self, piece: &'a Piece) -> Result<Fragments<'a>, Midi2XmlError> {
        let measure_count = piece.measure_count()?;
        let count = (measure_count + 1).saturating_sub(self.length);
        Ok(Fragments {
            piece,
            length: self.length,
            next: 0,
            count,
        })
    }
}

/// An aligned pair of windows over the same measures.
#[derive(Debug, Clone)]
pub struct Fragment<'a> {
    /// Position in emission order, equal to the start measure.
    pub index: usize,
    pub measures: Range<usize>,
    /// Every part, source of the performance side
    pub midi: PieceWindow<'a>,
    /// First part only, source of the notation side
    pub notation: PartWindow<'a>,
}

#[derive(Debug, Clone)]
pub struct Fragments<'a> {
    piece: &'a Piece,
    length: usize,
    next: usize,
    count: usize,
}

impl<'a> Iterator for Fragments<'a> {
    type Item = Fragment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let index = self.next;
        self.next += 1;
        let measures = index..index + self.length;
        let notation = self.piece.parts.first()?.window(measures.clone());
        let midi = self.piece.window(measures.clone());
        Some(Fragment {
            index,
            measures,
            midi,
            notation,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Fragments<'_> {}

/// Fully rendered fragment, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFragment {
    pub index: usize,
    pub midi: Vec<u8>,
    pub notation: Vec<u8>,
}

/// File name stem shared by both sides of a fragment.
pub fn fragment_tag(piece_index: usize, fragment_index: usize) -> String {
    format!("{piece_index}.{fragment_index}")
}

/// Render every fragment of the piece in memory, failing if any of them fails.
pub fn render_piece<E: NotationEngine>(
    engine: &E,
    fragmenter: &Fragmenter,
    piece: &Piece,
) -> Result<Vec<RenderedFragment>, Midi2XmlError> {
    fragmenter
        .fragments(piece)?
        .map(|fragment| {
            Ok::<_, Midi2XmlError>(RenderedFragment {
                index: fragment.index,
                midi: engine.midi_bytes(&fragment.midi)?,
                notation: engine.notation_bytes(&fragment.notation)?,
            })
        })
        .collect()
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FragmentReport {
    pub pieces: usize,
    pub skipped: usize,
    pub fragments: usize,
}

/// Fragment every source score under the configured directory.
///
/// A piece that fails to parse, has inconsistent parts or fails to render is
/// skipped with a warning and nothing is written for it.
pub fn fragment_corpus<E: NotationEngine>(
    engine: &E,
    config: &FragmentConfig,
) -> Result<FragmentReport, Midi2XmlError> {
    config.validate()?;
    let fragmenter = Fragmenter::new(config.fragment_measure_length)?;
    let sources = discover_sources(&config.source_dir, config.name_filter.as_deref())?;

    fs::create_dir_all(config.output_dir.join(PIECES_DIR))?;
    save_config(config, &config.output_dir)?;

    let mut report = FragmentReport::default();
    let total = sources.len();
    for (piece_index, path) in sources.iter().enumerate() {
        log::info!("processing piece #: {piece_index} / {total}");
        log::info!("processing piece: {}", path.display());

        let rendered = engine
            .parse(path)
            .and_then(|piece| render_piece(engine, &fragmenter, &piece));
        let rendered = match rendered {
            Ok(rendered) => rendered,
            Err(err) => {
                log::warn!(
                    "skipping piece #{piece_index} ({}): {err}",
                    path.display()
                );
                report.skipped += 1;
                continue;
            }
        };

        for fragment in &rendered {
            let tag = fragment_tag(piece_index, fragment.index);
            let midi_path = config
                .output_dir
                .join(PIECES_DIR)
                .join(format!("{tag}.midi"));
            let notation_path = config.output_dir.join(format!("{tag}.musicxml"));
            log::debug!("writing fragment {tag}");
            fs::write(midi_path, &fragment.midi)?;
            fs::write(notation_path, &fragment.notation)?;
        }
        if rendered.is_empty() {
            log::info!(
                "piece #{piece_index} is shorter than {} measures",
                fragmenter.length()
            );
        }
        report.pieces += 1;
        report.fragments += rendered.len();
    }

    log::info!(
        "fragmented {} pieces into {} fragments, skipped {}",
        report.pieces,
        report.fragments,
        report.skipped
    );
    Ok(report)
}

/// Notation sources under `root`, sorted by path so piece indices are stable.
pub fn discover_sources(
    root: &Path,
    name_filter: Option<&str>,
) -> Result<Vec<PathBuf>, Midi2XmlError> {
    let filter = name_filter.map(str::to_lowercase);
    let mut sources = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }
            let is_source = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e.to_lowercase().as_str()));
            let matches_filter = filter.as_ref().map_or(true, |f| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.to_lowercase().contains(f.as_str()))
            });
            if is_source && matches_filter {
                sources.push(path);
            }
        }
    }
    sources.sort();
    Ok(sources)
}
