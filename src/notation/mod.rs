//! Notation engine: reading scores and rendering windows of them.

pub mod midi;
pub mod model;
pub mod musicxml;
pub mod parser;

use crate::decode::read_document;
use crate::Midi2XmlError;
use model::{PartWindow, Piece, PieceWindow};
use std::path::Path;

/// Parses source documents into pieces and renders windows to interchange formats.
///
/// Rendering is split into an in-memory step and a write step so callers can
/// render a whole piece before touching the filesystem.
pub trait NotationEngine {
    fn parse(&self, path: &Path) -> Result<Piece, Midi2XmlError>;

    /// Standard MIDI File for all parts of the window.
    fn midi_bytes(&self, window: &PieceWindow<'_>) -> Result<Vec<u8>, Midi2XmlError>;

    /// Notation document for a single part of the window.
    fn notation_bytes(&self, window: &PartWindow<'_>) -> Result<Vec<u8>, Midi2XmlError>;

    fn render_midi(&self, window: &PieceWindow<'_>, path: &Path) -> Result<(), Midi2XmlError> {
        std::fs::write(path, self.midi_bytes(window)?)?;
        Ok(())
    }

    fn render_notation(&self, window: &PartWindow<'_>, path: &Path) -> Result<(), Midi2XmlError> {
        std::fs::write(path, self.notation_bytes(window)?)?;
        Ok(())
    }
}

/// Engine backed by `score-partwise` MusicXML documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct MusicXmlEngine;

impl NotationEngine for MusicXmlEngine {
    fn parse(&self, path: &Path) -> Result<Piece, Midi2XmlError> {
        let xml = read_document(path)?;
        parser::parse_musicxml(&xml)
            .map_err(|e| Midi2XmlError::ParsingError(format!("{}: {e}", path.display())))
    }

    fn midi_bytes(&self, window: &PieceWindow<'_>) -> Result<Vec<u8>, Midi2XmlError> {
        midi::window_to_smf(window)
    }

    fn notation_bytes(&self, window: &PartWindow<'_>) -> Result<Vec<u8>, Midi2XmlError> {
        Ok(musicxml::part_window_to_musicxml(window, None).into_bytes())
    }
}
