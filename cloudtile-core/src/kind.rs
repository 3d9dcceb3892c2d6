//! The file-kind graph.
//!
//! Kinds form a strict chain, vector -> FlatGeobuf -> MBTiles -> PMTiles.
//! Each kind knows the single kind it converts into and the tool that does
//! the conversion; PMTiles is terminal.

use std::fmt;

use crate::error::{StateError, ValidationError};

/// Vector formats accepted as pipeline input.
pub const VECTOR_SUFFIXES: &[&str] = &["geojson", "gpkg", "parquet"];
pub const FLATGEOBUF_SUFFIXES: &[&str] = &["fgb"];
pub const MBTILES_SUFFIXES: &[&str] = &["mbtiles"];
pub const PMTILES_SUFFIXES: &[&str] = &["pmtiles"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// Raw vector data (GeoJSON, GeoPackage, GeoParquet).
    VectorSource,
    /// FlatGeobuf, the input tippecanoe reads.
    Intermediate,
    /// MBTiles produced by tippecanoe.
    TileArchive,
    /// PMTiles, ready to serve.
    FinalArchive,
}

impl FileKind {
    /// Classifies a file extension (without the dot).
    ///
    /// Matching is exact after lower-casing. Anything that is not one of the
    /// three tile formats is treated as a vector candidate and fails there,
    /// so every unsupported format reports the vector allow-list.
    pub fn classify(suffix: &str) -> Result<Self, ValidationError> {
        let suffix = suffix.to_lowercase();
        [
            FileKind::Intermediate,
            FileKind::TileArchive,
            FileKind::FinalArchive,
        ]
        .into_iter()
        .find(|kind| kind.suffixes().contains(&suffix.as_str()))
        .map_or_else(|| FileKind::VectorSource.accept(&suffix), Ok)
    }

    /// Checks that `suffix` belongs to this kind.
    pub fn accept(self, suffix: &str) -> Result<Self, ValidationError> {
        let suffix = suffix.to_lowercase();
        if self.suffixes().contains(&suffix.as_str()) {
            Ok(self)
        } else {
            Err(ValidationError::UnsupportedFormat {
                suffix,
                allowed: self.suffixes(),
            })
        }
    }

    pub fn suffixes(self) -> &'static [&'static str] {
        match self {
            FileKind::VectorSource => VECTOR_SUFFIXES,
            FileKind::Intermediate => FLATGEOBUF_SUFFIXES,
            FileKind::TileArchive => MBTILES_SUFFIXES,
            FileKind::FinalArchive => PMTILES_SUFFIXES,
        }
    }

    /// The one kind this kind converts into.
    pub fn next(self) -> Result<Self, StateError> {
        match self {
            FileKind::VectorSource => Ok(FileKind::Intermediate),
            FileKind::Intermediate => Ok(FileKind::TileArchive),
            FileKind::TileArchive => Ok(FileKind::FinalArchive),
            FileKind::FinalArchive => Err(StateError::NoFurtherConversion(self)),
        }
    }

    /// Suffix (with dot) of the file this kind converts into.
    pub fn target_suffix(self) -> Option<&'static str> {
        match self {
            FileKind::VectorSource => Some(".fgb"),
            FileKind::Intermediate => Some(".mbtiles"),
            FileKind::TileArchive => Some(".pmtiles"),
            FileKind::FinalArchive => None,
        }
    }

    /// External program that leaves this kind.
    pub fn program(self) -> Option<&'static str> {
        match self {
            FileKind::VectorSource => Some("ogr2ogr"),
            FileKind::Intermediate => Some("tippecanoe"),
            FileKind::TileArchive => Some("pmtiles"),
            FileKind::FinalArchive => None,
        }
    }

    /// Fails unless `to` is exactly the next kind after `self`.
    pub fn check_transition(self, to: FileKind) -> Result<(), StateError> {
        let expected = self.next()?;
        if expected == to {
            Ok(())
        } else {
            Err(StateError::IllegalTransition {
                from: self,
                to,
                expected,
            })
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileKind::VectorSource => "vector",
            FileKind::Intermediate => "FlatGeobuf",
            FileKind::TileArchive => "MBTiles",
            FileKind::FinalArchive => "PMTiles",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_lowercases_before_matching() {
        assert_eq!(FileKind::classify("FGB").unwrap(), FileKind::Intermediate);
        assert_eq!(FileKind::classify("GeoJSON").unwrap(), FileKind::VectorSource);
        assert_eq!(FileKind::classify("pmtiles").unwrap(), FileKind::FinalArchive);
    }

    #[test]
    fn unknown_suffix_reports_vector_allow_list() {
        match FileKind::classify("shp") {
            Err(ValidationError::UnsupportedFormat { suffix, allowed }) => {
                assert_eq!(suffix, "shp");
                assert_eq!(allowed, VECTOR_SUFFIXES);
            }
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn chain_is_linear_and_terminal() {
        let mut kind = FileKind::VectorSource;
        let mut seen = vec![kind];
        while let Ok(next) = kind.next() {
            seen.push(next);
            kind = next;
        }
        assert_eq!(
            seen,
            vec![
                FileKind::VectorSource,
                FileKind::Intermediate,
                FileKind::TileArchive,
                FileKind::FinalArchive
            ]
        );
    }

    #[test]
    fn skipping_a_step_is_illegal() {
        let err = FileKind::VectorSource
            .check_transition(FileKind::TileArchive)
            .unwrap_err();
        assert!(matches!(
            err,
            StateError::IllegalTransition {
                expected: FileKind::Intermediate,
                ..
            }
        ));
        assert!(matches!(
            FileKind::FinalArchive.check_transition(FileKind::VectorSource),
            Err(StateError::NoFurtherConversion(FileKind::FinalArchive))
        ));
    }
}
