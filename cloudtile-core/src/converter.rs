//! High-level pipeline: walks files along vector -> FlatGeobuf -> MBTiles -> PMTiles.
//!
//! A [`Converter`] composes the settings store, the file-kind graph and the
//! three collaborators ([`ToolRunner`], [`ObjectStore`]) into the two
//! operations callers actually run:
//!   - [`Converter::convert`] takes exactly one legal step.
//!   - [`Converter::single_step_convert`] chains every step from a vector or
//!     FlatGeobuf file to a PMTiles archive, discarding what it consumed.
//!
//! # Modes
//! - [`Mode::Local`]: inputs are read from and outputs are left on local disk.
//! - [`Mode::Remote`]: inputs are downloaded from the object store into the
//!   work directory, outputs are uploaded and every local copy is removed.
//!
//! # Zoom resolution
//! Tile building needs both zoom levels. For each level the first source
//! that has one wins:
//!   1. an explicit `minimum-zoom`/`maximum-zoom` setting override
//!   2. the value already loaded from the settings override file
//!   3. the request's own min/max arguments
//!
//! The resolved pair is committed as one unit, so override order never trips
//! the ordering check halfway.
//!
//! # Error Handling
//! Each step fails fast and nothing is retried. Files a failed run already
//! produced stay on disk; only the failing tool's partial output is removed.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::contract::{ObjectStore, ToolRunner};
use crate::error::{Result, StateError};
use crate::geofile::GeoFile;
use crate::kind::FileKind;
use crate::settings::{
    normalize_key, SettingValue, TippecanoeSettings, ZoomLevel, DEFAULT_SCHEMA, MAXIMUM_ZOOM,
    MINIMUM_ZOOM,
};

/// Where pipeline files live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Local,
    Remote,
}

/// Everything a conversion may be asked to apply on top of the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertRequest {
    pub minimum_zoom: Option<u32>,
    pub maximum_zoom: Option<ZoomLevel>,
    /// Settings file merged on top of the packaged baseline.
    pub config: Option<PathBuf>,
    /// Ordered setting overrides, applied last.
    pub overrides: Vec<(String, SettingValue)>,
    /// Appended to the tile archive's file name.
    pub label: Option<String>,
}

impl ConvertRequest {
    pub fn with_zoom_levels(mut self, min: u32, max: ZoomLevel) -> Self {
        self.minimum_zoom = Some(min);
        self.maximum_zoom = Some(max);
        self
    }
}

pub struct Converter<R, S> {
    runner: R,
    store: S,
    mode: Mode,
    work_dir: PathBuf,
    schema: String,
}

impl<R, S> Converter<R, S>
where
    R: ToolRunner,
    S: ObjectStore,
{
    pub fn new(runner: R, store: S, mode: Mode) -> Self {
        Self {
            runner,
            store,
            mode,
            work_dir: PathBuf::from("."),
            schema: DEFAULT_SCHEMA.to_string(),
        }
    }

    /// Directory remote inputs are downloaded into.
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// Replaces the packaged baseline schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Resolves `origin` to a classified file, downloading it first in
    /// remote mode.
    pub async fn load_file(&self, origin: &str) -> Result<GeoFile> {
        match self.mode {
            Mode::Local => GeoFile::open(origin),
            Mode::Remote => GeoFile::download(origin, &self.store, &self.work_dir).await,
        }
    }

    /// Fails unless `file` can be converted straight into `target`.
    pub fn expect_transition(&self, file: &GeoFile, target: FileKind) -> Result<()> {
        file.kind().check_transition(target).map_err(|e| {
            error!(file = %file.path().display(), error = %e, "Illegal conversion requested");
            e.into()
        })
    }

    /// Builds the settings for one tile-building run.
    pub fn tile_settings(&self, request: &ConvertRequest) -> Result<TippecanoeSettings> {
        let mut settings = TippecanoeSettings::load(&self.schema, request.config.as_deref())?;

        let mut explicit_min = None;
        let mut explicit_max = None;
        let mut others = Vec::with_capacity(request.overrides.len());
        for (key, value) in &request.overrides {
            match normalize_key(key).as_str() {
                MINIMUM_ZOOM => explicit_min = Some(ZoomLevel::minimum(MINIMUM_ZOOM, value)?),
                MAXIMUM_ZOOM => explicit_max = Some(ZoomLevel::from_setting(MAXIMUM_ZOOM, value)?),
                _ => others.push((key.as_str(), value.clone())),
            }
        }
        settings.override_settings(others)?;

        let min = explicit_min
            .or_else(|| settings.minimum_zoom())
            .or(request.minimum_zoom);
        let max = explicit_max
            .or_else(|| settings.maximum_zoom())
            .or(request.maximum_zoom);
        if let (Some(min), Some(max)) = (min, max) {
            settings.set_zoom_levels(min, max)?;
        }
        Ok(settings)
    }

    /// Takes one step along the chain. Settings only apply to tile building.
    pub async fn convert(&self, origin: &GeoFile, request: &ConvertRequest) -> Result<GeoFile> {
        let settings = match origin.kind() {
            FileKind::Intermediate => Some(self.tile_settings(request)?),
            _ => None,
        };
        let result = origin
            .convert(&self.runner, settings.as_ref(), request.label.as_deref())
            .await?;

        if self.mode == Mode::Remote {
            result.location().upload(&self.store).await?;
            origin.location().remove()?;
            result.location().remove()?;
        }
        info!(from = %origin.name(), to = %result.name(), "Conversion finished");
        Ok(result)
    }

    /// Converts a vector or FlatGeobuf file all the way to PMTiles.
    ///
    /// `min`/`max` rank last in zoom resolution. Files produced on the way
    /// are removed once consumed.
    pub async fn single_step_convert(
        &self,
        origin: &GeoFile,
        min: u32,
        max: ZoomLevel,
        request: &ConvertRequest,
    ) -> Result<GeoFile> {
        let remote = self.mode == Mode::Remote;
        let request = request.clone().with_zoom_levels(min, max);

        let (fgb, produced_fgb) = match origin.kind() {
            FileKind::VectorSource => {
                let fgb = origin.convert(&self.runner, None, None).await?;
                if remote {
                    origin.location().remove()?;
                }
                (fgb, true)
            }
            FileKind::Intermediate => (origin.clone(), false),
            kind => {
                error!(file = %origin.path().display(), kind = %kind, "Single step conversion rejected");
                return Err(StateError::UnsupportedStartingKind(kind).into());
            }
        };

        let settings = self.tile_settings(&request)?;
        let mbtiles = fgb
            .convert(&self.runner, Some(&settings), request.label.as_deref())
            .await?;
        if produced_fgb || remote {
            fgb.location().remove()?;
        }

        let pmtiles = mbtiles.convert(&self.runner, None, None).await?;
        mbtiles.location().remove()?;

        if remote {
            pmtiles.location().upload(&self.store).await?;
            pmtiles.location().remove()?;
        }
        info!(from = %origin.name(), to = %pmtiles.name(), "Single step conversion finished");
        Ok(pmtiles)
    }
}
