///
/// This module implements the CLI interface for cloudtile: command parsing,
/// argument validation and the async entrypoint.
///
/// All conversion logic (settings, file kinds, the pipeline) lives in the
/// [`cloudtile-core`] crate. This module only maps arguments onto it.
///
/// ## Commands
/// - `manage upload|download`: move files in and out of object storage.
/// - `convert vector2fgb|fgb2mbtiles|mbtiles2pmtiles`: one step of the chain.
/// - `convert single-step`: vector or FlatGeobuf straight to PMTiles.
///
/// Every `convert` subcommand runs locally by default, reads from and writes
/// to object storage with `--s3`, or is handed to the remote container
/// service with `--ecs`.
///
/// [`cloudtile-core`]: ../../cloudtile-core/
use crate::dispatch::HttpJobDispatcher;
use crate::load_config::{load_config, AppConfig};
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use cloudtile_core::contract::{JobDispatcher, JobRequest};
use cloudtile_core::converter::{ConvertRequest, Converter, Mode};
use cloudtile_core::error::ValidationError;
use cloudtile_core::geofile::GeoFile;
use cloudtile_core::kind::FileKind;
use cloudtile_core::remote::{RemoteCommand, ResourceOverrides};
use cloudtile_core::settings::{parse_overrides, SettingValue, TippecanoeSettings, ZoomLevel};
use cloudtile_core::storage::FsObjectStore;
use cloudtile_core::tools::SystemToolRunner;
use std::path::PathBuf;

/// CLI for cloudtile: turn vector geodata into PMTiles archives.
#[derive(Parser, Debug)]
#[clap(
    name = "cloudtile",
    version,
    about = "Convert vector geodata into FlatGeobuf, MBTiles and PMTiles, locally or remotely"
)]
pub struct Cli {
    /// Path to the application YAML config
    #[clap(long, global = true)]
    pub app_config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload or download files from object storage
    Manage {
        #[clap(subcommand)]
        action: ManageCommands,
    },
    /// Convert a file to the next format in the chain
    Convert {
        #[clap(subcommand)]
        action: ConvertCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ManageCommands {
    /// Upload a local file, stored under its suffix
    Upload {
        /// Local file to upload
        filename: String,
    },
    /// Download a stored file into a directory
    Download {
        /// Key of the file, e.g. blocks.parquet
        filename: String,
        /// Directory to download into
        directory: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConvertCommands {
    /// Convert a vector file (geojson, gpkg, parquet) to FlatGeobuf
    Vector2fgb {
        #[clap(flatten)]
        common: StdArgs,
    },
    /// Build an MBTiles archive from a FlatGeobuf file with tippecanoe
    Fgb2mbtiles {
        #[clap(flatten)]
        common: StdArgs,
        #[clap(flatten)]
        tiles: TileArgs,
    },
    /// Package an MBTiles archive as PMTiles
    Mbtiles2pmtiles {
        #[clap(flatten)]
        common: StdArgs,
    },
    /// Convert a vector or FlatGeobuf file all the way to PMTiles
    SingleStep {
        #[clap(flatten)]
        common: StdArgs,
        #[clap(flatten)]
        tiles: TileArgs,
    },
}

/// Arguments shared by every convert subcommand.
#[derive(Args, Debug, Clone)]
pub struct StdArgs {
    /// File to convert; a storage key with --s3 or --ecs
    pub filename: String,

    /// Read the input from and write the output to object storage
    #[clap(long, conflicts_with = "ecs")]
    pub s3: bool,

    /// Run the conversion on the remote container service
    #[clap(long)]
    pub ecs: bool,

    /// Memory limit override in MiB for the remote container
    #[clap(long, requires = "ecs")]
    pub memory: Option<u32>,

    /// Ephemeral storage override in GiB for the remote container
    #[clap(long, requires = "ecs")]
    pub storage: Option<u32>,
}

/// Arguments of the tile-building subcommands.
#[derive(Args, Debug, Clone)]
pub struct TileArgs {
    /// Minimum zoom level
    pub minimum_zoom: u32,

    /// Maximum zoom level, or g to let tippecanoe choose
    pub maximum_zoom: ZoomLevel,

    /// Label appended to the tile archive's name
    #[clap(long, short, default_value = "")]
    pub suffix: String,

    /// Tippecanoe settings file merged over the defaults
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Tippecanoe setting overrides: key or key=value
    #[clap(long = "tc-kwargs", num_args = 1..)]
    pub tc_kwargs: Vec<String>,
}

impl ConvertCommands {
    fn name(&self) -> &'static str {
        match self {
            ConvertCommands::Vector2fgb { .. } => "vector2fgb",
            ConvertCommands::Fgb2mbtiles { .. } => "fgb2mbtiles",
            ConvertCommands::Mbtiles2pmtiles { .. } => "mbtiles2pmtiles",
            ConvertCommands::SingleStep { .. } => "single-step",
        }
    }

    fn std_args(&self) -> &StdArgs {
        match self {
            ConvertCommands::Vector2fgb { common }
            | ConvertCommands::Fgb2mbtiles { common, .. }
            | ConvertCommands::Mbtiles2pmtiles { common }
            | ConvertCommands::SingleStep { common, .. } => common,
        }
    }

    fn tile_args(&self) -> Option<&TileArgs> {
        match self {
            ConvertCommands::Fgb2mbtiles { tiles, .. } | ConvertCommands::SingleStep { tiles, .. } => {
                Some(tiles)
            }
            _ => None,
        }
    }

    /// The kind a one-step subcommand produces; `None` for single-step.
    fn target(&self) -> Option<FileKind> {
        match self {
            ConvertCommands::Vector2fgb { .. } => Some(FileKind::Intermediate),
            ConvertCommands::Fgb2mbtiles { .. } => Some(FileKind::TileArchive),
            ConvertCommands::Mbtiles2pmtiles { .. } => Some(FileKind::FinalArchive),
            ConvertCommands::SingleStep { .. } => None,
        }
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let config = load_config(cli.app_config.as_ref())?;
    match cli.command {
        Commands::Manage { action } => manage(action, &config).await,
        Commands::Convert { action } => convert(action, &config).await,
    }
}

fn object_store(config: &AppConfig) -> FsObjectStore {
    FsObjectStore::new(&config.storage.root, &config.storage.bucket)
}

async fn manage(action: ManageCommands, config: &AppConfig) -> Result<()> {
    let store = object_store(config);
    match action {
        ManageCommands::Upload { filename } => {
            tracing::info!(command = "upload", filename = %filename, "Uploading file");
            let file = GeoFile::open(&filename)?;
            file.location().upload(&store).await?;
            println!("{}/{}", file.location().suffix(), file.name());
        }
        ManageCommands::Download {
            filename,
            directory,
        } => {
            tracing::info!(command = "download", filename = %filename, "Downloading file");
            let file = GeoFile::download(&filename, &store, &directory).await?;
            println!("{}", file.path().display());
        }
    }
    Ok(())
}

fn parse_tc_kwargs(tiles: Option<&TileArgs>) -> Result<Vec<(String, SettingValue)>, ValidationError> {
    match tiles {
        Some(tiles) => parse_overrides(tiles.tc_kwargs.as_slice()),
        None => Ok(Vec::new()),
    }
}

async fn convert(action: ConvertCommands, config: &AppConfig) -> Result<()> {
    let args = action.std_args();
    let tiles = action.tile_args();
    let overrides = parse_tc_kwargs(tiles)?;

    if args.ecs {
        return dispatch_remote(&action, overrides, config).await;
    }

    let mode = if args.s3 { Mode::Remote } else { Mode::Local };
    let runner = SystemToolRunner::new().with_timeout(config.tools.timeout());
    let converter =
        Converter::new(runner, object_store(config), mode).with_work_dir(&config.work_dir);

    let origin = converter.load_file(&args.filename).await?;
    let mut request = ConvertRequest {
        overrides,
        ..ConvertRequest::default()
    };
    if let Some(tiles) = tiles {
        request = request.with_zoom_levels(tiles.minimum_zoom, tiles.maximum_zoom);
        request.config = tiles.config.clone();
        request.label = (!tiles.suffix.is_empty()).then(|| tiles.suffix.clone());
    }

    tracing::info!(command = action.name(), origin = %origin.name(), ?mode, "Starting conversion");
    let result = match (&action, action.target()) {
        (ConvertCommands::SingleStep { tiles, .. }, _) => {
            converter
                .single_step_convert(&origin, tiles.minimum_zoom, tiles.maximum_zoom, &request)
                .await?
        }
        (_, target) => {
            if let Some(target) = target {
                converter.expect_transition(&origin, target)?;
            }
            converter.convert(&origin, &request).await?
        }
    };
    println!("{}", result_location(&result, mode));
    Ok(())
}

/// Where the result ended up: a storage key once uploaded, else a local path.
fn result_location(result: &GeoFile, mode: Mode) -> String {
    match mode {
        Mode::Remote => format!("{}/{}", result.location().suffix(), result.name()),
        Mode::Local => result.path().display().to_string(),
    }
}

async fn dispatch_remote(
    action: &ConvertCommands,
    overrides: Vec<(String, SettingValue)>,
    config: &AppConfig,
) -> Result<()> {
    let args = action.std_args();
    let resources = ResourceOverrides::new(args.memory, args.storage)?;

    // Reject unknown settings here rather than in the container.
    let known = TippecanoeSettings::new()?;
    if let Some((key, _)) = overrides.iter().find(|(key, _)| !known.is_known(key)) {
        return Err(ValidationError::UnknownSetting(key.clone()).into());
    }

    let mut command = RemoteCommand::new(action.name(), args.filename.clone());
    if let Some(tiles) = action.tile_args() {
        command = command
            .zoom_levels(tiles.minimum_zoom, tiles.maximum_zoom)
            .label(tiles.suffix.clone())
            .overrides(overrides);
        if let Some(path) = &tiles.config {
            command = command.config(path.clone());
        }
    }

    let dispatcher = HttpJobDispatcher::new(&config.remote);
    let request = JobRequest {
        command: command.to_args(),
        resources,
    };
    let descriptor = dispatcher.submit(request).await.map_err(|e| {
        tracing::error!(error = %e, "Remote job submission failed");
        anyhow::Error::msg(format!("Remote job submission failed: {e}"))
    })?;
    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    Ok(())
}
