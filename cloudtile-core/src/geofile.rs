//! Located geodata files and their conversions.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::contract::{ObjectStore, ToolRunner};
use crate::error::{Error, ProcessError, Result, StateError, StorageError, ValidationError};
use crate::kind::FileKind;
use crate::settings::TippecanoeSettings;
use crate::tools::{path_arg, ToolInvocation};

/// A file that existed on local disk when it was referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileIdentity {
    path: PathBuf,
    name: String,
    stem: String,
    suffix: String,
}

impl FileIdentity {
    /// Fails with [`Error::FileNotFound`] unless `path` exists.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            error!(path = %path.display(), "File does not exist");
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            name,
            stem,
            suffix,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name, e.g. `blocks.parquet`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name without its extension, e.g. `blocks`.
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Lower-cased extension without the dot, e.g. `parquet`.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Builds `<dir>/<stem>[-<token>...]<target_suffix>` next to this file.
    ///
    /// Empty tokens are skipped. Nothing is created on disk.
    pub fn output_path<T: AsRef<str>>(
        &self,
        target_suffix: &str,
        tokens: &[T],
    ) -> std::result::Result<PathBuf, ValidationError> {
        if !target_suffix.starts_with('.') || target_suffix.len() < 2 {
            return Err(ValidationError::MalformedSuffix(target_suffix.to_string()));
        }
        let mut file_name = self.stem.clone();
        for token in tokens.iter().map(AsRef::as_ref).filter(|t| !t.is_empty()) {
            file_name.push('-');
            file_name.push_str(token);
        }
        file_name.push_str(target_suffix);
        Ok(self.parent().join(file_name))
    }

    fn parent(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Uploads under the file's suffix, keyed by its file name.
    pub async fn upload<S>(&self, store: &S) -> Result<()>
    where
        S: ObjectStore + ?Sized,
    {
        info!(path = %self.path.display(), prefix = %self.suffix, "Uploading file");
        store.upload(&self.path, &self.suffix, &self.name).await?;
        Ok(())
    }

    /// Downloads `key` from the store into `dest_dir`. The key's suffix
    /// selects the prefix it lives under.
    pub async fn download<S>(key: &str, store: &S, dest_dir: &Path) -> Result<Self>
    where
        S: ObjectStore + ?Sized,
    {
        let prefix = key_suffix(key)?;
        info!(key, prefix = %prefix, dest_dir = %dest_dir.display(), "Downloading file");
        let local = store.download(key, &prefix, dest_dir).await?;
        Self::new(local)
    }

    /// Copies the file into `dir`, returning the copy. Writing into the
    /// file's own directory is a no-op.
    pub fn write_to_directory(&self, dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let target = dir.join(&self.name);
        if target.exists() && fs::canonicalize(&target)? == fs::canonicalize(&self.path)? {
            info!(path = %self.path.display(), "File already in target directory");
            return Self::new(target);
        }
        fs::copy(&self.path, &target)?;
        info!(from = %self.path.display(), to = %target.display(), "Copied file");
        Self::new(target)
    }

    /// Removes the local file.
    pub fn remove(&self) -> Result<()> {
        info!(path = %self.path.display(), "Removing (from local)");
        fs::remove_file(&self.path)?;
        Ok(())
    }
}

fn key_suffix(key: &str) -> std::result::Result<String, StorageError> {
    Path::new(key)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .ok_or_else(|| StorageError::InvalidKey(format!("{key}: you must specify the file suffix")))
}

/// A located file together with its kind in the conversion chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoFile {
    location: FileIdentity,
    kind: FileKind,
}

impl GeoFile {
    /// Opens a local file and classifies it by suffix.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let location = FileIdentity::new(path)?;
        let kind = FileKind::classify(location.suffix())?;
        Ok(Self { location, kind })
    }

    /// Opens a local file that must be of `kind`.
    pub fn with_kind(path: impl AsRef<Path>, kind: FileKind) -> Result<Self> {
        let location = FileIdentity::new(path)?;
        let kind = kind.accept(location.suffix())?;
        Ok(Self { location, kind })
    }

    /// Downloads `key` and classifies it. Unsupported suffixes fail before
    /// anything is fetched.
    pub async fn download<S>(key: &str, store: &S, dest_dir: &Path) -> Result<Self>
    where
        S: ObjectStore + ?Sized,
    {
        let kind = FileKind::classify(&key_suffix(key)?)?;
        let location = FileIdentity::download(key, store, dest_dir).await?;
        Ok(Self { location, kind })
    }

    pub fn kind(&self) -> FileKind {
        self.kind
    }

    pub fn location(&self) -> &FileIdentity {
        &self.location
    }

    pub fn path(&self) -> &Path {
        self.location.path()
    }

    pub fn name(&self) -> &str {
        self.location.name()
    }

    /// The converter call that moves this file one step along the chain.
    ///
    /// Building tiles needs `settings` with both zoom levels configured;
    /// `label` is appended to the tile archive's name. Other steps ignore
    /// both.
    pub fn invocation(
        &self,
        settings: Option<&TippecanoeSettings>,
        label: Option<&str>,
    ) -> Result<ToolInvocation> {
        let input = path_arg(self.path());
        match self.kind {
            FileKind::VectorSource => {
                let output = self.output_path::<&str>(&[])?;
                let args = vec![
                    "-f".to_string(),
                    "FlatGeobuf".to_string(),
                    path_arg(&output),
                    input,
                    "-progress".to_string(),
                ];
                Ok(ToolInvocation::new("ogr2ogr", args, output))
            }
            FileKind::Intermediate => {
                let (settings, (min, max)) = settings
                    .and_then(|s| s.zoom_levels().map(|zooms| (s, zooms)))
                    .ok_or_else(|| StateError::ZoomNotConfigured(self.path().to_path_buf()))?;
                let tokens = [
                    min.to_string(),
                    max.to_string(),
                    label.unwrap_or_default().to_string(),
                ];
                let output = self.output_path(&tokens)?;
                let mut args = settings.to_argument_list();
                args.extend(["-o".to_string(), path_arg(&output), input]);
                Ok(ToolInvocation::new("tippecanoe", args, output))
            }
            FileKind::TileArchive => {
                let output = self.output_path::<&str>(&[])?;
                let args = vec!["convert".to_string(), input, path_arg(&output)];
                Ok(ToolInvocation::new("pmtiles", args, output))
            }
            FileKind::FinalArchive => Err(StateError::NoFurtherConversion(self.kind).into()),
        }
    }

    /// Runs the converter and returns the produced file, one kind further
    /// along. A failed run leaves no partial output behind; a file that was
    /// already at the output path before the run is left alone.
    pub async fn convert<R>(
        &self,
        runner: &R,
        settings: Option<&TippecanoeSettings>,
        label: Option<&str>,
    ) -> Result<GeoFile>
    where
        R: ToolRunner + ?Sized,
    {
        let next = self.kind.next()?;
        let invocation = self.invocation(settings, label)?;
        info!(from = %self.kind, to = %next, "{} call: {}", invocation.program, invocation);

        let preexisting = invocation.output.exists();
        if let Err(e) = runner.run(&invocation).await {
            if preexisting {
                warn!(output = %invocation.output.display(), "Keeping output that predates the failed run");
            } else {
                discard_partial_output(&invocation.output);
            }
            return Err(e.into());
        }
        if !invocation.output.exists() {
            error!(output = %invocation.output.display(), "Converter produced no output");
            return Err(ProcessError::MissingOutput {
                program: invocation.program,
                output: invocation.output,
            }
            .into());
        }
        GeoFile::with_kind(&invocation.output, next)
    }

    fn output_path<T: AsRef<str>>(&self, tokens: &[T]) -> Result<PathBuf> {
        let target = self
            .kind
            .target_suffix()
            .ok_or(StateError::NoFurtherConversion(self.kind))?;
        Ok(self.location.output_path(target, tokens)?)
    }
}

fn discard_partial_output(output: &Path) {
    if output.exists() {
        match fs::remove_file(output) {
            Ok(()) => warn!(output = %output.display(), "Removed partial output"),
            Err(e) => error!(error = ?e, output = %output.display(), "Failed to remove partial output"),
        }
    }
}
