#![allow(unused)]

//! # contract: collaborator interfaces for the conversion pipeline
//!
//! The pipeline composes against three collaborators it does not implement
//! itself beyond a default:
//!
//! - [`ToolRunner`]: runs one external converter and reports its exit status.
//! - [`ObjectStore`]: uploads and downloads files under a prefix.
//! - [`JobDispatcher`]: hands a whole CLI invocation to a remote container
//!   service and returns a descriptor of the started job.
//!
//! All three are async and annotated for `mockall`, so tests in this crate
//! and in dependents can build deterministic mocks (`MockToolRunner`,
//! `MockObjectStore`, `MockJobDispatcher`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mockall::{automock, predicate::*};
use serde::{Deserialize, Serialize};

use crate::error::{ProcessError, StorageError};
use crate::remote::ResourceOverrides;
use crate::tools::ToolInvocation;

/// Runs external converter processes.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Runs the invocation to completion. Success means a zero exit status.
    async fn run(&self, invocation: &ToolInvocation) -> Result<(), ProcessError>;
}

/// Object storage for pipeline inputs and outputs.
///
/// Checksum comparison and de-duplication are the implementor's business.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `local_path` as `<prefix>/<key_name>`.
    async fn upload(&self, local_path: &Path, prefix: &str, key_name: &str) -> Result<(), StorageError>;

    /// Fetches `<prefix>/<key>` into `dest_dir`, returning the local path.
    async fn download(&self, key: &str, prefix: &str, dest_dir: &Path) -> Result<PathBuf, StorageError>;
}

/// A CLI invocation to run remotely, with optional resource overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRequest {
    pub command: Vec<String>,
    pub resources: ResourceOverrides,
}

/// What the remote execution service returns for a started job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_id: String,
    pub status: String,
    #[serde(default)]
    pub cluster: Option<String>,
}

/// Error type for JobDispatcher (simple boxed error, like the other clients)
pub type DispatchError = Box<dyn std::error::Error + Send + Sync>;

/// Delegates a whole conversion job to a remote container service.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn submit(&self, request: JobRequest) -> Result<JobDescriptor, DispatchError>;
}
