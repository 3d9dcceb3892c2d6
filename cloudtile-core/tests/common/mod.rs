#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use cloudtile_core::contract::ToolRunner;
use cloudtile_core::error::ProcessError;
use cloudtile_core::tools::ToolInvocation;

/// Fake converter: records every invocation and writes a stand-in output
/// file, or fails once `fail_on` matches the program.
#[derive(Default)]
pub struct RecordingRunner {
    pub calls: Mutex<Vec<ToolInvocation>>,
    fail_on: Option<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes partial output for `program`, then reports a non-zero exit.
    pub fn failing_on(program: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(program.to_string()),
        }
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.program.clone())
            .collect()
    }

    pub fn invocations(&self) -> Vec<ToolInvocation> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolRunner for RecordingRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<(), ProcessError> {
        self.calls.lock().unwrap().push(invocation.clone());
        std::fs::write(&invocation.output, b"converted").unwrap();
        if self.fail_on.as_deref() == Some(invocation.program.as_str()) {
            return Err(ProcessError::Exit {
                program: invocation.program.clone(),
                status: "exit status: 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Creates `name` with placeholder content inside `dir`.
pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"placeholder").unwrap();
    path
}
