#![doc = "Remote execution client: hands a whole cloudtile invocation to a container service over HTTP."]
//
//! # Remote dispatch (CLI <-> Core)
//!
//! Bridges the [`JobDispatcher`] contract from `cloudtile-core` to a real
//! HTTP endpoint. The container service receives the `cloudtile` argument
//! list to run, the optional resource overrides and the cluster and task
//! definition to run it on, and answers with a job descriptor.
//!
//! The endpoint comes from the `remote` section of the app config and can be
//! overridden with `CLOUDTILE_REMOTE_ENDPOINT`.

use async_trait::async_trait;
use serde::Serialize;
use std::env;
use uuid::Uuid;

use cloudtile_core::contract::{DispatchError, JobDescriptor, JobDispatcher, JobRequest};
use cloudtile_core::remote::ResourceOverrides;

use crate::load_config::RemoteSection;

pub const ENDPOINT_ENV: &str = "CLOUDTILE_REMOTE_ENDPOINT";

pub struct HttpJobDispatcher {
    client: reqwest::Client,
    endpoint: String,
    cluster: String,
    task_definition: String,
}

/// Body POSTed to the container service.
#[derive(Debug, Serialize)]
struct RunTaskBody<'a> {
    request_id: String,
    cluster: &'a str,
    task_definition: &'a str,
    command: &'a [String],
    #[serde(skip_serializing_if = "ResourceOverrides::is_empty")]
    overrides: ResourceOverrides,
}

impl HttpJobDispatcher {
    pub fn new(remote: &RemoteSection) -> Self {
        let endpoint = match env::var(ENDPOINT_ENV) {
            Ok(endpoint) if !endpoint.is_empty() => {
                tracing::info!(endpoint = %endpoint, "Remote endpoint taken from environment");
                endpoint
            }
            _ => remote.endpoint.clone(),
        };
        Self {
            client: reqwest::Client::new(),
            endpoint,
            cluster: remote.cluster.clone(),
            task_definition: remote.task_definition.clone(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn tasks_url(&self) -> String {
        format!("{}/tasks", self.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl JobDispatcher for HttpJobDispatcher {
    async fn submit(&self, request: JobRequest) -> Result<JobDescriptor, DispatchError> {
        let body = RunTaskBody {
            request_id: Uuid::new_v4().to_string(),
            cluster: &self.cluster,
            task_definition: &self.task_definition,
            command: &request.command,
            overrides: request.resources,
        };
        tracing::info!(
            request_id = %body.request_id,
            cluster = body.cluster,
            command = ?body.command,
            "Submitting remote conversion job"
        );

        let response = self
            .client
            .post(self.tasks_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, endpoint = %self.endpoint, "Failed to reach remote endpoint");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::error!(%status, body = %text, "Remote endpoint rejected the job");
            return Err(format!("remote endpoint returned {status}: {text}").into());
        }

        let mut descriptor: JobDescriptor = response.json().await?;
        if descriptor.cluster.is_none() {
            descriptor.cluster = Some(self.cluster.clone());
        }
        tracing::info!(job_id = %descriptor.job_id, status = %descriptor.status, "Remote job started");
        Ok(descriptor)
    }
}
