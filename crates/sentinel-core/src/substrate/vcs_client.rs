//! `VcsClient` — the source-control host the executor drives: reading
//! workflow run logs, writing branches and files, opening pull requests,
//! and polling deployment status for health checks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowRunStatus {
    Queued,
    InProgress,
    Success,
    Failure,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub run_id: u64,
    pub repository: String,
    pub branch: String,
    pub workflow_name: String,
    pub commit_sha: String,
    pub status: WorkflowRunStatus,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub repository: String,
    pub head_branch: String,
    pub base_branch: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Pending,
    InProgress,
    Healthy,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub deployment_id: u64,
    pub environment: String,
    pub status: DeploymentStatus,
}

/// A single file write as part of a branch commit.
#[derive(Debug, Clone)]
pub struct FileWrite {
    pub path: String,
    pub content: Vec<u8>,
}

/// The source-control host port. Every mutating method is expected to be
/// idempotent on retry where the host's API allows it (branch creation,
/// file writes); callers handle non-idempotent operations (PR open,
/// comment) by checking for an existing open PR on the branch first.
#[async_trait]
pub trait VcsClient: Send + Sync {
    async fn list_workflow_runs(&self, repository: &str, branch: &str) -> Result<Vec<WorkflowRun>>;
    async fn fetch_run_logs(&self, repository: &str, run_id: u64) -> Result<String>;
    async fn read_file(&self, repository: &str, branch: &str, path: &str) -> Result<Vec<u8>>;

    async fn create_branch(&self, repository: &str, branch: &str, from_branch: &str) -> Result<()>;
    async fn write_files(&self, repository: &str, branch: &str, files: &[FileWrite]) -> Result<()>;
    async fn delete_files(&self, repository: &str, branch: &str, paths: &[String]) -> Result<()>;

    async fn open_pull_request(
        &self,
        repository: &str,
        head_branch: &str,
        base_branch: &str,
        title: &str,
        body: &str,
    ) -> Result<PullRequest>;
    async fn comment_on_pull_request(&self, repository: &str, number: u64, body: &str) -> Result<()>;

    async fn create_deployment(&self, repository: &str, branch: &str, environment: &str) -> Result<Deployment>;
    async fn poll_deployment_status(&self, repository: &str, deployment_id: u64) -> Result<DeploymentStatus>;
}

/// An in-memory fake recording every call, for executor and orchestrator
/// tests. Workflow runs and deployment statuses are seeded ahead of time;
/// writes are tracked in `files` so assertions can inspect what would
/// have been pushed.
#[derive(Default)]
pub struct StubVcsClient {
    inner: Mutex<StubVcsState>,
}

#[derive(Default)]
struct StubVcsState {
    runs: HashMap<String, Vec<WorkflowRun>>,
    files: HashMap<(String, String, String), Vec<u8>>,
    next_pr_number: u64,
    deployments: HashMap<u64, DeploymentStatus>,
    next_deployment_id: u64,
    opened_prs: Vec<PullRequest>,
    comments: Vec<(u64, String)>,
}

impl StubVcsClient {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StubVcsState {
                next_pr_number: 1,
                next_deployment_id: 1,
                ..Default::default()
            }),
        }
    }

    pub fn seed_runs(&self, repository: &str, branch: &str, runs: Vec<WorkflowRun>) {
        self.inner
            .lock()
            .expect("stub vcs mutex poisoned")
            .runs
            .insert(format!("{repository}:{branch}"), runs);
    }

    pub fn seed_deployment_status(&self, deployment_id: u64, status: DeploymentStatus) {
        self.inner
            .lock()
            .expect("stub vcs mutex poisoned")
            .deployments
            .insert(deployment_id, status);
    }

    pub fn opened_prs(&self) -> Vec<PullRequest> {
        self.inner.lock().expect("stub vcs mutex poisoned").opened_prs.clone()
    }
}

#[async_trait]
impl VcsClient for StubVcsClient {
    async fn list_workflow_runs(&self, repository: &str, branch: &str) -> Result<Vec<WorkflowRun>> {
        Ok(self
            .inner
            .lock()
            .expect("stub vcs mutex poisoned")
            .runs
            .get(&format!("{repository}:{branch}"))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_run_logs(&self, _repository: &str, _run_id: u64) -> Result<String> {
        Ok(String::new())
    }

    async fn read_file(&self, repository: &str, branch: &str, path: &str) -> Result<Vec<u8>> {
        self.inner
            .lock()
            .expect("stub vcs mutex poisoned")
            .files
            .get(&(repository.to_string(), branch.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| CoreError::ParseMalformed(format!("no stubbed content for {path}")))
    }

    async fn create_branch(&self, _repository: &str, _branch: &str, _from_branch: &str) -> Result<()> {
        Ok(())
    }

    async fn write_files(&self, repository: &str, branch: &str, files: &[FileWrite]) -> Result<()> {
        let mut state = self.inner.lock().expect("stub vcs mutex poisoned");
        for file in files {
            state.files.insert(
                (repository.to_string(), branch.to_string(), file.path.clone()),
                file.content.clone(),
            );
        }
        Ok(())
    }

    async fn delete_files(&self, repository: &str, branch: &str, paths: &[String]) -> Result<()> {
        let mut state = self.inner.lock().expect("stub vcs mutex poisoned");
        for path in paths {
            state.files.remove(&(repository.to_string(), branch.to_string(), path.clone()));
        }
        Ok(())
    }

    async fn open_pull_request(
        &self,
        repository: &str,
        head_branch: &str,
        base_branch: &str,
        title: &str,
        _body: &str,
    ) -> Result<PullRequest> {
        let mut state = self.inner.lock().expect("stub vcs mutex poisoned");
        let number = state.next_pr_number;
        state.next_pr_number += 1;
        let pr = PullRequest {
            number,
            repository: repository.to_string(),
            head_branch: head_branch.to_string(),
            base_branch: base_branch.to_string(),
            title: title.to_string(),
            url: format!("https://example.invalid/{repository}/pull/{number}"),
        };
        state.opened_prs.push(pr.clone());
        Ok(pr)
    }

    async fn comment_on_pull_request(&self, _repository: &str, number: u64, body: &str) -> Result<()> {
        self.inner
            .lock()
            .expect("stub vcs mutex poisoned")
            .comments
            .push((number, body.to_string()));
        Ok(())
    }

    async fn create_deployment(&self, _repository: &str, _branch: &str, environment: &str) -> Result<Deployment> {
        let mut state = self.inner.lock().expect("stub vcs mutex poisoned");
        let deployment_id = state.next_deployment_id;
        state.next_deployment_id += 1;
        state.deployments.insert(deployment_id, DeploymentStatus::Pending);
        Ok(Deployment {
            deployment_id,
            environment: environment.to_string(),
            status: DeploymentStatus::Pending,
        })
    }

    async fn poll_deployment_status(&self, _repository: &str, deployment_id: u64) -> Result<DeploymentStatus> {
        Ok(self
            .inner
            .lock()
            .expect("stub vcs mutex poisoned")
            .deployments
            .get(&deployment_id)
            .copied()
            .unwrap_or(DeploymentStatus::Pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let client = StubVcsClient::new();
        client
            .write_files(
                "acme/widgets",
                "sentinel/fix-1",
                &[FileWrite {
                    path: "package-lock.json".into(),
                    content: b"{}".to_vec(),
                }],
            )
            .await
            .unwrap();
        let content = client
            .read_file("acme/widgets", "sentinel/fix-1", "package-lock.json")
            .await
            .unwrap();
        assert_eq!(content, b"{}");
    }

    #[tokio::test]
    async fn pr_numbers_increment() {
        let client = StubVcsClient::new();
        let pr1 = client
            .open_pull_request("acme/widgets", "sentinel/fix-1", "main", "fix", "body")
            .await
            .unwrap();
        let pr2 = client
            .open_pull_request("acme/widgets", "sentinel/fix-2", "main", "fix", "body")
            .await
            .unwrap();
        assert_eq!(pr1.number, 1);
        assert_eq!(pr2.number, 2);
        assert_eq!(client.opened_prs().len(), 2);
    }
}
