// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The results service client (§4.5): submits a completed test's JSON
//! payload to the Treeherder-compatible ingestion endpoint. `ureq` is
//! blocking, so every call is driven through `spawn_blocking` to keep
//! the submitter's async loop from stalling on network I/O.

use async_trait::async_trait;
use autophone_core::SubmissionFault;

#[async_trait]
pub trait ResultsServiceClient: Send + Sync {
    async fn submit(&self, url: &str, payload: serde_json::Value) -> Result<(), SubmissionFault>;
}

pub struct HttpResultsServiceClient {
    client_id: String,
    secret: String,
}

impl HttpResultsServiceClient {
    pub fn new(client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl ResultsServiceClient for HttpResultsServiceClient {
    async fn submit(&self, url: &str, payload: serde_json::Value) -> Result<(), SubmissionFault> {
        let url = url.to_string();
        let client_id = self.client_id.clone();
        let secret = self.secret.clone();

        tokio::task::spawn_blocking(move || {
            let body = serde_json::to_vec(&payload).map_err(|e| SubmissionFault(e.to_string()))?;
            let response = ureq::post(&url)
                .header("Content-Type", "application/json")
                .header("X-Autophone-Client-Id", &client_id)
                .header("X-Autophone-Secret", &secret)
                .send(&body);

            match response {
                Ok(resp) if resp.status().is_success() => Ok(()),
                Ok(resp) => Err(SubmissionFault(format!("results service returned {}", resp.status()))),
                Err(err) => Err(SubmissionFault(err.to_string())),
            }
        })
        .await
        .map_err(|e| SubmissionFault(format!("submit task panicked: {e}")))?
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct FakeResultsServiceClient {
        submissions: Mutex<Vec<(String, serde_json::Value)>>,
        fail_next: Mutex<Option<String>>,
    }

    impl FakeResultsServiceClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_next(&self, reason: impl Into<String>) {
            *self.fail_next.lock() = Some(reason.into());
        }

        pub fn submissions(&self) -> Vec<(String, serde_json::Value)> {
            self.submissions.lock().clone()
        }
    }

    #[async_trait]
    impl ResultsServiceClient for FakeResultsServiceClient {
        async fn submit(&self, url: &str, payload: serde_json::Value) -> Result<(), SubmissionFault> {
            if let Some(reason) = self.fail_next.lock().take() {
                return Err(SubmissionFault(reason));
            }
            self.submissions.lock().push((url.to_string(), payload));
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "results_tests.rs"]
mod tests;
