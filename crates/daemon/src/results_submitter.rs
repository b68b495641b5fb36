// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Drains results-submission rows and POSTs them to the results
//! service (§4.5). Submissions are delivered in insertion order per
//! (machine, project); a failed POST is retried after `retry_wait`
//! rather than dropped, and the wait is interruptible by shutdown so a
//! slow retry never delays teardown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use autophone_adapters::ResultsServiceClient;
use autophone_storage::JobStore;
use parking_lot::Mutex;

const IDLE_POLL: Duration = Duration::from_secs(5);
const POLL_SLICE: Duration = Duration::from_millis(200);

pub struct ResultsSubmitter {
    store: Arc<Mutex<JobStore>>,
    client: Arc<dyn ResultsServiceClient>,
    url: String,
    retry_wait: Duration,
    shutdown: Arc<AtomicBool>,
}

impl ResultsSubmitter {
    pub fn new(store: Arc<Mutex<JobStore>>, client: Arc<dyn ResultsServiceClient>, url: String, retry_wait: Duration) -> Self {
        Self { store, client, url, retry_wait, shutdown: Arc::new(AtomicBool::new(false)) }
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    pub async fn run(&self, now_epoch_ms: impl Fn() -> u64) {
        while !self.shutdown.load(Ordering::Relaxed) {
            let submission = self.store.lock().claim_next_submission(now_epoch_ms());
            let Some(submission) = submission else {
                self.wait(IDLE_POLL).await;
                continue;
            };

            match self.client.submit(&self.url, submission.payload.clone()).await {
                Ok(()) => self.store.lock().complete_submission(submission.id),
                Err(err) => {
                    tracing::warn!(id = %submission.id, machine = %submission.machine, project = %submission.project, error = %err, "results submission failed, retrying");
                    self.wait(self.retry_wait).await;
                }
            }
        }
    }

    async fn wait(&self, duration: Duration) {
        let mut waited = Duration::ZERO;
        while waited < duration {
            if self.shutdown.load(Ordering::Relaxed) {
                return;
            }
            let slice = POLL_SLICE.min(duration - waited);
            tokio::time::sleep(slice).await;
            waited += slice;
        }
    }
}

#[cfg(test)]
#[path = "results_submitter_tests.rs"]
mod tests;
