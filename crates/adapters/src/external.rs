// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! External collaborators named but explicitly out of scope (§2): the
//! build cache, the S3-compatible object store for upload artifacts,
//! and the operator mail transport. The object store and mail transport
//! get only a trait contract and an in-memory fake — a real
//! network-backed implementation is someone else's system to build and
//! configure. The build cache gets a minimal plain-HTTP fetch, since a
//! worker needs *some* way to pull down the APK it was told to install.

use std::io::Read;

use async_trait::async_trait;
use autophone_core::StorageFault;
use sha2::{Digest, Sha256};

#[async_trait]
pub trait BuildCacheClient: Send + Sync {
    async fn fetch(&self, build_url: &str) -> Result<Vec<u8>, StorageFault>;
}

/// Fetches a build by downloading `build_url` directly — the build
/// cache itself (Treeherder's artifact store) is out of scope; this is
/// just the plain HTTP GET a worker would otherwise shell out to `curl`
/// for.
pub struct HttpBuildCacheClient;

#[async_trait]
impl BuildCacheClient for HttpBuildCacheClient {
    async fn fetch(&self, build_url: &str) -> Result<Vec<u8>, StorageFault> {
        let url = build_url.to_string();
        tokio::task::spawn_blocking(move || {
            let response = ureq::get(&url).call();
            match response {
                Ok(mut resp) if resp.status().is_success() => {
                    let mut body = Vec::new();
                    resp.body_mut()
                        .as_reader()
                        .read_to_end(&mut body)
                        .map_err(|e| StorageFault(e.to_string()))?;
                    Ok(body)
                }
                Ok(resp) => Err(StorageFault(format!("build fetch returned {}", resp.status()))),
                Err(err) => Err(StorageFault(err.to_string())),
            }
        })
        .await
        .map_err(|e| StorageFault(e.to_string()))?
    }
}

#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, StorageFault>;
}

pub trait MailClient: Send + Sync {
    fn send(&self, subject: &str, body: &str);
}

/// Content-addressed key for an uploaded artifact, so repeated uploads
/// of the same bytes (a flaky retry re-sending logcat) land on the same
/// object store key.
pub fn content_key(prefix: &str, bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{prefix}/{digest:x}")
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use autophone_core::StorageFault;
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct FakeBuildCacheClient {
        cache: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl FakeBuildCacheClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed(&self, build_url: &str, bytes: Vec<u8>) {
            self.cache.lock().insert(build_url.to_string(), bytes);
        }
    }

    #[async_trait]
    impl BuildCacheClient for FakeBuildCacheClient {
        async fn fetch(&self, build_url: &str) -> Result<Vec<u8>, StorageFault> {
            self.cache
                .lock()
                .get(build_url)
                .cloned()
                .ok_or_else(|| StorageFault(format!("no cached build for {build_url}")))
        }
    }

    #[derive(Default)]
    pub struct FakeObjectStoreClient {
        objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl FakeObjectStoreClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get(&self, key: &str) -> Option<Vec<u8>> {
            self.objects.lock().get(key).cloned()
        }
    }

    #[async_trait]
    impl ObjectStoreClient for FakeObjectStoreClient {
        async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String, StorageFault> {
            let url = format!("https://objects.test/{key}");
            self.objects.lock().insert(key.to_string(), bytes);
            Ok(url)
        }
    }

    #[derive(Default)]
    pub struct FakeMailClient {
        sent: Mutex<Vec<(String, String)>>,
    }

    impl FakeMailClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().clone()
        }
    }

    impl MailClient for FakeMailClient {
        fn send(&self, subject: &str, body: &str) {
            self.sent.lock().push((subject.to_string(), body.to_string()));
        }
    }
}

#[cfg(test)]
#[path = "external_tests.rs"]
mod tests;
