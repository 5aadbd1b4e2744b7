/*
    Copyright 2025 MydriaTech AB

    Licensed under the Apache License 2.0 with Free world makers exception
    1.0.0 (the "License"); you may not use this file except in compliance with
    the License. You should have obtained a copy of the License with the source
    or binary distribution in file named

        LICENSE-Apache-2.0-with-FWM-Exception-1.0.0

    Unless required by applicable law or agreed to in writing, software
    distributed under the License is distributed on an "AS IS" BASIS,
    WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
    See the License for the specific language governing permissions and
    limitations under the License.
*/


//! Gateway basic auth credentials and cache.

use crossbeam_skiplist::SkipMap;
use crossbeam_skiplist::map::Entry;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::time::Duration;
use tokio::time::sleep;

/// Username and password for the gateway's system endpoints.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuthCredentials {
    user: String,
    password: String,
}

impl std::fmt::Debug for BasicAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuthCredentials")
            .field("user", &self.user)
            .field("password", &"*redacted*")
            .finish()
    }
}

impl BasicAuthCredentials {
    /// Return a new instance.
    pub fn new(user: &str, password: &str) -> Self {
        Self {
            user: user.to_owned(),
            password: password.to_owned(),
        }
    }

    /// Basic auth username.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Basic auth password.
    pub fn password(&self) -> &str {
        &self.password
    }
}

/// Basic auth credential cache.
///
/// Explicitly provided credentials are used as is. Otherwise the credentials
/// are loaded from the files `basic-auth-user` and `basic-auth-password` in
/// the directory named by the environment variable `secret_mount_path`
/// (default `/var/secrets/`) and periodically reloaded so that rotated
/// secrets are picked up.
pub struct CredentialsCache {
    secret_mount_path: Option<String>,
    credentials: SkipMap<(), Arc<BasicAuthCredentials>>,
}

impl CredentialsCache {
    const ENV: &'static str = "secret_mount_path";
    const DEFAULT: &'static str = "/var/secrets/";
    const USER_FILENAME: &'static str = "basic-auth-user";
    const PASSWORD_FILENAME: &'static str = "basic-auth-password";
    const RELOAD_INTERVAL_MICROS: u64 = 60_000_000;

    /// Return a new instance.
    pub async fn new(explicit: Option<BasicAuthCredentials>) -> Arc<Self> {
        if let Some(credentials) = explicit {
            log::debug!("Using explicitly configured gateway credentials.");
            let ret = Arc::new(Self {
                secret_mount_path: None,
                credentials: SkipMap::default(),
            });
            ret.credentials.insert((), Arc::new(credentials));
            return ret;
        }
        let secret_mount_path = std::env::var(Self::ENV)
            .map_err(|e| log::debug!("Unable to parse environment variable '{}': {e}", Self::ENV))
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| {
                log::debug!(
                    "Using default value '{}' for environment variable '{}'.",
                    Self::DEFAULT,
                    Self::ENV,
                );
                Self::DEFAULT.to_string()
            });
        Self::from_secret_mount_path(&secret_mount_path).await
    }

    /// Return a new instance backed by secret files in `secret_mount_path`.
    pub async fn from_secret_mount_path(secret_mount_path: &str) -> Arc<Self> {
        Arc::new(Self {
            secret_mount_path: Some(secret_mount_path.to_owned()),
            credentials: SkipMap::default(),
        })
        .init()
        .await
    }

    /// Start background task for reloading the secret files.
    async fn init(self: Arc<Self>) -> Arc<Self> {
        if !self.reload_credentials().await {
            log::warn!("No gateway credentials available. System endpoints will be called unauthenticated.");
        }
        let self_clone = Arc::clone(&self);
        tokio::spawn(async move {
            loop {
                sleep(Duration::from_micros(Self::RELOAD_INTERVAL_MICROS)).await;
                self_clone.reload_credentials().await;
            }
        });
        self
    }

    /// Return the current credentials if any are available.
    pub fn current(&self) -> Option<Arc<BasicAuthCredentials>> {
        self.credentials
            .get(&())
            .as_ref()
            .map(Entry::value)
            .map(Arc::clone)
    }

    /// Reload credentials from the secret files.
    async fn reload_credentials(&self) -> bool {
        let Some(secret_mount_path) = &self.secret_mount_path else {
            return true;
        };
        Self::read_secrets(secret_mount_path)
            .await
            .map_err(|e| {
                log::debug!("Unable to load gateway credentials from '{secret_mount_path}': {e}")
            })
            .ok()
            .map(|credentials| {
                if self
                    .credentials
                    .get(&())
                    .is_none_or(|entry| !entry.value().as_ref().eq(&credentials))
                {
                    log::debug!("Gateway credentials changed.");
                }
                self.credentials.insert((), Arc::new(credentials));
            })
            .is_some()
    }

    /// Read the username and password files.
    async fn read_secrets(
        secret_mount_path: &str,
    ) -> Result<BasicAuthCredentials, Box<dyn core::error::Error>> {
        let dir = Path::new(secret_mount_path);
        let user = Self::read_file_text(&dir.join(Self::USER_FILENAME)).await?;
        let password = Self::read_file_text(&dir.join(Self::PASSWORD_FILENAME)).await?;
        Ok(BasicAuthCredentials::new(user.trim(), password.trim()))
    }

    /// Read full content of a file into a String.
    async fn read_file_text(filename: &Path) -> Result<String, Box<dyn core::error::Error>> {
        let mut file = File::open(filename).await?;
        let mut contents = vec![];
        file.read_to_end(&mut contents).await?;
        Ok(std::str::from_utf8(&contents)?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explicit_credentials() {
        let cache = CredentialsCache::new(Some(BasicAuthCredentials::new("admin", "secret"))).await;
        let current = cache.current().unwrap();
        assert_eq!(current.user(), "admin");
        assert_eq!(current.password(), "secret");
        assert!(!format!("{current:?}").contains("secret"));
    }

    #[tokio::test]
    async fn test_secret_files() {
        let dir = std::env::temp_dir().join(format!("mqtt-connector-secrets-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("basic-auth-user"), "admin\n").unwrap();
        std::fs::write(dir.join("basic-auth-password"), "s3cr3t\n").unwrap();
        let cache = CredentialsCache::from_secret_mount_path(dir.to_str().unwrap()).await;
        let current = cache.current().unwrap();
        assert_eq!(current.user(), "admin");
        assert_eq!(current.password(), "s3cr3t");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_missing_secret_files() {
        let cache = CredentialsCache::from_secret_mount_path("/nonexistent/mqtt-connector").await;
        assert!(cache.current().is_none());
    }
}
