use std::{env, net::SocketAddr, path::PathBuf};

use url::Url;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub data_root: PathBuf,
    pub remote: Option<RemoteConfig>,
    pub sync_failure_limit: u32,
}

/// Connection details for the realtime store. Absent entirely when no
/// remote URL is configured; the session then runs cache-only.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: Url,
    pub path: String,
    pub auth: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let listen_addr: SocketAddr = env::var("TRIPBOARD_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid TRIPBOARD_LISTEN_ADDR: {err}")))?;

        let data_root = env::var("TRIPBOARD_DATA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data"));

        let remote = match env::var("TRIPBOARD_REMOTE_URL") {
            Ok(raw) if !raw.trim().is_empty() => {
                let base_url = Url::parse(raw.trim()).map_err(|err| {
                    AppError::Config(format!("invalid TRIPBOARD_REMOTE_URL: {err}"))
                })?;
                let path =
                    env::var("TRIPBOARD_REMOTE_PATH").unwrap_or_else(|_| "currentTrips".to_string());
                let auth = env::var("TRIPBOARD_REMOTE_AUTH")
                    .ok()
                    .filter(|token| !token.is_empty());
                Some(RemoteConfig {
                    base_url,
                    path,
                    auth,
                })
            }
            _ => None,
        };

        let sync_failure_limit: u32 = env::var("TRIPBOARD_SYNC_FAILURE_LIMIT")
            .unwrap_or_else(|_| "3".to_string())
            .parse()
            .map_err(|err| {
                AppError::Config(format!("invalid TRIPBOARD_SYNC_FAILURE_LIMIT: {err}"))
            })?;

        Ok(Self {
            listen_addr,
            data_root,
            remote,
            sync_failure_limit,
        })
    }
}
