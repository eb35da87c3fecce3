use crate::error::ApiError;
use chrono::{DateTime, Utc};
use leadflow_core::portal::{AuthTokens, UserProfile};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Bearer tokens and the cached profile of the signed-in user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub last_refresh: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn apply_tokens(&mut self, tokens: AuthTokens) {
        self.access_token = Some(tokens.access_token);
        if let Some(refresh) = tokens.refresh_token {
            self.refresh_token = Some(refresh);
        }
        if let Some(user) = tokens.user {
            self.user = Some(user);
        }
        self.last_refresh = Some(Utc::now());
    }
}

/// JSON file holding the session between runs.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty session; an unreadable one is reported and
    /// treated as empty so a corrupt file never locks the user out.
    pub fn load(&self) -> Session {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Session::default(),
            Err(err) => {
                warn!(event = "session_read_failed", path = %self.path.display(), error = %err);
                return Session::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(session) => session,
            Err(err) => {
                warn!(event = "session_parse_failed", path = %self.path.display(), error = %err);
                Session::default()
            }
        }
    }

    pub fn save(&self, session: &Session) -> Result<(), ApiError> {
        let json = serde_json::to_string_pretty(session)
            .map_err(|err| ApiError::Session(format!("serialize session: {err}")))?;
        write_atomic(&self.path, &json)
    }

    pub fn clear(&self) -> Result<(), ApiError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ApiError::Session(format!(
                "remove {}: {err}",
                self.path.display()
            ))),
        }
    }
}

fn write_atomic(path: &Path, payload: &str) -> Result<(), ApiError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|err| {
                ApiError::Session(format!("create {}: {err}", parent.display()))
            })?;
        }
    }

    let temp_path = match path.file_name() {
        Some(name) => path.with_file_name(format!("{}.tmp", name.to_string_lossy())),
        None => path.with_extension("tmp"),
    };

    write_private(&temp_path, payload)
        .map_err(|err| ApiError::Session(format!("write {}: {err}", temp_path.display())))?;
    std::fs::rename(&temp_path, path)
        .map_err(|err| ApiError::Session(format!("replace {}: {err}", path.display())))?;
    Ok(())
}

/// The file holds bearer tokens: owner read/write only on unix.
fn write_private(path: &Path, payload: &str) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    // A temp file left over from an older write keeps its old mode.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(payload.as_bytes())?;
    file.sync_all()
}
