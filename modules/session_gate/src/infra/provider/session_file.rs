use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::contract::model::{Session, SessionUser};

#[derive(Error, Debug)]
pub enum SessionFileError {
    #[error("failed to access session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("session file {path} is not valid: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    user_id: Uuid,
    email: Option<String>,
    provider: String,
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl From<&Session> for StoredSession {
    fn from(s: &Session) -> Self {
        Self {
            user_id: s.user.id,
            email: s.user.email.clone(),
            provider: s.user.provider.clone(),
            access_token: s.access_token.clone(),
            refresh_token: s.refresh_token.clone(),
            expires_at: s.expires_at,
        }
    }
}

impl From<StoredSession> for Session {
    fn from(s: StoredSession) -> Self {
        Self {
            user: SessionUser {
                id: s.user_id,
                email: s.email,
                provider: s.provider,
            },
            access_token: s.access_token,
            refresh_token: s.refresh_token,
            expires_at: s.expires_at,
        }
    }
}

/// Session persisted across restarts as JSON.
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

    pub fn load(&self) -> Result<Option<Session>, SessionFileError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(self.io(source)),
        };
        let stored: StoredSession =
            serde_json::from_str(&raw).map_err(|source| SessionFileError::Json {
                path: self.path.clone(),
                source,
            })?;
        Ok(Some(stored.into()))
    }

    pub fn save(&self, session: &Session) -> Result<(), SessionFileError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io(e))?;
        }
        let json = serde_json::to_vec_pretty(&StoredSession::from(session)).map_err(|source| {
            SessionFileError::Json {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, json).map_err(|e| self.io(e))
    }

    /// Missing file is not an error.
    pub fn remove(&self) -> Result<(), SessionFileError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io(e)),
        }
    }

    fn io(&self, source: io::Error) -> SessionFileError {
        SessionFileError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session() -> Session {
        Session {
            user: SessionUser {
                id: Uuid::new_v4(),
                email: Some("me@example.com".into()),
                provider: "facebook".into(),
            },
            access_token: "at".into(),
            refresh_token: Some("rt".into()),
            expires_at: DateTime::from_timestamp(1_700_000_000, 0),
        }
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        assert!(file.load().unwrap().is_none());
        file.remove().unwrap();
    }

    #[test]
    fn saved_session_is_restored() {
        let dir = TempDir::new().unwrap();
        let file = SessionFile::new(dir.path().join("nested/session.json"));
        let original = session();

        file.save(&original).unwrap();
        assert_eq!(file.load().unwrap(), Some(original));

        file.remove().unwrap();
        assert!(!file.path().exists());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        let err = SessionFile::new(&path).load().unwrap_err();
        assert!(matches!(err, SessionFileError::Json { .. }));
    }
}
