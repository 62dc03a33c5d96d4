use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use earshot_domain::{record::lenient_settings, Settings, UserRecord};
use tracing::{debug, info, warn};

use crate::store::{guest_record, is_guest, validate_user_name, ProfileStore, GUEST};
use crate::StorageError;

const USERS_DIR: &str = "users";
const CURRENT_USER_FILE: &str = "current_user";
const LAST_SETTINGS_FILE: &str = "last_settings.json";

/// One JSON file per user under `<root>/users`.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    root: PathBuf,
}

impl JsonDirStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        let users = root.join(USERS_DIR);
        fs::create_dir_all(&users).map_err(|err| StorageError::io(&users, err))?;
        info!(root = %root.display(), "opened profile store");
        Ok(Self { root })
    }

    /// `<data dir>/earshot`, e.g. `~/.local/share/earshot` on Linux.
    pub fn default_root() -> Option<PathBuf> {
        Some(dirs::data_dir()?.join("earshot"))
    }

    pub fn open_default() -> Result<Self, StorageError> {
        Self::open(Self::default_root().ok_or(StorageError::NoDataDir)?)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn user_path(&self, user: &str) -> PathBuf {
        self.root.join(USERS_DIR).join(format!("{user}.json"))
    }

    fn read_optional(&self, path: &Path) -> Option<Vec<u8>> {
        match fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                warn!(path = %path.display(), %err, "unreadable profile data; using defaults");
                None
            }
        }
    }

    fn last_settings(&self) -> Option<Settings> {
        let bytes = self.read_optional(&self.root.join(LAST_SETTINGS_FILE))?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(lenient_settings(Some(&value))),
            Err(err) => {
                warn!(%err, "corrupt last settings; using defaults");
                None
            }
        }
    }
}

/// Writes through a sibling temp file so a crash never leaves half a record.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).map_err(|err| StorageError::io(&tmp, err))?;
    fs::rename(&tmp, path).map_err(|err| StorageError::io(path, err))
}

impl ProfileStore for JsonDirStore {
    fn load(&self, user: &str) -> UserRecord {
        if is_guest(user) {
            return guest_record(self.last_settings());
        }
        let user = match validate_user_name(user) {
            Ok(user) => user,
            Err(err) => {
                warn!(%err, "cannot load profile; using defaults");
                return UserRecord::default();
            }
        };
        match self.read_optional(&self.user_path(user)) {
            Some(bytes) => UserRecord::from_json_lenient(&bytes),
            None => UserRecord::default(),
        }
    }

    fn save(&mut self, user: &str, record: &UserRecord) -> Result<(), StorageError> {
        if is_guest(user) {
            return Ok(());
        }
        let user = validate_user_name(user)?;
        write_atomic(&self.user_path(user), &record.to_json_pretty()?)?;
        write_atomic(&self.root.join(CURRENT_USER_FILE), user.as_bytes())?;
        let settings = serde_json::to_vec_pretty(&record.settings)
            .map_err(earshot_domain::DomainError::from)?;
        write_atomic(&self.root.join(LAST_SETTINGS_FILE), &settings)?;
        debug!(user, log_len = record.log.len(), "saved profile");
        Ok(())
    }

    fn list_users(&self) -> Result<Vec<String>, StorageError> {
        let dir = self.root.join(USERS_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(StorageError::io(&dir, err)),
        };
        let mut users = Vec::new();
        for entry in entries {
            let path = entry.map_err(|err| StorageError::io(&dir, err))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                if !is_guest(stem) {
                    users.push(stem.to_string());
                }
            }
        }
        users.sort();
        Ok(users)
    }

    fn remove(&mut self, user: &str) -> Result<(), StorageError> {
        if is_guest(user) {
            return Ok(());
        }
        let user = validate_user_name(user)?;
        let path = self.user_path(user);
        match fs::remove_file(&path) {
            Ok(()) => info!(user, "removed profile"),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(StorageError::io(&path, err)),
        }
        let marker = self.root.join(CURRENT_USER_FILE);
        let current = self.read_optional(&marker);
        if current.as_deref() == Some(user.as_bytes()) {
            fs::remove_file(&marker).map_err(|err| StorageError::io(&marker, err))?;
        }
        Ok(())
    }

    fn last_user(&self) -> String {
        let Some(bytes) = self.read_optional(&self.root.join(CURRENT_USER_FILE)) else {
            return GUEST.to_string();
        };
        let user = String::from_utf8_lossy(&bytes).trim().to_string();
        if self.user_path(&user).is_file() && validate_user_name(&user).is_ok() {
            user
        } else {
            GUEST.to_string()
        }
    }
}
