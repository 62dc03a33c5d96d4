use earshot_domain::{Settings, UserRecord};

use crate::StorageError;

/// Shared identity that is never persisted on its own.
pub const GUEST: &str = "Guest";

/// Load/save of per-user records.
///
/// Loading never fails: missing or corrupt data comes back as defaults.
/// The guest gets the most recently saved non-guest settings and an empty
/// log every time.
pub trait ProfileStore {
    fn load(&self, user: &str) -> UserRecord;
    fn save(&mut self, user: &str, record: &UserRecord) -> Result<(), StorageError>;
    /// Persisted users, sorted. Never includes the guest.
    fn list_users(&self) -> Result<Vec<String>, StorageError>;
    fn remove(&mut self, user: &str) -> Result<(), StorageError>;
    /// The user saved most recently, if it still exists; the guest otherwise.
    fn last_user(&self) -> String;

    /// Registers a new user with default settings and an empty log.
    fn create_user(&mut self, name: &str) -> Result<String, StorageError> {
        let name = validate_user_name(name)?.to_string();
        if self.list_users()?.contains(&name) {
            return Err(StorageError::UserExists(name));
        }
        self.save(&name, &UserRecord::new(Settings::default(), Vec::new()))?;
        Ok(name)
    }
}

/// Trims `name` and checks it can be stored.
pub fn validate_user_name(name: &str) -> Result<&str, StorageError> {
    let trimmed = name.trim();
    if trimmed == GUEST {
        return Err(StorageError::ReservedUser(trimmed.to_string()));
    }
    let unsafe_char = |c: char| c == '/' || c == '\\' || c == ':' || c.is_control();
    if trimmed.is_empty() || trimmed.starts_with('.') || trimmed.contains(unsafe_char) {
        return Err(StorageError::InvalidUser(trimmed.to_string()));
    }
    Ok(trimmed)
}

pub(crate) fn is_guest(user: &str) -> bool {
    user.trim() == GUEST
}

pub(crate) fn guest_record(last_settings: Option<Settings>) -> UserRecord {
    UserRecord::new(last_settings.unwrap_or_default(), Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_names() {
        assert_eq!(validate_user_name("  ada ").unwrap(), "ada");
        assert!(matches!(
            validate_user_name("Guest"),
            Err(StorageError::ReservedUser(_))
        ));
        assert!(validate_user_name("   ").is_err());
        assert!(validate_user_name("../etc").is_err());
        assert!(validate_user_name("a/b").is_err());
        assert!(validate_user_name(".hidden").is_err());
        assert!(validate_user_name("Zoë Ng").is_ok());
    }
}
