use std::collections::BTreeMap;

use earshot_domain::{Settings, UserRecord};

use crate::store::{guest_record, is_guest, validate_user_name, ProfileStore, GUEST};
use crate::StorageError;

/// Process-local store for throwaway sessions.
///
/// Records are kept encoded so loads go through the same lenient decoding
/// as files do.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: BTreeMap<String, Vec<u8>>,
    current: Option<String>,
    last_settings: Option<Settings>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStore for MemoryStore {
    fn load(&self, user: &str) -> UserRecord {
        if is_guest(user) {
            return guest_record(self.last_settings.clone());
        }
        let Ok(user) = validate_user_name(user) else {
            return UserRecord::default();
        };
        self.users
            .get(user)
            .map(|bytes| UserRecord::from_json_lenient(bytes))
            .unwrap_or_default()
    }

    fn save(&mut self, user: &str, record: &UserRecord) -> Result<(), StorageError> {
        if is_guest(user) {
            return Ok(());
        }
        let user = validate_user_name(user)?.to_string();
        self.users.insert(user.clone(), record.to_json_pretty()?);
        self.current = Some(user);
        self.last_settings = Some(record.settings.clone());
        Ok(())
    }

    fn list_users(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.users.keys().cloned().collect())
    }

    fn remove(&mut self, user: &str) -> Result<(), StorageError> {
        if is_guest(user) {
            return Ok(());
        }
        let user = validate_user_name(user)?;
        self.users.remove(user);
        if self.current.as_deref() == Some(user) {
            self.current = None;
        }
        Ok(())
    }

    fn last_user(&self) -> String {
        self.current
            .as_ref()
            .filter(|user| self.users.contains_key(*user))
            .cloned()
            .unwrap_or_else(|| GUEST.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_follows_guest_rules() {
        let mut store = MemoryStore::new();
        let record = UserRecord::new(
            Settings {
                win: 4,
                ..Settings::default()
            },
            Vec::new(),
        );
        store.save("ada", &record).unwrap();
        store.save("bob", &UserRecord::default()).unwrap();
        assert_eq!(store.list_users().unwrap(), vec!["ada", "bob"]);
        assert_eq!(store.load("ada"), record);
        assert_eq!(store.last_user(), "bob");
        assert_eq!(store.load(GUEST).settings, Settings::default());

        store.remove("bob").unwrap();
        assert_eq!(store.last_user(), GUEST);
        store.save("ada", &record).unwrap();
        assert_eq!(store.load(GUEST).settings.win, 4);
    }

    #[test]
    fn names_are_trimmed_like_save() {
        let mut store = MemoryStore::new();
        let record = UserRecord::new(
            Settings {
                win: 6,
                ..Settings::default()
            },
            Vec::new(),
        );
        store.save(" bob ", &record).unwrap();
        assert_eq!(store.load(" bob "), record);
        assert_eq!(store.last_user(), "bob");
        assert!(store.remove("a/b").is_err());

        store.remove(" bob ").unwrap();
        assert!(store.list_users().unwrap().is_empty());
        assert_eq!(store.last_user(), GUEST);
    }
}
