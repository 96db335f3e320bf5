use super::{read_json, write_json, ContactStore, StoreError};
use crate::driver::ChatDriver;
use serde::Serialize;
use shared_types::{timestamp_now, FriendDetail, FriendDetailsFile};
use std::path::{Path, PathBuf};

/// Tag given to contacts imported from friend details.
pub const IMPORTED_FRIEND_TAG: &str = "friend";

#[derive(Serialize)]
struct FriendDetailsDocument<'a> {
    friend_details: &'a [FriendDetail],
    last_updated: String,
    count: usize,
}

/// Local cache of the friend profiles last fetched from the driver.
pub struct FriendDetailsStore {
    data_file: PathBuf,
    friends: Vec<FriendDetail>,
}

impl FriendDetailsStore {
    pub fn open(data_file: impl Into<PathBuf>) -> Self {
        let mut store = Self {
            data_file: data_file.into(),
            friends: Vec::new(),
        };
        store.load();
        store
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }

    /// Same fail-soft contract as the contact store, without seeding.
    pub fn load(&mut self) -> &[FriendDetail] {
        if !self.data_file.exists() {
            tracing::warn!("Friend details file {:?} not found", self.data_file);
            self.friends.clear();
            return &self.friends;
        }

        match read_json::<FriendDetailsFile>(&self.data_file) {
            Ok(file) => {
                self.friends = file.friend_details;
                tracing::info!(
                    "Loaded {} friend details from {:?}",
                    self.friends.len(),
                    self.data_file
                );
            }
            Err(e) => {
                tracing::error!("Failed to load friend details: {}", e);
                self.friends.clear();
            }
        }
        &self.friends
    }

    pub fn save(&self) -> bool {
        let document = FriendDetailsDocument {
            friend_details: &self.friends,
            last_updated: timestamp_now(),
            count: self.friends.len(),
        };
        match write_json(&self.data_file, &document) {
            Ok(()) => {
                tracing::info!("Friend details saved to {:?}", self.data_file);
                true
            }
            Err(e) => {
                tracing::error!("Failed to save friend details: {}", e);
                false
            }
        }
    }

    /// Asks the driver for up to `limit` friend profiles, stamps and caches
    /// them. Driver errors and empty answers leave the cache untouched and
    /// return an empty list.
    pub fn fetch(
        &mut self,
        driver: &mut dyn ChatDriver,
        limit: Option<usize>,
    ) -> Vec<FriendDetail> {
        tracing::info!("Fetching friend details from driver '{}'", driver.name());

        let mut friends = match driver.friend_details(limit) {
            Ok(friends) => friends,
            Err(e) => {
                tracing::error!("Failed to fetch friend details: {}", e);
                return Vec::new();
            }
        };
        if friends.is_empty() {
            tracing::warn!("Driver returned no friend details");
            return Vec::new();
        }

        let now = timestamp_now();
        for friend in &mut friends {
            friend.updated_at = Some(now.clone());
        }

        self.friends = friends;
        self.save();
        tracing::info!("Fetched {} friend details", self.friends.len());
        self.friends.clone()
    }

    pub fn friends(&self) -> &[FriendDetail] {
        &self.friends
    }

    pub fn get_by_name(&self, nickname: &str) -> Option<&FriendDetail> {
        self.friends.iter().find(|f| f.nickname == nickname)
    }

    /// Adds every cached friend with a nickname to `contacts`, tagged
    /// [`IMPORTED_FRIEND_TAG`]. Returns how many were new.
    pub fn sync_to_contacts(&self, contacts: &mut ContactStore) -> Result<usize, StoreError> {
        if self.friends.is_empty() {
            tracing::warn!("No friend details to sync");
            return Err(StoreError::NothingToSync);
        }

        let tags = vec![IMPORTED_FRIEND_TAG.to_string()];
        let mut added = 0;
        for friend in &self.friends {
            if friend.nickname.trim().is_empty() {
                continue;
            }
            if contacts.add_contact(&friend.nickname, "friend", &tags) {
                added += 1;
            }
        }

        tracing::info!("Imported {} friends into contacts", added);
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverCapabilities, DriverError};
    use crate::storage::ContactStoreOptions;
    use serde_json::Map;
    use tempfile::tempdir;

    struct FriendlyDriver {
        friends: Vec<&'static str>,
    }

    impl ChatDriver for FriendlyDriver {
        fn name(&self) -> &str {
            "friendly"
        }

        fn capabilities(&self) -> DriverCapabilities {
            DriverCapabilities {
                send_message: true,
                friend_details: true,
            }
        }

        fn connect(&mut self) -> Result<bool, DriverError> {
            Ok(true)
        }

        fn send_message(&mut self, _: &str, _: &str, _: bool) -> Result<bool, DriverError> {
            Ok(true)
        }

        fn friend_details(
            &mut self,
            limit: Option<usize>,
        ) -> Result<Vec<FriendDetail>, DriverError> {
            Ok(self
                .friends
                .iter()
                .take(limit.unwrap_or(usize::MAX))
                .map(|name| FriendDetail {
                    nickname: name.to_string(),
                    updated_at: None,
                    extra: Map::new(),
                })
                .collect())
        }
    }

    #[test]
    fn test_fetch_stamps_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("friend_details.json");
        let mut store = FriendDetailsStore::open(&path);
        let mut driver = FriendlyDriver {
            friends: vec!["Ann", "Ben", "Cat"],
        };

        let fetched = store.fetch(&mut driver, Some(2));
        assert_eq!(fetched.len(), 2);
        assert!(fetched.iter().all(|f| f.updated_at.is_some()));

        let reloaded = FriendDetailsStore::open(&path);
        assert_eq!(reloaded.friends().len(), 2);
        assert!(reloaded.get_by_name("Ben").is_some());
        assert!(reloaded.get_by_name("Cat").is_none());

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["count"], 2);
    }

    #[test]
    fn test_unsupported_driver_keeps_cache() {
        let dir = tempdir().unwrap();
        let mut store = FriendDetailsStore::open(dir.path().join("friend_details.json"));
        let mut driver = crate::driver::DryRunDriver::new();

        assert!(store.fetch(&mut driver, None).is_empty());
        assert!(store.friends().is_empty());
        assert!(!store.data_file().exists());
    }

    #[test]
    fn test_sync_to_contacts_skips_existing() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("contacts.json"), r#"{"contacts": []}"#).unwrap();
        let mut contacts = ContactStore::open(ContactStoreOptions {
            data_file: dir.path().join("contacts.json"),
            backup_dir: dir.path().join("backups"),
            auto_backup: false,
        });
        contacts.add_contact("Ann", "friend", &[]);

        let mut store = FriendDetailsStore::open(dir.path().join("friend_details.json"));
        assert!(matches!(
            store.sync_to_contacts(&mut contacts),
            Err(StoreError::NothingToSync)
        ));

        let mut driver = FriendlyDriver {
            friends: vec!["Ann", "Ben", ""],
        };
        store.fetch(&mut driver, None);

        assert_eq!(store.sync_to_contacts(&mut contacts).unwrap(), 1);
        assert_eq!(contacts.get_by_tag(IMPORTED_FRIEND_TAG).len(), 1);
        assert_eq!(contacts.contact_count(), 2);
    }
}
