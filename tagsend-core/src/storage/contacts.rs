use super::{read_json, write_json, StoreError};
use crate::driver::ChatDriver;
use crate::settings::ContactsConfig;
use chrono::Local;
use serde::Serialize;
use shared_types::{
    timestamp_now, Contact, ContactsFile, CONTACTS_FILE_VERSION, SYSTEM_CONTACT_NAME,
    SYSTEM_CONTACT_TAG,
};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ContactStoreOptions {
    pub data_file: PathBuf,
    pub backup_dir: PathBuf,
    pub auto_backup: bool,
}

impl From<&ContactsConfig> for ContactStoreOptions {
    fn from(config: &ContactsConfig) -> Self {
        Self {
            data_file: config.data_file.clone(),
            backup_dir: config.backup_dir.clone(),
            auto_backup: config.auto_backup,
        }
    }
}

#[derive(Serialize)]
struct ContactsDocument<'a> {
    contacts: &'a [Contact],
    last_updated: String,
    version: &'static str,
}

/// Contact registry backed by a single JSON file.
///
/// Every mutation is written through immediately. Mutators report failure as
/// `false` and log the cause; when only the write fails the in-memory change
/// is kept, so memory can run ahead of disk until the next successful save.
pub struct ContactStore {
    options: ContactStoreOptions,
    contacts: Vec<Contact>,
}

impl ContactStore {
    /// Creates the store and loads it from disk.
    pub fn open(options: ContactStoreOptions) -> Self {
        let mut store = Self {
            options,
            contacts: Vec::new(),
        };
        store.load();
        store
    }

    pub fn data_file(&self) -> &Path {
        &self.options.data_file
    }

    /// Reloads from disk and returns the loaded contacts.
    ///
    /// Never fails: a missing file seeds the system contact (when the store
    /// is empty), an unreadable or malformed file leaves the store empty.
    /// The bad file is preserved by the backup taken on the next save.
    pub fn load(&mut self) -> Vec<Contact> {
        let path = self.options.data_file.clone();

        if !path.exists() {
            tracing::info!("Contacts file {:?} not found, starting with a seed contact", path);
            if self.contacts.is_empty() {
                self.seed_system_contact();
            }
            return self.list_all();
        }

        match read_json::<ContactsFile>(&path) {
            Ok(file) => {
                self.contacts = file.contacts;
                tracing::info!("Loaded {} contacts from {:?}", self.contacts.len(), path);
            }
            Err(e) => {
                tracing::error!("Failed to load contacts: {}", e);
                self.contacts.clear();
            }
        }

        self.list_all()
    }

    /// Writes the store to disk, backing up the previous file first when
    /// auto backup is on.
    pub fn persist(&self) -> Result<(), StoreError> {
        if self.options.auto_backup && self.options.data_file.exists() {
            if let Err(e) = self.try_backup() {
                tracing::warn!("Backup before save failed: {}", e);
            }
        }

        let document = ContactsDocument {
            contacts: &self.contacts,
            last_updated: timestamp_now(),
            version: CONTACTS_FILE_VERSION,
        };
        write_json(&self.options.data_file, &document)?;

        tracing::debug!(
            "Saved {} contacts to {:?}",
            self.contacts.len(),
            self.options.data_file
        );
        Ok(())
    }

    pub fn save(&self) -> bool {
        match self.persist() {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to save contacts: {}", e);
                false
            }
        }
    }

    /// Copies the current file to
    /// `<backup_dir>/<stem>_backup_YYYYMMDD_HHMMSS.json`. Succeeds trivially
    /// when there is no file yet.
    pub fn backup(&self) -> bool {
        match self.try_backup() {
            Ok(Some(path)) => {
                tracing::info!("Contacts backed up to {:?}", path);
                true
            }
            Ok(None) => true,
            Err(e) => {
                tracing::error!("Failed to back up contacts: {}", e);
                false
            }
        }
    }

    fn try_backup(&self) -> Result<Option<PathBuf>, StoreError> {
        let source = &self.options.data_file;
        if !source.exists() {
            return Ok(None);
        }

        let backup_dir = &self.options.backup_dir;
        std::fs::create_dir_all(backup_dir).map_err(|e| StoreError::io(backup_dir, e))?;

        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("contacts");
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let target = backup_dir.join(format!("{stem}_backup_{timestamp}.json"));

        std::fs::copy(source, &target).map_err(|e| StoreError::io(&target, e))?;
        Ok(Some(target))
    }

    fn seed_system_contact(&mut self) -> bool {
        self.contacts.push(Contact::new(
            SYSTEM_CONTACT_NAME,
            "system",
            vec![SYSTEM_CONTACT_TAG.to_string()],
            &timestamp_now(),
        ));
        tracing::info!("Added seed contact {}", SYSTEM_CONTACT_NAME);
        self.save()
    }

    /// Appends a new contact, keeping `name` exactly as given. Fails without
    /// touching the store when the name is blank or already taken.
    pub fn add_contact(&mut self, name: &str, contact_type: &str, tags: &[String]) -> bool {
        if name.trim().is_empty() {
            tracing::warn!("Refusing to add a contact with an empty name");
            return false;
        }
        if self.get(name).is_some() {
            tracing::warn!("Contact '{}' already exists", name);
            return false;
        }

        self.contacts.push(Contact::new(
            name,
            contact_type,
            tags.iter().cloned(),
            &timestamp_now(),
        ));
        tracing::info!("Added contact '{}'", name);
        self.save()
    }

    /// Tags a contact. Already-present tags count as success.
    pub fn add_tag(&mut self, name: &str, tag: &str) -> bool {
        let Some(contact) = self.contacts.iter_mut().find(|c| c.name == name) else {
            tracing::warn!("Contact '{}' not found", name);
            return false;
        };

        if !contact.insert_tag(tag) {
            tracing::warn!("Contact '{}' already has tag '{}'", name, tag);
            return true;
        }
        contact.updated_at = timestamp_now();
        tracing::info!("Tagged '{}' with '{}'", name, tag);
        self.save()
    }

    pub fn remove_tag(&mut self, name: &str, tag: &str) -> bool {
        let Some(contact) = self.contacts.iter_mut().find(|c| c.name == name) else {
            tracing::warn!("Contact '{}' not found", name);
            return false;
        };

        if !contact.remove_tag(tag) {
            tracing::warn!("Contact '{}' has no tag '{}'", name, tag);
            return false;
        }
        contact.updated_at = timestamp_now();
        tracing::info!("Removed tag '{}' from '{}'", tag, name);
        self.save()
    }

    /// Contacts carrying `tag`, in store order.
    pub fn get_by_tag(&self, tag: &str) -> Vec<Contact> {
        let matched: Vec<Contact> = self
            .contacts
            .iter()
            .filter(|c| c.has_tag(tag))
            .cloned()
            .collect();
        tracing::info!("Tag '{}' matched {} contacts", tag, matched.len());
        matched
    }

    pub fn search(&self, keyword: &str) -> Vec<Contact> {
        let keyword = keyword.to_lowercase();
        let matched: Vec<Contact> = self
            .contacts
            .iter()
            .filter(|c| c.matches_keyword(&keyword))
            .cloned()
            .collect();
        tracing::info!("Keyword '{}' matched {} contacts", keyword, matched.len());
        matched
    }

    pub fn get(&self, name: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.name == name)
    }

    pub fn list_all(&self) -> Vec<Contact> {
        self.contacts.clone()
    }

    pub fn all_tags(&self) -> BTreeSet<String> {
        self.contacts
            .iter()
            .flat_map(|c| c.tags.iter().cloned())
            .collect()
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    /// Bulk contact listing is gone from the chat driver, so syncing only
    /// points at the alternatives and guarantees the seed contact exists.
    pub fn sync_from_driver(&mut self, driver: &dyn ChatDriver) -> bool {
        tracing::info!("Syncing contacts from driver '{}'", driver.name());

        let capabilities = driver.capabilities();
        tracing::warn!(
            "Driver '{}' cannot list friends; add contacts manually with `tagsend add`",
            driver.name()
        );
        if capabilities.friend_details {
            tracing::info!(
                "Friend details are available: import them with `tagsend friends --import`"
            );
        }

        if self.contacts.is_empty() {
            return self.seed_system_contact();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::DryRunDriver;
    use tempfile::{tempdir, TempDir};

    fn options(dir: &TempDir) -> ContactStoreOptions {
        ContactStoreOptions {
            data_file: dir.path().join("contacts.json"),
            backup_dir: dir.path().join("backups"),
            auto_backup: true,
        }
    }

    fn empty_store(dir: &TempDir) -> ContactStore {
        std::fs::write(dir.path().join("contacts.json"), r#"{"contacts": []}"#).unwrap();
        ContactStore::open(options(dir))
    }

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn names(contacts: &[Contact]) -> Vec<&str> {
        contacts.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_missing_file_seeds_system_contact() {
        let dir = tempdir().unwrap();
        let store = ContactStore::open(options(&dir));

        assert_eq!(store.contact_count(), 1);
        let seed = store.get(SYSTEM_CONTACT_NAME).unwrap();
        assert_eq!(seed.contact_type, "system");
        assert_eq!(seed.tags, vec![SYSTEM_CONTACT_TAG]);
        assert_eq!(names(&store.get_by_tag(SYSTEM_CONTACT_TAG)), vec![SYSTEM_CONTACT_NAME]);
        assert!(dir.path().join("contacts.json").exists());
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("contacts.json"), "{ not json").unwrap();

        let mut store = ContactStore::open(options(&dir));
        assert_eq!(store.contact_count(), 0);

        assert!(store.add_contact("Alice", "friend", &[]));
        let backups: Vec<_> = std::fs::read_dir(dir.path().join("backups"))
            .unwrap()
            .collect();
        assert_eq!(backups.len(), 1);
        let saved = std::fs::read_to_string(backups[0].as_ref().unwrap().path()).unwrap();
        assert_eq!(saved, "{ not json");
    }

    #[test]
    fn test_add_distinct_and_duplicate() {
        let dir = tempdir().unwrap();
        let mut store = empty_store(&dir);

        assert!(store.add_contact("Alice", "friend", &tags(&["vip"])));
        assert!(store.add_contact("Bob", "friend", &[]));
        assert_eq!(store.contact_count(), 2);

        let before = store.list_all();
        assert!(!store.add_contact("Alice", "system", &tags(&["other"])));
        assert_eq!(store.list_all(), before);
    }

    #[test]
    fn test_add_rejects_blank_name() {
        let dir = tempdir().unwrap();
        let mut store = empty_store(&dir);
        assert!(!store.add_contact("   ", "friend", &[]));
        assert_eq!(store.contact_count(), 0);
    }

    #[test]
    fn test_add_keeps_name_verbatim() {
        let dir = tempdir().unwrap();
        let mut store = empty_store(&dir);

        assert!(store.add_contact(" Alice ", "friend", &[]));
        assert!(store.get(" Alice ").is_some());
        assert!(store.get("Alice").is_none());
        assert!(store.add_contact("Alice", "friend", &[]));
        assert_eq!(store.contact_count(), 2);
    }

    #[test]
    fn test_add_tag_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut store = empty_store(&dir);
        store.add_contact("Alice", "friend", &[]);

        assert!(store.add_tag("Alice", "vip"));
        let once = store.get("Alice").unwrap().clone();
        assert!(store.add_tag("Alice", "vip"));
        let twice = store.get("Alice").unwrap().clone();

        assert_eq!(once.tags, vec!["vip"]);
        assert_eq!(once, twice);
        assert!(!store.add_tag("Nobody", "vip"));
    }

    #[test]
    fn test_remove_missing_tag_leaves_contact_unchanged() {
        let dir = tempdir().unwrap();
        let mut store = empty_store(&dir);
        store.add_contact("Alice", "friend", &tags(&["vip"]));
        let before = store.get("Alice").unwrap().clone();

        assert!(!store.remove_tag("Alice", "work"));
        assert_eq!(store.get("Alice").unwrap(), &before);
        assert!(!store.remove_tag("Nobody", "vip"));

        assert!(store.remove_tag("Alice", "vip"));
        assert!(store.get("Alice").unwrap().tags.is_empty());
    }

    #[test]
    fn test_get_by_tag_keeps_store_order() {
        let dir = tempdir().unwrap();
        let mut store = empty_store(&dir);
        store.add_contact("A", "friend", &tags(&["vip"]));
        store.add_contact("C", "friend", &[]);
        store.add_contact("B", "friend", &tags(&["friend", "vip"]));

        assert_eq!(names(&store.get_by_tag("vip")), vec!["A", "B"]);
        assert_eq!(names(&store.get_by_tag("friend")), vec!["B"]);
        assert!(store.get_by_tag("VIP").is_empty());
        assert!(store.get_by_tag("nothing").is_empty());
    }

    #[test]
    fn test_search_name_or_tag_case_insensitive() {
        let dir = tempdir().unwrap();
        let mut store = empty_store(&dir);
        store.add_contact("Alice Wong", "friend", &tags(&["Work"]));
        store.add_contact("Bob", "friend", &tags(&["family"]));

        assert_eq!(names(&store.search("ALICE")), vec!["Alice Wong"]);
        assert_eq!(names(&store.search("work")), vec!["Alice Wong"]);
        assert_eq!(names(&store.search("fam")), vec!["Bob"]);
        assert!(store.search("zzz").is_empty());
    }

    #[test]
    fn test_list_all_is_a_copy() {
        let dir = tempdir().unwrap();
        let mut store = empty_store(&dir);
        store.add_contact("Alice", "friend", &[]);

        let mut copy = store.list_all();
        copy[0].tags.push("hacked".to_string());
        copy.clear();

        assert_eq!(store.contact_count(), 1);
        assert!(store.get("Alice").unwrap().tags.is_empty());
    }

    #[test]
    fn test_all_tags_sorted_and_unique() {
        let dir = tempdir().unwrap();
        let mut store = empty_store(&dir);
        store.add_contact("A", "friend", &tags(&["vip", "work"]));
        store.add_contact("B", "friend", &tags(&["vip", "family"]));

        let all: Vec<String> = store.all_tags().into_iter().collect();
        assert_eq!(all, vec!["family", "vip", "work"]);
    }

    #[test]
    fn test_round_trip_preserves_contacts() {
        let dir = tempdir().unwrap();
        let mut store = empty_store(&dir);
        store.add_contact("Zed", "friend", &tags(&["b", "a"]));
        store.add_contact("Amy", "system", &[]);
        store.add_tag("Amy", "ops");
        let expected = store.list_all();

        let reloaded = ContactStore::open(options(&dir));
        assert_eq!(reloaded.list_all(), expected);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.data_file()).unwrap()).unwrap();
        assert_eq!(raw["version"], CONTACTS_FILE_VERSION);
        assert!(raw["last_updated"].is_string());
        assert_eq!(raw["contacts"][0]["name"], "Zed");
    }

    #[test]
    fn test_backup_file_name() {
        let dir = tempdir().unwrap();
        let store = empty_store(&dir);
        assert!(store.backup());

        let entry = std::fs::read_dir(dir.path().join("backups"))
            .unwrap()
            .next()
            .unwrap()
            .unwrap();
        let file_name = entry.file_name().into_string().unwrap();
        let stamp = file_name
            .strip_prefix("contacts_backup_")
            .and_then(|rest| rest.strip_suffix(".json"))
            .unwrap();
        let (date, time) = stamp.split_once('_').unwrap();
        assert_eq!(date.len(), 8);
        assert_eq!(time.len(), 6);
        assert!(date.chars().chain(time.chars()).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_no_backup_when_disabled() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("contacts.json"), r#"{"contacts": []}"#).unwrap();
        let mut opts = options(&dir);
        opts.auto_backup = false;
        let mut store = ContactStore::open(opts);

        assert!(store.add_contact("Alice", "friend", &[]));
        assert!(!dir.path().join("backups").exists());
    }

    #[test]
    fn test_write_failure_returns_false_and_keeps_memory() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("blocker"), "").unwrap();
        let mut store = ContactStore::open(ContactStoreOptions {
            data_file: dir.path().join("blocker").join("contacts.json"),
            backup_dir: dir.path().join("backups"),
            auto_backup: true,
        });

        assert!(!store.add_contact("Alice", "friend", &[]));
        assert!(store.get("Alice").is_some());
        assert!(!store.save());
    }

    #[test]
    fn test_sync_seeds_empty_store_only() {
        let dir = tempdir().unwrap();
        let mut store = empty_store(&dir);
        let driver = DryRunDriver::new();

        assert!(store.sync_from_driver(&driver));
        assert_eq!(names(&store.list_all()), vec![SYSTEM_CONTACT_NAME]);

        assert!(store.sync_from_driver(&driver));
        assert_eq!(store.contact_count(), 1);
    }
}
