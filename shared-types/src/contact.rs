use serde::{Deserialize, Serialize};

/// Format version written into every contacts file.
pub const CONTACTS_FILE_VERSION: &str = "1.0.0";

/// Chat client's built-in "File Transfer" conversation. Seeded into an empty
/// store so there is always a safe target for test sends.
pub const SYSTEM_CONTACT_NAME: &str = "文件传输助手";

/// Tag carried by the seed contact in files written by earlier versions.
pub const SYSTEM_CONTACT_TAG: &str = "系统";

fn default_contact_type() -> String {
    "friend".to_string()
}

/// A contact known to the local registry. `name` is the primary key and is
/// also the identifier handed to the chat driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    #[serde(rename = "type", default = "default_contact_type")]
    pub contact_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub last_contact: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Contact {
    /// New contact stamped with `now`. Duplicate tags are dropped, first
    /// occurrence wins.
    pub fn new(
        name: impl Into<String>,
        contact_type: impl Into<String>,
        tags: impl IntoIterator<Item = String>,
        now: &str,
    ) -> Self {
        let mut contact = Self {
            name: name.into(),
            contact_type: contact_type.into(),
            tags: Vec::new(),
            last_contact: None,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        };
        for tag in tags {
            contact.insert_tag(&tag);
        }
        contact
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Returns false when the tag was already present.
    pub fn insert_tag(&mut self, tag: &str) -> bool {
        if self.has_tag(tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }

    /// Returns false when the tag was not present.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }

    /// Case-insensitive substring match on the name or any tag.
    /// `keyword_lower` must already be lowercased.
    pub fn matches_keyword(&self, keyword_lower: &str) -> bool {
        self.name.to_lowercase().contains(keyword_lower)
            || self
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(keyword_lower))
    }
}

/// On-disk contacts document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactsFile {
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}
