use chrono::{DateTime, Local};

pub mod contact;
pub mod friend;
pub mod send;
pub mod validation;

pub use contact::{
    Contact, ContactsFile, CONTACTS_FILE_VERSION, SYSTEM_CONTACT_NAME, SYSTEM_CONTACT_TAG,
};
pub use friend::{FriendDetail, FriendDetailsFile};
pub use send::{SendFailure, SendReport, SendStatistics};
pub use validation::ValidationResult;

/// Local timestamp in the ISO-8601 form used by every persisted file,
/// e.g. `2025-06-30T10:15:02.123456`.
pub fn timestamp_now() -> String {
    format_timestamp(&Local::now())
}

pub fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}
