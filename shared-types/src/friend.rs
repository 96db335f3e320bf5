use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Friend profile as reported by the chat driver. Only the nickname is
/// interpreted; every other field is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendDetail {
    #[serde(rename = "NickName", default)]
    pub nickname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// On-disk friend details document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendDetailsFile {
    #[serde(default)]
    pub friend_details: Vec<FriendDetail>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub count: usize,
}
