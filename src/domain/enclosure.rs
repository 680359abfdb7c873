use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enclosure {
    pub id: i64,
    pub item_id: i64,
    pub url: String,
    pub length: u64,
    pub media_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEnclosure {
    pub url: String,
    pub length: u64,
    pub media_type: String,
}
