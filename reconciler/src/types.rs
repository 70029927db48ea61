use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const GROUP_PARTITION: &str = "WHATSAPP#GROUP";
pub const INVITE_LINKS_PARTITION: &str = "WHATSAPP#INVITELINKS";

/// A group as submitted by a caller. Nothing about it is trusted: each
/// attribute is kept as the raw JSON value and checked during validation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupInput {
    #[serde(rename = "SK", default)]
    pub sk: Value,
    #[serde(rename = "Name", default)]
    pub name: Value,
    #[serde(rename = "InviteCode", default)]
    pub invite_code: Value,
    #[serde(rename = "TotalMembers", default)]
    pub total_members: Value,
    #[serde(rename = "Updated", default)]
    pub updated: Value,
}

impl GroupInput {
    /// Anything that is not a JSON object yields an input with every attribute absent.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) => serde_json::from_value(value).unwrap_or_default(),
            _ => GroupInput::default(),
        }
    }

    pub fn sk(&self) -> Option<&str> {
        self.sk.as_str()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_str()
    }

    pub fn invite_code(&self) -> Option<&str> {
        self.invite_code.as_str()
    }

    /// The member count when it is a non-negative whole number. Integral
    /// floats such as `10.0` or `-0.0` are accepted.
    pub fn member_count(&self) -> Option<u64> {
        if let Some(count) = self.total_members.as_u64() {
            return Some(count);
        }
        let count = self.total_members.as_f64()?;
        (count.is_finite() && count >= 0.0 && count.fract() == 0.0 && count < u64::MAX as f64)
            .then_some(count as u64)
    }

    pub fn updated(&self) -> Option<&str> {
        self.updated.as_str().filter(|updated| !updated.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    #[serde(rename = "PK")]
    pub pk: String,
    #[serde(rename = "SK")]
    pub sk: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "InviteCode")]
    pub invite_code: String,
    #[serde(rename = "TotalMembers")]
    pub total_members: u64,
    #[serde(rename = "Updated")]
    pub updated: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteLinkRecord {
    #[serde(rename = "PK")]
    pub pk: String,
    #[serde(rename = "SK")]
    pub sk: String,
    #[serde(rename = "InviteCodes")]
    pub invite_codes: Vec<String>,
    #[serde(rename = "Updated")]
    pub updated: String,
}

/// Anything the reconciler writes to the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Record {
    Group(GroupRecord),
    InviteLinks(InviteLinkRecord),
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    pub pk: String,
    pub sk: String,
}

impl Record {
    pub fn key(&self) -> RecordKey {
        let (pk, sk) = match self {
            Record::Group(group) => (&group.pk, &group.sk),
            Record::InviteLinks(links) => (&links.pk, &links.sk),
        };
        RecordKey {
            pk: pk.clone(),
            sk: sk.clone(),
        }
    }
}

impl From<GroupRecord> for Record {
    fn from(record: GroupRecord) -> Self {
        Record::Group(record)
    }
}

impl From<InviteLinkRecord> for Record {
    fn from(record: InviteLinkRecord) -> Self {
        Record::InviteLinks(record)
    }
}

/// Renders a write timestamp the way it is stored: RFC 3339, UTC, milliseconds.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_timestamp() -> String {
    format_timestamp(Utc::now())
}
