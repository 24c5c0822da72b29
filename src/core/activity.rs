use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;

use super::fields::{self, FieldKind, FieldSpec, Loose};
use super::{Entity, EntityKind, Subject};

pub const TABLE: &str = "activity_c";

pub const SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("description_c", "description", FieldKind::Text),
    FieldSpec::new("timestamp_c", "timestamp", FieldKind::Text),
    FieldSpec::new("type_c", "type", FieldKind::Text),
    FieldSpec::new("contactId_c", "contactId", FieldKind::Reference),
    FieldSpec::new("dealId_c", "dealId", FieldKind::Reference),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityType {
    Note,
    Deal,
    Task,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Deal => "deal",
            Self::Task => "task",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "note" => Some(Self::Note),
            "deal" => Some(Self::Deal),
            "task" => Some(Self::Task),
            _ => None,
        }
    }

    /// Activity type written when a record of `kind` changes.
    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Deal => Self::Deal,
            EntityKind::Task => Self::Task,
            EntityKind::Contact | EntityKind::Activity => Self::Note,
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn de_type<'de, D: Deserializer<'de>>(d: D) -> Result<Option<ActivityType>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => ActivityType::parse(&s),
        _ => None,
    })
}

/// Append-only log entry derived from a contact, deal or task mutation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Activity {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(
        rename = "description_c",
        alias = "description",
        default,
        deserialize_with = "fields::de_text"
    )]
    pub description: String,
    #[serde(rename = "timestamp_c", alias = "timestamp", default, deserialize_with = "fields::de_text")]
    pub timestamp: String,
    #[serde(rename = "type_c", alias = "type", default, deserialize_with = "de_type")]
    pub kind: Option<ActivityType>,
    #[serde(
        rename = "contactId_c",
        alias = "contactId",
        default,
        deserialize_with = "fields::de_reference"
    )]
    pub contact_id: Option<i64>,
    #[serde(rename = "dealId_c", alias = "dealId", default, deserialize_with = "fields::de_reference")]
    pub deal_id: Option<i64>,
}

pub fn normalize_create(input: &Loose) -> Loose {
    fields::normalize_create(input, SCHEMA)
}

pub fn normalize_update(input: &Loose) -> Loose {
    fields::normalize_update(input, SCHEMA)
}

impl Entity for Activity {
    const KIND: EntityKind = EntityKind::Activity;
    const TABLE: &'static str = TABLE;
    const FIELDS: &'static [&'static str] = &[
        "description_c",
        "timestamp_c",
        "type_c",
        "contactId_c",
        "dealId_c",
    ];
    const NEWEST_FIRST_BY: Option<&'static str> = Some("timestamp_c");

    fn id(&self) -> i64 {
        self.id
    }

    fn normalize_create(input: &Loose) -> Loose {
        normalize_create(input)
    }

    fn normalize_update(input: &Loose) -> Loose {
        normalize_update(input)
    }

    fn subject(&self) -> Subject {
        Subject {
            name: self.description.clone(),
            amount: None,
            contact_id: self.contact_id,
            deal_id: self.deal_id,
        }
    }
}
