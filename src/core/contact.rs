use serde::Deserialize;

use super::fields::{self, FieldKind, FieldSpec, Loose};
use super::{Entity, EntityKind, Subject};

pub const TABLE: &str = "contact_c";

pub const SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("name_c", "name", FieldKind::Text),
    FieldSpec::new("company_c", "company", FieldKind::Text),
    FieldSpec::new("email_c", "email", FieldKind::Text),
    FieldSpec::new("phone_c", "phone", FieldKind::Text),
    FieldSpec::new("tags_c", "tags", FieldKind::Tags),
    FieldSpec::new("notes_c", "notes", FieldKind::Text),
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Contact {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "name_c", alias = "name", default, deserialize_with = "fields::de_text")]
    pub name: String,
    #[serde(rename = "company_c", alias = "company", default, deserialize_with = "fields::de_text")]
    pub company: String,
    #[serde(rename = "email_c", alias = "email", default, deserialize_with = "fields::de_text")]
    pub email: String,
    #[serde(rename = "phone_c", alias = "phone", default, deserialize_with = "fields::de_text")]
    pub phone: String,
    #[serde(rename = "tags_c", alias = "tags", default, deserialize_with = "fields::de_tags")]
    pub tags: Vec<String>,
    #[serde(rename = "notes_c", alias = "notes", default, deserialize_with = "fields::de_text")]
    pub notes: String,
}

impl Contact {
    /// Case-insensitive match against name, company, email and tags.
    pub fn matches(&self, needle_lower: &str) -> bool {
        [&self.name, &self.company, &self.email]
            .iter()
            .any(|field| field.to_lowercase().contains(needle_lower))
            || self
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(needle_lower))
    }
}

pub fn normalize_create(input: &Loose) -> Loose {
    fields::normalize_create(input, SCHEMA)
}

pub fn normalize_update(input: &Loose) -> Loose {
    fields::normalize_update(input, SCHEMA)
}

impl Entity for Contact {
    const KIND: EntityKind = EntityKind::Contact;
    const TABLE: &'static str = TABLE;
    const FIELDS: &'static [&'static str] = &[
        "name_c",
        "company_c",
        "email_c",
        "phone_c",
        "tags_c",
        "notes_c",
    ];

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
            name: self.name.clone(),
            amount: None,
            contact_id: Some(self.id),
            deal_id: None,
        }
    }
}
