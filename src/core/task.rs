use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;

use super::fields::{self, FieldKind, FieldSpec, Loose};
use super::{Entity, EntityKind, Subject};

pub const TABLE: &str = "task_c";

pub const SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("title_c", "title", FieldKind::Text),
    FieldSpec::new("dueDate_c", "dueDate", FieldKind::Text),
    FieldSpec::new("completed_c", "completed", FieldKind::Flag),
    FieldSpec::new("contactId_c", "contactId", FieldKind::Reference),
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Task {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "title_c", alias = "title", default, deserialize_with = "fields::de_text")]
    pub title: String,
    #[serde(rename = "dueDate_c", alias = "dueDate", default, deserialize_with = "fields::de_text")]
    pub due_date: String,
    #[serde(rename = "completed_c", alias = "completed", default, deserialize_with = "fields::de_flag")]
    pub completed: bool,
    #[serde(
        rename = "contactId_c",
        alias = "contactId",
        default,
        deserialize_with = "fields::de_reference"
    )]
    pub contact_id: Option<i64>,
}

impl Task {
    /// Due instant in local time, if the stored date parses.
    pub fn due(&self) -> Option<NaiveDateTime> {
        parse_due(&self.due_date)
    }

    /// Incomplete and due strictly before `now`.
    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        !self.completed && self.due().is_some_and(|due| due < now)
    }

    /// Incomplete and due on the calendar day `today`.
    pub fn is_due_on(&self, today: NaiveDate) -> bool {
        !self.completed && self.due().is_some_and(|due| due.date() == today)
    }
}

/// Parse an ISO-8601 date or date-time into local time.
///
/// A bare date means local midnight. Offsets (`Z`, `+02:00`) are converted
/// to the local zone.
pub fn parse_due(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local).naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// New tasks start incomplete unless the input says otherwise.
pub fn normalize_create(input: &Loose) -> Loose {
    let mut payload = fields::normalize_create(input, SCHEMA);
    payload
        .entry("completed_c")
        .or_insert(serde_json::Value::Bool(false));
    payload
}

pub fn normalize_update(input: &Loose) -> Loose {
    fields::normalize_update(input, SCHEMA)
}

impl Entity for Task {
    const KIND: EntityKind = EntityKind::Task;
    const TABLE: &'static str = TABLE;
    const FIELDS: &'static [&'static str] = &["title_c", "dueDate_c", "completed_c", "contactId_c"];

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
            name: self.title.clone(),
            amount: None,
            contact_id: self.contact_id,
            deal_id: None,
        }
    }
}
