pub mod activity;
pub mod contact;
pub mod deal;
pub mod fields;
pub mod task;
pub mod task_filter;

use serde::de::DeserializeOwned;
use std::fmt;

pub use activity::{Activity, ActivityType};
pub use contact::Contact;
pub use deal::{Deal, DealStage};
pub use fields::Loose;
pub use task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Contact,
    Deal,
    Task,
    Activity,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Contact => "Contact",
            Self::Deal => "Deal",
            Self::Task => "Task",
            Self::Activity => "Activity",
        }
    }

    /// Lowercase plural, as used in "Failed to fetch contacts".
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Contact => "contacts",
            Self::Deal => "deals",
            Self::Task => "tasks",
            Self::Activity => "activities",
        }
    }

    pub fn singular(&self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Deal => "deal",
            Self::Task => "task",
            Self::Activity => "activity",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What an activity entry says about a mutated record.
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    pub name: String,
    /// Monetary amount appended to create/update descriptions (deals only).
    pub amount: Option<f64>,
    pub contact_id: Option<i64>,
    pub deal_id: Option<i64>,
}

/// A record type stored in one table of the remote store.
///
/// `normalize_create` and `normalize_update` map loose input (canonical
/// `_c` names or bare legacy names) to the canonical payload sent over the
/// wire. Both are pure.
pub trait Entity: DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: EntityKind;
    const TABLE: &'static str;
    const FIELDS: &'static [&'static str];
    /// Field used to order `get_all`, newest first.
    const NEWEST_FIRST_BY: Option<&'static str> = None;

    fn id(&self) -> i64;

    fn normalize_create(input: &Loose) -> Loose;

    fn normalize_update(input: &Loose) -> Loose;

    fn subject(&self) -> Subject;
}
