use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;

use super::fields::{self, FieldKind, FieldSpec, Loose};
use super::{Entity, EntityKind, Subject};

pub const TABLE: &str = "deal_c";

pub const SCHEMA: &[FieldSpec] = &[
    FieldSpec::new("title_c", "title", FieldKind::Text),
    FieldSpec::new("value_c", "value", FieldKind::Number),
    FieldSpec::new("stage_c", "stage", FieldKind::Text),
    FieldSpec::new("probability_c", "probability", FieldKind::Number),
    FieldSpec::new("expectedCloseDate_c", "expectedCloseDate", FieldKind::Text),
    FieldSpec::new("contactId_c", "contactId", FieldKind::Reference),
];

/// Pipeline stage. Stages the store knows but this crate doesn't are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DealStage {
    Lead,
    Qualified,
    Proposal,
    Negotiation,
    ClosedWon,
    ClosedLost,
    Other(String),
}

impl DealStage {
    /// Stages in pipeline order.
    pub const PIPELINE: [DealStage; 6] = [
        Self::Lead,
        Self::Qualified,
        Self::Proposal,
        Self::Negotiation,
        Self::ClosedWon,
        Self::ClosedLost,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Lead => "Lead",
            Self::Qualified => "Qualified",
            Self::Proposal => "Proposal",
            Self::Negotiation => "Negotiation",
            Self::ClosedWon => "Closed Won",
            Self::ClosedLost => "Closed Lost",
            Self::Other(s) => s,
        }
    }

    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        let key: String = trimmed
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "" | "lead" => Self::Lead,
            "qualified" => Self::Qualified,
            "proposal" => Self::Proposal,
            "negotiation" => Self::Negotiation,
            "closedwon" | "won" => Self::ClosedWon,
            "closedlost" | "lost" => Self::ClosedLost,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ClosedWon | Self::ClosedLost)
    }
}

impl Default for DealStage {
    fn default() -> Self {
        Self::Lead
    }
}

impl fmt::Display for DealStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn de_stage<'de, D: Deserializer<'de>>(d: D) -> Result<DealStage, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => DealStage::parse(&s),
        _ => DealStage::Lead,
    })
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Deal {
    #[serde(rename = "Id")]
    pub id: i64,
    #[serde(rename = "title_c", alias = "title", default, deserialize_with = "fields::de_text")]
    pub title: String,
    #[serde(rename = "value_c", alias = "value", default, deserialize_with = "fields::de_number")]
    pub value: f64,
    #[serde(rename = "stage_c", alias = "stage", default, deserialize_with = "de_stage")]
    pub stage: DealStage,
    #[serde(
        rename = "probability_c",
        alias = "probability",
        default,
        deserialize_with = "fields::de_number"
    )]
    pub probability: f64,
    #[serde(
        rename = "expectedCloseDate_c",
        alias = "expectedCloseDate",
        default,
        deserialize_with = "fields::de_text"
    )]
    pub expected_close_date: String,
    #[serde(
        rename = "contactId_c",
        alias = "contactId",
        default,
        deserialize_with = "fields::de_reference"
    )]
    pub contact_id: Option<i64>,
}

impl Deal {
    /// Value weighted by close probability (percent).
    pub fn weighted_value(&self) -> f64 {
        self.value * self.probability / 100.0
    }
}

/// Stage defaults to `Lead` when neither spelling supplies one.
pub fn normalize_create(input: &Loose) -> Loose {
    let mut payload = fields::normalize_create(input, SCHEMA);
    let has_stage = payload
        .get("stage_c")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty());
    if !has_stage {
        payload.insert(
            "stage_c".to_string(),
            Value::String(DealStage::Lead.as_str().to_string()),
        );
    }
    payload
}

pub fn normalize_update(input: &Loose) -> Loose {
    fields::normalize_update(input, SCHEMA)
}

impl Entity for Deal {
    const KIND: EntityKind = EntityKind::Deal;
    const TABLE: &'static str = TABLE;
    const FIELDS: &'static [&'static str] = &[
        "title_c",
        "value_c",
        "stage_c",
        "probability_c",
        "expectedCloseDate_c",
        "contactId_c",
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
            name: self.title.clone(),
            amount: Some(self.value),
            contact_id: self.contact_id,
            deal_id: Some(self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_defaults_stage_to_lead() {
        let input = json!({"title": "Website redesign", "value": "12000"});
        let payload = normalize_create(input.as_object().unwrap());
        assert_eq!(payload["stage_c"], json!("Lead"));
        assert_eq!(payload["value_c"], json!(12000));
    }

    #[test]
    fn zero_value_is_kept() {
        let input = json!({"value_c": 0, "value": 99, "probability": 0});
        let payload = normalize_create(input.as_object().unwrap());
        assert_eq!(payload["value_c"], json!(0));
        assert_eq!(payload["probability_c"], json!(0));
    }

    #[test]
    fn stage_parsing_keeps_unknown_values() {
        assert_eq!(DealStage::parse("Closed Won"), DealStage::ClosedWon);
        assert_eq!(DealStage::parse("negotiation"), DealStage::Negotiation);
        assert_eq!(
            DealStage::parse("On Hold"),
            DealStage::Other("On Hold".to_string())
        );
    }

    #[test]
    fn decodes_lookup_contact_reference() {
        let deal: Deal = serde_json::from_value(json!({
            "Id": 9,
            "title_c": "Renewal",
            "value_c": 5000,
            "stage_c": "Proposal",
            "probability_c": 40,
            "contactId_c": {"Id": 2, "Name": "Ada"},
        }))
        .unwrap();
        assert_eq!(deal.contact_id, Some(2));
        assert_eq!(deal.stage, DealStage::Proposal);
        assert_eq!(deal.weighted_value(), 2000.0);
    }
}
