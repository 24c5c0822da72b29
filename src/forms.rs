//! Modal form state for contacts, deals and tasks.
//!
//! Forms hold raw text as typed. `to_input` validates it and produces the
//! canonical payload handed to the services.

use serde_json::{Value, json};

use crate::core::fields::{join_tags, reference_id, split_tags};
use crate::core::{Contact, Deal, DealStage, Loose, Task};
use crate::error::ServiceError;

fn required(value: &str, what: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation(format!("{} is required", what)));
    }
    Ok(trimmed.to_string())
}

/// Parse a contact reference typed as text. Blank means "no contact";
/// trailing garbage after the leading digits is ignored.
pub fn parse_contact_id(text: &str) -> Result<Option<i64>, ServiceError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    reference_id(&Value::from(trimmed))
        .map(Some)
        .ok_or_else(|| ServiceError::Validation(format!("Invalid contact id: {}", trimmed)))
}

fn parse_number(text: &str, what: &str) -> Result<f64, ServiceError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ServiceError::Validation(format!("Invalid {}: {}", what, trimmed)))
}

fn optional_id(id: Option<i64>) -> Value {
    id.map_or(Value::Null, Value::from)
}

fn id_text(id: Option<i64>) -> String {
    id.map(|id| id.to_string()).unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactForm {
    pub name: String,
    pub company: String,
    pub email: String,
    pub phone: String,
    /// Comma-separated.
    pub tags: String,
    pub notes: String,
}

impl ContactForm {
    pub fn from_record(contact: &Contact) -> Self {
        Self {
            name: contact.name.clone(),
            company: contact.company.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            tags: contact.tags.join(", "),
            notes: contact.notes.clone(),
        }
    }

    pub fn to_input(&self) -> Result<Loose, ServiceError> {
        let tags: Vec<String> = split_tags(&self.tags);
        let input = json!({
            "name_c": required(&self.name, "Name")?,
            "company_c": self.company.trim(),
            "email_c": self.email.trim(),
            "phone_c": self.phone.trim(),
            "tags_c": join_tags(&tags),
            "notes_c": self.notes,
        });
        Ok(into_loose(input))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DealForm {
    pub title: String,
    pub value: String,
    pub stage: DealStage,
    pub probability: String,
    pub expected_close_date: String,
    pub contact_id: String,
}

impl Default for DealForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            value: String::new(),
            stage: DealStage::Lead,
            probability: "10".to_string(),
            expected_close_date: String::new(),
            contact_id: String::new(),
        }
    }
}

impl DealForm {
    pub fn from_record(deal: &Deal) -> Self {
        Self {
            title: deal.title.clone(),
            value: deal.value.to_string(),
            stage: deal.stage.clone(),
            probability: deal.probability.to_string(),
            expected_close_date: deal.expected_close_date.clone(),
            contact_id: id_text(deal.contact_id),
        }
    }

    pub fn to_input(&self) -> Result<Loose, ServiceError> {
        let probability = parse_number(&self.probability, "probability")?;
        if !(0.0..=100.0).contains(&probability) {
            return Err(ServiceError::Validation(format!(
                "Probability must be between 0 and 100, got {}",
                probability
            )));
        }
        let input = json!({
            "title_c": required(&self.title, "Title")?,
            "value_c": parse_number(&self.value, "value")?,
            "stage_c": self.stage.as_str(),
            "probability_c": probability,
            "expectedCloseDate_c": self.expected_close_date.trim(),
            "contactId_c": optional_id(parse_contact_id(&self.contact_id)?),
        });
        Ok(into_loose(input))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskForm {
    pub title: String,
    pub due_date: String,
    pub contact_id: String,
    /// Only sent on edit; new tasks always start incomplete.
    pub completed: bool,
}

impl TaskForm {
    pub fn from_record(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            due_date: task.due_date.clone(),
            contact_id: id_text(task.contact_id),
            completed: task.completed,
        }
    }

    pub fn to_create_input(&self) -> Result<Loose, ServiceError> {
        let mut input = self.fields()?;
        input.insert("completed_c".to_string(), Value::Bool(false));
        Ok(input)
    }

    pub fn to_update_input(&self) -> Result<Loose, ServiceError> {
        let mut input = self.fields()?;
        input.insert("completed_c".to_string(), Value::Bool(self.completed));
        Ok(input)
    }

    fn fields(&self) -> Result<Loose, ServiceError> {
        let input = json!({
            "title_c": required(&self.title, "Title")?,
            "dueDate_c": self.due_date.trim(),
            "contactId_c": optional_id(parse_contact_id(&self.contact_id)?),
        });
        Ok(into_loose(input))
    }
}

fn into_loose(value: Value) -> Loose {
    match value {
        Value::Object(map) => map,
        _ => Loose::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_ids_parse_like_typed_text() {
        assert_eq!(parse_contact_id("").unwrap(), None);
        assert_eq!(parse_contact_id(" 12 ").unwrap(), Some(12));
        assert_eq!(parse_contact_id("7abc").unwrap(), Some(7));
        assert!(matches!(
            parse_contact_id("abc"),
            Err(ServiceError::Validation(_))
        ));
    }

    #[test]
    fn contact_form_requires_a_name_and_joins_tags() {
        let form = ContactForm {
            name: "  ".to_string(),
            ..ContactForm::default()
        };
        assert!(matches!(form.to_input(), Err(ServiceError::Validation(_))));

        let form = ContactForm {
            name: "Ada".to_string(),
            tags: "vip, , lead ".to_string(),
            ..ContactForm::default()
        };
        let input = form.to_input().unwrap();
        assert_eq!(input["name_c"], json!("Ada"));
        assert_eq!(input["tags_c"], json!("vip,lead"));
    }

    #[test]
    fn deal_form_parses_numbers_and_contact() {
        let form = DealForm {
            title: "Renewal".to_string(),
            value: "5000".to_string(),
            stage: DealStage::Proposal,
            probability: "60".to_string(),
            expected_close_date: "2026-12-01".to_string(),
            contact_id: "3".to_string(),
        };
        let input = form.to_input().unwrap();
        assert_eq!(input["value_c"], json!(5000.0));
        assert_eq!(input["stage_c"], json!("Proposal"));
        assert_eq!(input["contactId_c"], json!(3));

        let bad = DealForm {
            probability: "140".to_string(),
            ..form.clone()
        };
        assert!(matches!(bad.to_input(), Err(ServiceError::Validation(_))));
        let bad = DealForm {
            value: "lots".to_string(),
            ..form
        };
        assert!(matches!(bad.to_input(), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn task_form_create_always_starts_incomplete() {
        let form = TaskForm {
            title: "Call".to_string(),
            due_date: "2026-10-20".to_string(),
            contact_id: String::new(),
            completed: true,
        };
        assert_eq!(form.to_create_input().unwrap()["completed_c"], json!(false));
        assert_eq!(form.to_update_input().unwrap()["completed_c"], json!(true));
        assert_eq!(form.to_create_input().unwrap()["contactId_c"], Value::Null);
    }
}
