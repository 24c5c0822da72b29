use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{ActivityService, EntityService};
use crate::core::{ActivityType, Entity, EntityKind, Loose, Subject, Task};
use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationAction {
    Created,
    Updated,
    Deleted,
    Toggled { completed: bool },
}

/// A mutation that the store has already accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub kind: EntityKind,
    pub action: MutationAction,
    pub record_id: i64,
    pub subject: Subject,
}

impl Mutation {
    pub fn of<E: Entity>(action: MutationAction, record: &E) -> Self {
        Self {
            kind: E::KIND,
            action,
            record_id: record.id(),
            subject: record.subject(),
        }
    }
}

/// Runs after every successful mutation of a tracked entity.
#[async_trait]
pub trait MutationObserver: Send + Sync {
    async fn observe(&self, mutation: &Mutation) -> Result<(), ServiceError>;
}

/// JS-style number text: integral values print without a fraction.
fn format_amount(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// Human-readable activity line for `mutation`.
pub fn describe(mutation: &Mutation) -> String {
    let name = &mutation.subject.name;
    let priced = |text: String| match mutation.subject.amount {
        Some(amount) => format!("{} - ${}", text, format_amount(amount)),
        None => text,
    };

    match (mutation.kind, mutation.action) {
        (EntityKind::Contact, MutationAction::Created) => format!("New contact added: {}", name),
        (EntityKind::Deal, MutationAction::Created) => {
            priced(format!("New deal created: {}", name))
        }
        (kind, MutationAction::Created) => {
            format!("New {} created: {}", kind.singular(), name)
        }
        (kind, MutationAction::Updated) => priced(format!("{} updated: {}", kind.label(), name)),
        (kind, MutationAction::Deleted) => format!("{} deleted: {}", kind.label(), name),
        (kind, MutationAction::Toggled { completed: true }) => {
            format!("{} completed: {}", kind.label(), name)
        }
        (kind, MutationAction::Toggled { completed: false }) => {
            format!("{} reopened: {}", kind.label(), name)
        }
    }
}

/// Writes one activity record per mutation.
pub struct ActivityRecorder {
    activities: ActivityService,
}

impl ActivityRecorder {
    pub fn new(activities: ActivityService) -> Self {
        Self { activities }
    }

    fn entry(mutation: &Mutation) -> Loose {
        let mut entry = Loose::new();
        entry.insert("description_c".to_string(), json!(describe(mutation)));
        entry.insert(
            "timestamp_c".to_string(),
            json!(chrono::Utc::now().to_rfc3339()),
        );
        entry.insert(
            "type_c".to_string(),
            json!(ActivityType::for_kind(mutation.kind).as_str()),
        );
        if let Some(contact_id) = mutation.subject.contact_id {
            entry.insert("contactId_c".to_string(), Value::from(contact_id));
        }
        if let Some(deal_id) = mutation.subject.deal_id {
            entry.insert("dealId_c".to_string(), Value::from(deal_id));
        }
        entry
    }
}

#[async_trait]
impl MutationObserver for ActivityRecorder {
    async fn observe(&self, mutation: &Mutation) -> Result<(), ServiceError> {
        self.activities
            .create(&Self::entry(mutation))
            .await
            .map(|activity| {
                log::debug!("Recorded activity {}: {}", activity.id, activity.description);
            })
    }
}

/// Result of a tracked mutation. The primary change has been applied even
/// when `follow_up_errors` is non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Tracked<T> {
    pub value: T,
    pub follow_up_errors: Vec<ServiceError>,
}

impl<T> Tracked<T> {
    pub fn is_clean(&self) -> bool {
        self.follow_up_errors.is_empty()
    }
}

/// An [`EntityService`] whose mutations notify a list of observers.
pub struct TrackedService<E> {
    service: EntityService<E>,
    observers: Vec<Arc<dyn MutationObserver>>,
}

impl<E> Clone for TrackedService<E> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            observers: self.observers.clone(),
        }
    }
}

impl<E: Entity> TrackedService<E> {
    pub fn new(service: EntityService<E>) -> Self {
        Self {
            service,
            observers: Vec::new(),
        }
    }

    pub fn observe(mut self, observer: Arc<dyn MutationObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Untracked access for reads.
    pub fn service(&self) -> &EntityService<E> {
        &self.service
    }

    async fn notify(&self, mutation: Mutation) -> Vec<ServiceError> {
        let mut errors = Vec::new();
        for observer in &self.observers {
            if let Err(e) = observer.observe(&mutation).await {
                log::warn!(
                    "{} {} {} applied but follow-up failed: {}",
                    mutation.kind,
                    mutation.record_id,
                    match mutation.action {
                        MutationAction::Created => "create",
                        MutationAction::Updated => "update",
                        MutationAction::Deleted => "delete",
                        MutationAction::Toggled { .. } => "toggle",
                    },
                    e
                );
                errors.push(e);
            }
        }
        errors
    }

    async fn tracked(&self, action: MutationAction, record: E) -> Tracked<E> {
        let follow_up_errors = self.notify(Mutation::of(action, &record)).await;
        Tracked {
            value: record,
            follow_up_errors,
        }
    }

    pub async fn get_all(&self) -> Result<Vec<E>, ServiceError> {
        self.service.get_all().await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<E, ServiceError> {
        self.service.get_by_id(id).await
    }

    pub async fn create(&self, input: &Loose) -> Result<Tracked<E>, ServiceError> {
        let record = self.service.create(input).await?;
        Ok(self.tracked(MutationAction::Created, record).await)
    }

    pub async fn update(&self, id: i64, input: &Loose) -> Result<Tracked<E>, ServiceError> {
        let record = self.service.update(id, input).await?;
        Ok(self.tracked(MutationAction::Updated, record).await)
    }

    /// Delete `record`. The caller passes the record so the activity can
    /// name what was removed.
    pub async fn delete(&self, record: &E) -> Result<Tracked<()>, ServiceError> {
        self.service.delete(record.id()).await?;
        let follow_up_errors = self
            .notify(Mutation::of(MutationAction::Deleted, record))
            .await;
        Ok(Tracked {
            value: (),
            follow_up_errors,
        })
    }
}

impl TrackedService<Task> {
    /// Flip `completed_c` on `task` and record whether it was completed or
    /// reopened.
    pub async fn toggle_complete(&self, task: &Task) -> Result<Tracked<Task>, ServiceError> {
        let mut input = Loose::new();
        input.insert("completed_c".to_string(), Value::Bool(!task.completed));
        let record = self.service.update(task.id, &input).await?;
        let completed = record.completed;
        Ok(self
            .tracked(MutationAction::Toggled { completed }, record)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Activity, Contact, Deal};
    use crate::records::memory::MemoryRecordClient;
    use crate::services::Crm;

    fn loose(value: Value) -> Loose {
        value.as_object().cloned().unwrap()
    }

    fn subject(name: &str, amount: Option<f64>) -> Subject {
        Subject {
            name: name.to_string(),
            amount,
            contact_id: None,
            deal_id: None,
        }
    }

    fn mutation(kind: EntityKind, action: MutationAction, subject: Subject) -> Mutation {
        Mutation {
            kind,
            action,
            record_id: 1,
            subject,
        }
    }

    async fn activities(store: &MemoryRecordClient) -> Vec<Activity> {
        store
            .rows("activity_c")
            .await
            .into_iter()
            .map(|row| serde_json::from_value(Value::Object(row)).unwrap())
            .collect()
    }

    #[test]
    fn descriptions() {
        let ada = subject("Ada", None);
        assert_eq!(
            describe(&mutation(EntityKind::Contact, MutationAction::Created, ada.clone())),
            "New contact added: Ada"
        );
        assert_eq!(
            describe(&mutation(EntityKind::Contact, MutationAction::Updated, ada.clone())),
            "Contact updated: Ada"
        );
        assert_eq!(
            describe(&mutation(EntityKind::Contact, MutationAction::Deleted, ada)),
            "Contact deleted: Ada"
        );

        let deal = subject("Renewal", Some(5000.0));
        assert_eq!(
            describe(&mutation(EntityKind::Deal, MutationAction::Created, deal.clone())),
            "New deal created: Renewal - $5000"
        );
        assert_eq!(
            describe(&mutation(
                EntityKind::Deal,
                MutationAction::Updated,
                subject("Renewal", Some(99.5))
            )),
            "Deal updated: Renewal - $99.5"
        );
        assert_eq!(
            describe(&mutation(EntityKind::Deal, MutationAction::Deleted, deal)),
            "Deal deleted: Renewal"
        );

        let task = subject("Call back", None);
        assert_eq!(
            describe(&mutation(EntityKind::Task, MutationAction::Created, task.clone())),
            "New task created: Call back"
        );
        assert_eq!(
            describe(&mutation(
                EntityKind::Task,
                MutationAction::Toggled { completed: true },
                task.clone()
            )),
            "Task completed: Call back"
        );
        assert_eq!(
            describe(&mutation(
                EntityKind::Task,
                MutationAction::Toggled { completed: false },
                task
            )),
            "Task reopened: Call back"
        );
    }

    #[tokio::test]
    async fn each_mutation_writes_one_matching_activity() {
        let store = Arc::new(MemoryRecordClient::new());
        let crm = Crm::new(store.clone(), 1000);

        let contact: Contact = crm
            .contacts
            .create(&loose(json!({"name": "Ada"})))
            .await
            .unwrap()
            .value;
        assert_eq!(store.count("activity_c").await, 1);

        let deal: Deal = crm
            .deals
            .create(&loose(json!({"title": "Renewal", "value": 5000, "contactId": contact.id})))
            .await
            .unwrap()
            .value;
        let task = crm
            .tasks
            .create(&loose(json!({"title": "Call", "contactId": contact.id})))
            .await
            .unwrap()
            .value;
        assert!(!task.completed);
        assert_eq!(store.count("activity_c").await, 3);

        let toggled = crm.tasks.toggle_complete(&task).await.unwrap();
        assert!(toggled.is_clean());
        assert!(toggled.value.completed);
        crm.deals
            .update(deal.id, &loose(json!({"stage": "Qualified"})))
            .await
            .unwrap();
        crm.contacts.delete(&contact).await.unwrap();
        assert_eq!(store.count("activity_c").await, 6);

        let log = activities(&store).await;
        let kinds: Vec<Option<ActivityType>> = log.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                Some(ActivityType::Note),
                Some(ActivityType::Deal),
                Some(ActivityType::Task),
                Some(ActivityType::Task),
                Some(ActivityType::Deal),
                Some(ActivityType::Note),
            ]
        );
        assert_eq!(log[1].description, "New deal created: Renewal - $5000");
        assert_eq!(log[1].deal_id, Some(deal.id));
        assert_eq!(log[1].contact_id, Some(contact.id));
        assert_eq!(log[3].description, "Task completed: Call");
        assert_eq!(log[5].description, "Contact deleted: Ada");
        assert!(chrono::DateTime::parse_from_rfc3339(&log[0].timestamp).is_ok());
    }

    #[tokio::test]
    async fn failed_primary_mutation_records_nothing() {
        let store = Arc::new(MemoryRecordClient::new());
        let crm = Crm::new(store.clone(), 1000);

        assert!(crm.tasks.update(99, &loose(json!({"title": "x"}))).await.is_err());
        let ghost = Contact {
            id: 12,
            name: "Ghost".to_string(),
            company: String::new(),
            email: String::new(),
            phone: String::new(),
            tags: Vec::new(),
            notes: String::new(),
        };
        assert!(matches!(
            crm.contacts.delete(&ghost).await,
            Err(ServiceError::Server(_))
        ));
        assert_eq!(store.count("activity_c").await, 0);
    }

    #[tokio::test]
    async fn failed_activity_write_is_flagged_not_rolled_back() {
        let store = Arc::new(MemoryRecordClient::new());
        let crm = Crm::new(store.clone(), 1000);
        store.fail_table("activity_c", "activity table offline").await;

        let tracked = crm
            .contacts
            .create(&loose(json!({"name": "Ada"})))
            .await
            .unwrap();
        assert!(!tracked.is_clean());
        assert_eq!(
            tracked.follow_up_errors,
            vec![ServiceError::Server("activity table offline".to_string())]
        );
        assert_eq!(store.count("contact_c").await, 1);
        assert_eq!(store.count("activity_c").await, 0);
    }
}
