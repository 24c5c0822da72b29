//! Entity services: one table each, wrapping the record client.
//!
//! Services normalize loose input to canonical payloads, unwrap the store's
//! envelopes, log failures and hand them back to the caller.

pub mod hooks;

use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::core::{Activity, Contact, Deal, Entity, Loose, Task};
use crate::error::ServiceError;
use crate::records::{
    FetchQuery, FieldSelector, OrderBy, PagingInfo, RecordClient, SortType, WhereClause,
    DEFAULT_PAGE_LIMIT,
};

pub use hooks::{
    ActivityRecorder, Mutation, MutationAction, MutationObserver, Tracked, TrackedService,
};

pub type ContactService = EntityService<Contact>;
pub type DealService = EntityService<Deal>;
pub type TaskService = EntityService<Task>;
pub type ActivityService = EntityService<Activity>;

/// CRUD over the table behind `E`.
pub struct EntityService<E> {
    client: Arc<dyn RecordClient>,
    page_limit: u32,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for EntityService<E> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            page_limit: self.page_limit,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> EntityService<E> {
    pub fn new(client: Arc<dyn RecordClient>) -> Self {
        Self {
            client,
            page_limit: DEFAULT_PAGE_LIMIT,
            _entity: PhantomData,
        }
    }

    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = limit;
        self
    }

    fn fields() -> Vec<FieldSelector> {
        FieldSelector::list(E::FIELDS)
    }

    /// Log a failed call the way every service reports errors, then pass it on.
    fn logged<T>(op: &str, result: Result<T, ServiceError>) -> Result<T, ServiceError> {
        if let Err(e) = &result {
            log::error!("{}Service.{} error: {}", E::KIND.label(), op, e);
        }
        result
    }

    fn decode(value: Value) -> Result<E, ServiceError> {
        serde_json::from_value(value).map_err(|e| {
            ServiceError::Decode(format!("{} record: {}", E::KIND.singular(), e))
        })
    }

    fn query(&self, where_clauses: Vec<WhereClause>) -> FetchQuery {
        FetchQuery {
            fields: Self::fields(),
            where_clauses,
            order_by: E::NEWEST_FIRST_BY
                .map(|field| OrderBy {
                    field_name: field.to_string(),
                    sorttype: SortType::Desc,
                })
                .into_iter()
                .collect(),
            paging_info: PagingInfo {
                limit: self.page_limit,
                offset: 0,
            },
        }
    }

    async fn fetch(&self, where_clauses: Vec<WhereClause>) -> Result<Vec<E>, ServiceError> {
        let resp = self
            .client
            .fetch_records(E::TABLE, &self.query(where_clauses))
            .await?;

        if !resp.success {
            return Err(ServiceError::Server(resp.message.unwrap_or_else(|| {
                format!("Failed to fetch {}", E::KIND.plural())
            })));
        }

        resp.data
            .unwrap_or_default()
            .into_iter()
            .map(Self::decode)
            .collect()
    }

    pub(crate) async fn fetch_by_reference(
        &self,
        op: &str,
        field: &str,
        id: i64,
    ) -> Result<Vec<E>, ServiceError> {
        Self::logged(op, self.fetch(vec![WhereClause::equal_to(field, id)]).await)
    }

    pub async fn get_all(&self) -> Result<Vec<E>, ServiceError> {
        Self::logged("getAll", self.fetch(Vec::new()).await)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<E, ServiceError> {
        let result: Result<_, ServiceError> = async {
            let resp = self
                .client
                .get_record_by_id(E::TABLE, id, &Self::fields())
                .await?;
            match resp.data {
                Some(data) if resp.success && !data.is_null() => Self::decode(data),
                _ => Err(ServiceError::NotFound { kind: E::KIND, id }),
            }
        }
        .await;
        Self::logged("getById", result)
    }

    pub async fn create(&self, input: &Loose) -> Result<E, ServiceError> {
        let payload = E::normalize_create(input);
        let result: Result<_, ServiceError> = async {
            let resp = self.client.create_record(E::TABLE, vec![payload]).await?;
            let failed = || format!("Failed to create {}", E::KIND.singular());

            if !resp.success {
                return Err(ServiceError::Server(resp.message.unwrap_or_else(failed)));
            }
            match resp.results.into_iter().next() {
                Some(first) if first.success => {
                    Self::decode(first.data.unwrap_or(Value::Null))
                }
                first => Err(ServiceError::Server(
                    first.and_then(|r| r.message).unwrap_or_else(failed),
                )),
            }
        }
        .await;
        Self::logged("create", result)
    }

    /// Send only the supplied fields; unspecified fields keep their stored value.
    pub async fn update(&self, id: i64, input: &Loose) -> Result<E, ServiceError> {
        let mut payload = Loose::new();
        payload.insert("Id".to_string(), Value::from(id));
        payload.extend(E::normalize_update(input));

        let result: Result<_, ServiceError> = async {
            let resp = self.client.update_record(E::TABLE, vec![payload]).await?;
            let failed = || format!("Failed to update {}", E::KIND.singular());

            if !resp.success {
                return Err(ServiceError::Server(resp.message.unwrap_or_else(failed)));
            }
            match resp.results.into_iter().next() {
                Some(first) if first.success => {
                    Self::decode(first.data.unwrap_or(Value::Null))
                }
                first => Err(ServiceError::Server(
                    first.and_then(|r| r.message).unwrap_or_else(failed),
                )),
            }
        }
        .await;
        Self::logged("update", result)
    }

    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        let result: Result<_, ServiceError> = async {
            let resp = self.client.delete_record(E::TABLE, vec![id]).await?;
            if !resp.success {
                return Err(ServiceError::Server(resp.message.unwrap_or_else(|| {
                    format!("Failed to delete {}", E::KIND.singular())
                })));
            }
            Ok(())
        }
        .await;
        Self::logged("delete", result)
    }
}

impl EntityService<Task> {
    pub async fn get_by_contact_id(&self, contact_id: i64) -> Result<Vec<Task>, ServiceError> {
        self.fetch_by_reference("getByContactId", "contactId_c", contact_id)
            .await
    }
}

impl EntityService<Deal> {
    pub async fn get_by_contact_id(&self, contact_id: i64) -> Result<Vec<Deal>, ServiceError> {
        self.fetch_by_reference("getByContactId", "contactId_c", contact_id)
            .await
    }
}

impl EntityService<Activity> {
    pub async fn get_by_contact_id(&self, contact_id: i64) -> Result<Vec<Activity>, ServiceError> {
        self.fetch_by_reference("getByContactId", "contactId_c", contact_id)
            .await
    }

    pub async fn get_by_deal_id(&self, deal_id: i64) -> Result<Vec<Activity>, ServiceError> {
        self.fetch_by_reference("getByDealId", "dealId_c", deal_id)
            .await
    }
}

/// All services over one record client, with activity recording wired into
/// every contact, deal and task mutation.
#[derive(Clone)]
pub struct Crm {
    pub contacts: TrackedService<Contact>,
    pub deals: TrackedService<Deal>,
    pub tasks: TrackedService<Task>,
    pub activities: ActivityService,
}

impl Crm {
    pub fn new(client: Arc<dyn RecordClient>, page_limit: u32) -> Self {
        let activities = ActivityService::new(Arc::clone(&client)).with_page_limit(page_limit);
        let recorder: Arc<dyn MutationObserver> =
            Arc::new(ActivityRecorder::new(activities.clone()));

        Self {
            contacts: TrackedService::new(
                ContactService::new(Arc::clone(&client)).with_page_limit(page_limit),
            )
            .observe(Arc::clone(&recorder)),
            deals: TrackedService::new(
                DealService::new(Arc::clone(&client)).with_page_limit(page_limit),
            )
            .observe(Arc::clone(&recorder)),
            tasks: TrackedService::new(TaskService::new(client).with_page_limit(page_limit))
                .observe(recorder),
            activities,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EntityKind;
    use crate::records::memory::MemoryRecordClient;
    use serde_json::json;

    fn loose(value: Value) -> Loose {
        value.as_object().cloned().unwrap()
    }

    fn setup() -> (Arc<MemoryRecordClient>, ContactService) {
        let store = Arc::new(MemoryRecordClient::new());
        let service = ContactService::new(store.clone());
        (store, service)
    }

    #[tokio::test]
    async fn create_then_get_returns_normalized_fields() {
        let (store, contacts) = setup();
        let created = contacts
            .create(&loose(json!({
                "name": "Ada Lovelace",
                "company_c": "Engines Ltd",
                "tags": ["vip"],
            })))
            .await
            .unwrap();

        let fetched = contacts.get_by_id(created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.name, "Ada Lovelace");
        assert_eq!(fetched.tags, vec!["vip"]);

        let rows = store.rows("contact_c").await;
        assert_eq!(rows[0]["name_c"], json!("Ada Lovelace"));
        assert!(rows[0].get("name").is_none());
    }

    #[tokio::test]
    async fn legacy_and_canonical_names_store_the_same_record() {
        let (store, contacts) = setup();
        contacts
            .create(&loose(json!({"name": "Grace", "email": "g@navy.mil"})))
            .await
            .unwrap();
        contacts
            .create(&loose(json!({"name_c": "Grace", "email_c": "g@navy.mil"})))
            .await
            .unwrap();

        let mut rows = store.rows("contact_c").await;
        for row in &mut rows {
            row.remove("Id");
        }
        assert_eq!(rows[0], rows[1]);

        contacts.update(1, &loose(json!({"company": "Navy"}))).await.unwrap();
        contacts.update(2, &loose(json!({"company_c": "Navy"}))).await.unwrap();
        let mut rows = store.rows("contact_c").await;
        for row in &mut rows {
            row.remove("Id");
        }
        assert_eq!(rows[0], rows[1]);
    }

    #[tokio::test]
    async fn update_keeps_unsupplied_fields() {
        let (_store, contacts) = setup();
        let created = contacts
            .create(&loose(json!({"name": "Ada", "phone": "555"})))
            .await
            .unwrap();
        let updated = contacts
            .update(created.id, &loose(json!({"phone_c": "556"})))
            .await
            .unwrap();
        assert_eq!(updated.name, "Ada");
        assert_eq!(updated.phone, "556");
    }

    #[tokio::test]
    async fn missing_records_surface_errors() {
        let (_store, contacts) = setup();
        assert_eq!(
            contacts.get_by_id(41).await,
            Err(ServiceError::NotFound {
                kind: EntityKind::Contact,
                id: 41
            })
        );
        assert_eq!(
            contacts.delete(41).await,
            Err(ServiceError::Server("Record with Id 41 does not exist".to_string()))
        );
        assert!(matches!(
            contacts.update(41, &loose(json!({"name": "x"}))).await,
            Err(ServiceError::Server(_))
        ));
    }

    #[tokio::test]
    async fn server_failures_carry_the_store_message() {
        let (store, contacts) = setup();
        store.fail_table("contact_c", "Invalid project").await;
        assert_eq!(
            contacts.get_all().await,
            Err(ServiceError::Server("Invalid project".to_string()))
        );
        assert_eq!(
            contacts.create(&Loose::new()).await,
            Err(ServiceError::Server("Invalid project".to_string()))
        );
    }

    #[tokio::test]
    async fn reference_lookups_and_activity_ordering() {
        let store = Arc::new(MemoryRecordClient::new());
        let tasks = TaskService::new(store.clone());
        tasks
            .create(&loose(json!({"title": "a", "contactId": 1})))
            .await
            .unwrap();
        tasks
            .create(&loose(json!({"title": "b", "contactId": "2"})))
            .await
            .unwrap();
        let for_two = tasks.get_by_contact_id(2).await.unwrap();
        assert_eq!(for_two.len(), 1);
        assert_eq!(for_two[0].title, "b");

        let activities = ActivityService::new(store.clone());
        for ts in ["2026-01-02T00:00:00Z", "2026-01-03T00:00:00Z", "2026-01-01T00:00:00Z"] {
            activities
                .create(&loose(json!({"timestamp": ts, "type": "note", "dealId": 8})))
                .await
                .unwrap();
        }
        let all = activities.get_all().await.unwrap();
        let order: Vec<&str> = all.iter().map(|a| a.timestamp.as_str()).collect();
        assert_eq!(
            order,
            vec!["2026-01-03T00:00:00Z", "2026-01-02T00:00:00Z", "2026-01-01T00:00:00Z"]
        );
        assert_eq!(activities.get_by_deal_id(8).await.unwrap().len(), 3);
        assert!(activities.get_by_contact_id(8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deals_for_contact_skip_unlinked_deals() {
        let store = Arc::new(MemoryRecordClient::new());
        let deals = DealService::new(store.clone());
        for deal in [
            json!({"title": "Renewal", "contactId_c": 1}),
            json!({"title": "Upsell", "contactId": "2"}),
            json!({"title": "Walk-in"}),
            json!({"title": "Expansion", "contactId_c": {"Id": 1, "Name": "Ada"}}),
        ] {
            deals.create(&loose(deal)).await.unwrap();
        }

        let for_one = deals.get_by_contact_id(1).await.unwrap();
        let titles: Vec<&str> = for_one.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["Renewal", "Expansion"]);
        assert!(for_one.iter().all(|d| d.contact_id == Some(1)));
        assert!(deals.get_by_contact_id(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn page_limit_is_sent_with_fetches() {
        let store = Arc::new(MemoryRecordClient::new());
        let deals = DealService::new(store.clone()).with_page_limit(1);
        deals.create(&loose(json!({"title": "one"}))).await.unwrap();
        deals.create(&loose(json!({"title": "two"}))).await.unwrap();
        let fetched = deals.get_all().await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].stage, crate::core::DealStage::Lead);
    }
}
