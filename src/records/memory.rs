use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

use super::{
    DeleteResponse, FetchQuery, FetchResponse, FieldSelector, MutationResponse, Operator,
    RecordClient, RecordResponse, RecordResult, SortType, WhereClause,
};
use crate::core::Loose;
use crate::core::fields::reference_id;
use crate::error::ServiceError;

#[derive(Debug, Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<i64, Loose>,
}

/// In-process record store honouring the same envelope contract as the
/// hosted service: ids are assigned on create, unknown ids answer
/// `success: false`, and `where`/`orderBy`/paging are applied on fetch.
#[derive(Debug, Default)]
pub struct MemoryRecordClient {
    tables: Mutex<HashMap<String, Table>>,
    failures: Mutex<HashMap<String, String>>,
}

impl MemoryRecordClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call on `table` answer `success: false` with `message`.
    pub async fn fail_table(&self, table: &str, message: &str) {
        self.failures
            .lock()
            .await
            .insert(table.to_string(), message.to_string());
    }

    pub async fn heal_table(&self, table: &str) {
        self.failures.lock().await.remove(table);
    }

    /// Snapshot of every row in `table`, ordered by id.
    pub async fn rows(&self, table: &str) -> Vec<Loose> {
        self.tables
            .lock()
            .await
            .get(table)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .await
            .get(table)
            .map_or(0, |t| t.rows.len())
    }

    async fn failure(&self, table: &str) -> Option<String> {
        self.failures.lock().await.get(table).cloned()
    }
}

fn project(row: &Loose, fields: &[FieldSelector]) -> Value {
    if fields.is_empty() {
        return Value::Object(row.clone());
    }
    let mut out = Loose::new();
    if let Some(id) = row.get("Id") {
        out.insert("Id".to_string(), id.clone());
    }
    for field in fields {
        if let Some(value) = row.get(field.name()) {
            out.insert(field.name().to_string(), value.clone());
        }
    }
    Value::Object(out)
}

fn values_equal(stored: Option<&Value>, wanted: &Value) -> bool {
    let Some(stored) = stored else {
        return wanted.is_null();
    };
    match (stored, wanted) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Object(_), _) => reference_id(stored) == reference_id(wanted),
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            reference_id(stored).is_some() && reference_id(stored) == reference_id(wanted)
        }
        _ => stored == wanted,
    }
}

fn matches_clause(row: &Loose, clause: &WhereClause) -> bool {
    match clause.operator {
        Operator::EqualTo => clause
            .values
            .iter()
            .any(|wanted| values_equal(row.get(&clause.field_name), wanted)),
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait]
impl RecordClient for MemoryRecordClient {
    async fn fetch_records(
        &self,
        table: &str,
        query: &FetchQuery,
    ) -> Result<FetchResponse, ServiceError> {
        if let Some(message) = self.failure(table).await {
            return Ok(FetchResponse {
                success: false,
                data: None,
                message: Some(message),
            });
        }

        let tables = self.tables.lock().await;
        let mut rows: Vec<&Loose> = tables
            .get(table)
            .map(|t| t.rows.values().collect())
            .unwrap_or_default();

        rows.retain(|row| {
            query
                .where_clauses
                .iter()
                .all(|clause| matches_clause(row, clause))
        });

        // Stable sorts applied last-key-first give a lexicographic order.
        for order in query.order_by.iter().rev() {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.field_name), b.get(&order.field_name));
                match order.sorttype {
                    SortType::Asc => ord,
                    SortType::Desc => ord.reverse(),
                }
            });
        }

        let data = rows
            .into_iter()
            .skip(query.paging_info.offset as usize)
            .take(query.paging_info.limit as usize)
            .map(|row| project(row, &query.fields))
            .collect();

        Ok(FetchResponse {
            success: true,
            data: Some(data),
            message: None,
        })
    }

    async fn get_record_by_id(
        &self,
        table: &str,
        id: i64,
        fields: &[FieldSelector],
    ) -> Result<RecordResponse, ServiceError> {
        if let Some(message) = self.failure(table).await {
            return Ok(RecordResponse {
                success: false,
                data: None,
                message: Some(message),
            });
        }

        let tables = self.tables.lock().await;
        match tables.get(table).and_then(|t| t.rows.get(&id)) {
            Some(row) => Ok(RecordResponse {
                success: true,
                data: Some(project(row, fields)),
                message: None,
            }),
            None => Ok(RecordResponse {
                success: false,
                data: None,
                message: Some(format!("Record with Id {} not found", id)),
            }),
        }
    }

    async fn create_record(
        &self,
        table: &str,
        records: Vec<Loose>,
    ) -> Result<MutationResponse, ServiceError> {
        if let Some(message) = self.failure(table).await {
            return Ok(MutationResponse {
                success: false,
                results: Vec::new(),
                message: Some(message),
            });
        }

        let mut tables = self.tables.lock().await;
        let entry = tables.entry(table.to_string()).or_default();
        let mut results = Vec::with_capacity(records.len());

        for mut record in records {
            entry.last_id += 1;
            let id = entry.last_id;
            record.insert("Id".to_string(), Value::from(id));
            entry.rows.insert(id, record.clone());
            results.push(RecordResult {
                success: true,
                data: Some(Value::Object(record)),
                message: None,
            });
        }

        Ok(MutationResponse {
            success: true,
            results,
            message: None,
        })
    }

    async fn update_record(
        &self,
        table: &str,
        records: Vec<Loose>,
    ) -> Result<MutationResponse, ServiceError> {
        if let Some(message) = self.failure(table).await {
            return Ok(MutationResponse {
                success: false,
                results: Vec::new(),
                message: Some(message),
            });
        }

        let mut tables = self.tables.lock().await;
        let entry = tables.entry(table.to_string()).or_default();
        let mut results = Vec::with_capacity(records.len());

        for record in records {
            let id = record.get("Id").and_then(reference_id);
            let Some(row) = id.and_then(|id| entry.rows.get_mut(&id)) else {
                results.push(RecordResult {
                    success: false,
                    data: None,
                    message: Some(format!(
                        "Record with Id {} not found",
                        id.map_or_else(|| "?".to_string(), |id| id.to_string())
                    )),
                });
                continue;
            };
            for (key, value) in record {
                if key != "Id" {
                    row.insert(key, value);
                }
            }
            results.push(RecordResult {
                success: true,
                data: Some(Value::Object(row.clone())),
                message: None,
            });
        }

        Ok(MutationResponse {
            success: true,
            results,
            message: None,
        })
    }

    async fn delete_record(
        &self,
        table: &str,
        ids: Vec<i64>,
    ) -> Result<DeleteResponse, ServiceError> {
        if let Some(message) = self.failure(table).await {
            return Ok(DeleteResponse {
                success: false,
                message: Some(message),
            });
        }

        let mut tables = self.tables.lock().await;
        let entry = tables.entry(table.to_string()).or_default();

        if let Some(missing) = ids.iter().find(|id| !entry.rows.contains_key(id)) {
            return Ok(DeleteResponse {
                success: false,
                message: Some(format!("Record with Id {} does not exist", missing)),
            });
        }
        for id in &ids {
            entry.rows.remove(id);
        }

        Ok(DeleteResponse {
            success: true,
            message: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{OrderBy, PagingInfo};
    use serde_json::json;

    fn record(value: Value) -> Loose {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn create_assigns_increasing_ids() {
        let store = MemoryRecordClient::new();
        let resp = store
            .create_record("task_c", vec![record(json!({"title_c": "a"})), record(json!({"title_c": "b"}))])
            .await
            .unwrap();
        assert!(resp.success);
        let ids: Vec<i64> = resp
            .results
            .iter()
            .map(|r| r.data.as_ref().unwrap()["Id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(store.count("task_c").await, 2);
    }

    #[tokio::test]
    async fn fetch_filters_orders_and_pages() {
        let store = MemoryRecordClient::new();
        store
            .create_record(
                "activity_c",
                vec![
                    record(json!({"timestamp_c": "2026-01-01T00:00:00Z", "contactId_c": 1})),
                    record(json!({"timestamp_c": "2026-03-01T00:00:00Z", "contactId_c": 1})),
                    record(json!({"timestamp_c": "2026-02-01T00:00:00Z", "contactId_c": 2})),
                ],
            )
            .await
            .unwrap();

        let query = FetchQuery {
            fields: FieldSelector::list(&["timestamp_c"]),
            where_clauses: vec![WhereClause::equal_to("contactId_c", 1)],
            order_by: vec![OrderBy {
                field_name: "timestamp_c".to_string(),
                sorttype: SortType::Desc,
            }],
            paging_info: PagingInfo::default(),
        };
        let resp = store.fetch_records("activity_c", &query).await.unwrap();
        let data = resp.data.unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["Id"], json!(2));
        assert_eq!(data[1]["Id"], json!(1));
        // Projection keeps only requested fields plus Id.
        assert!(data[0].get("contactId_c").is_none());

        let paged = FetchQuery {
            paging_info: PagingInfo { limit: 1, offset: 1 },
            ..FetchQuery::default()
        };
        let resp = store.fetch_records("activity_c", &paged).await.unwrap();
        assert_eq!(resp.data.unwrap()[0]["Id"], json!(2));
    }

    #[tokio::test]
    async fn unknown_ids_fail_in_the_envelope() {
        let store = MemoryRecordClient::new();
        let resp = store.get_record_by_id("deal_c", 5, &[]).await.unwrap();
        assert!(!resp.success);

        let resp = store.delete_record("deal_c", vec![5]).await.unwrap();
        assert!(!resp.success);
        assert_eq!(resp.message.as_deref(), Some("Record with Id 5 does not exist"));

        let resp = store
            .update_record("deal_c", vec![record(json!({"Id": 5, "title_c": "x"}))])
            .await
            .unwrap();
        assert!(resp.success);
        assert!(!resp.results[0].success);
    }

    #[tokio::test]
    async fn injected_failures_answer_success_false() {
        let store = MemoryRecordClient::new();
        store.fail_table("activity_c", "quota exceeded").await;
        let resp = store
            .create_record("activity_c", vec![Loose::new()])
            .await
            .unwrap();
        assert!(!resp.success);
        assert_eq!(resp.message.as_deref(), Some("quota exceeded"));

        store.heal_table("activity_c").await;
        let resp = store
            .create_record("activity_c", vec![Loose::new()])
            .await
            .unwrap();
        assert!(resp.success);
    }
}
