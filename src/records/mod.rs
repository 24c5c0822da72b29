//! Client side of the remote record store.
//!
//! The store exposes named tables with a fixed field schema and wraps every
//! answer in a `{success, data|results, message}` envelope. [`RecordClient`]
//! is the narrow interface the services consume; [`http::HttpRecordClient`]
//! talks to the real service and [`memory::MemoryRecordClient`] keeps
//! records in-process.

pub mod http;
pub mod keyring;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::Loose;
use crate::error::ServiceError;

pub const DEFAULT_PAGE_LIMIT: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSelector {
    pub field: FieldName,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldName {
    #[serde(rename = "Name")]
    pub name: String,
}

impl FieldSelector {
    pub fn new(name: &str) -> Self {
        Self {
            field: FieldName {
                name: name.to_string(),
            },
        }
    }

    pub fn list(names: &[&str]) -> Vec<Self> {
        names.iter().map(|name| Self::new(name)).collect()
    }

    pub fn name(&self) -> &str {
        &self.field.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    EqualTo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WhereClause {
    pub field_name: String,
    pub operator: Operator,
    pub values: Vec<Value>,
}

impl WhereClause {
    pub fn equal_to(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field_name: field.to_string(),
            operator: Operator::EqualTo,
            values: vec![value.into()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortType {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBy {
    #[serde(rename = "fieldName")]
    pub field_name: String,
    pub sorttype: SortType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PagingInfo {
    pub limit: u32,
    pub offset: u32,
}

impl Default for PagingInfo {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

/// Body of a `fetchRecords` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchQuery {
    pub fields: Vec<FieldSelector>,
    #[serde(rename = "where", skip_serializing_if = "Vec::is_empty")]
    pub where_clauses: Vec<WhereClause>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
    pub paging_info: PagingInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Vec<Value>>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Per-record outcome inside a create/update envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MutationResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub results: Vec<RecordResult>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Generic CRUD over the store's named tables.
///
/// Implementations only report transport-level failures as `Err`; a store
/// that answers `success: false` still yields `Ok` with that envelope.
#[async_trait]
pub trait RecordClient: Send + Sync {
    async fn fetch_records(
        &self,
        table: &str,
        query: &FetchQuery,
    ) -> Result<FetchResponse, ServiceError>;

    async fn get_record_by_id(
        &self,
        table: &str,
        id: i64,
        fields: &[FieldSelector],
    ) -> Result<RecordResponse, ServiceError>;

    async fn create_record(
        &self,
        table: &str,
        records: Vec<Loose>,
    ) -> Result<MutationResponse, ServiceError>;

    async fn update_record(
        &self,
        table: &str,
        records: Vec<Loose>,
    ) -> Result<MutationResponse, ServiceError>;

    async fn delete_record(&self, table: &str, ids: Vec<i64>)
    -> Result<DeleteResponse, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fetch_query_uses_store_field_names() {
        let query = FetchQuery {
            fields: FieldSelector::list(&["title_c"]),
            where_clauses: vec![WhereClause::equal_to("contactId_c", 4)],
            order_by: vec![OrderBy {
                field_name: "timestamp_c".to_string(),
                sorttype: SortType::Desc,
            }],
            paging_info: PagingInfo::default(),
        };
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({
                "fields": [{"field": {"Name": "title_c"}}],
                "where": [{"FieldName": "contactId_c", "Operator": "EqualTo", "Values": [4]}],
                "orderBy": [{"fieldName": "timestamp_c", "sorttype": "DESC"}],
                "pagingInfo": {"limit": 1000, "offset": 0},
            })
        );
    }

    #[test]
    fn envelopes_tolerate_missing_keys() {
        let resp: MutationResponse = serde_json::from_value(json!({"success": true})).unwrap();
        assert!(resp.success);
        assert!(resp.results.is_empty());

        let resp: FetchResponse =
            serde_json::from_value(json!({"success": false, "message": "boom"})).unwrap();
        assert_eq!(resp.message.as_deref(), Some("boom"));
        assert!(resp.data.is_none());
    }
}
