//! In-process table store.
//!
//! Implements the same query semantics as the REST store so the gateway can
//! run without a network backend (local development and tests).

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::store::{DataStore, Filters, QueryOptions, StoreError, StoreResult};

/// Tables of JSON rows held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents of `table`.
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.insert(table.to_string(), rows);
    }

    /// Number of rows currently in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        tables.get(table).map(Vec::len).unwrap_or(0)
    }
}

fn matches(row: &Value, filters: &Filters) -> bool {
    filters.iter().all(|(column, expected)| row.get(column) == Some(expected))
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Null), Some(Value::Null)) => Ordering::Equal,
        (Some(Value::Null), Some(_)) => Ordering::Less,
        (Some(_), Some(Value::Null)) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

fn project(row: &Value, columns: &[String]) -> Value {
    let mut out = Map::new();
    for column in columns {
        if let Some(value) = row.get(column) {
            out.insert(column.clone(), value.clone());
        }
    }
    Value::Object(out)
}

fn rows_of(data: &Value) -> StoreResult<Vec<Value>> {
    match data {
        Value::Object(_) => Ok(vec![data.clone()]),
        Value::Array(rows) if rows.iter().all(Value::is_object) => Ok(rows.clone()),
        _ => Err(StoreError::InvalidRequest(
            "insert payload must be an object or an array of objects".to_string(),
        )),
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn select(&self, table: &str, query: &QueryOptions) -> StoreResult<Value> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        let mut rows: Vec<Value> = tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| matches(r, &query.filters)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending { ord } else { ord.reverse() }
            });
        }

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        let rows = rows.into_iter().skip(offset).take(limit);

        let rows: Vec<Value> = match &query.columns {
            Some(columns) => rows.map(|r| project(&r, columns)).collect(),
            None => rows.collect(),
        };
        Ok(Value::Array(rows))
    }

    async fn insert(&self, table: &str, data: &Value) -> StoreResult<Value> {
        let new_rows = rows_of(data)?;
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables
            .entry(table.to_string())
            .or_default()
            .extend(new_rows.iter().cloned());
        Ok(Value::Array(new_rows))
    }

    async fn update(&self, table: &str, data: &Value, filters: &Filters) -> StoreResult<Value> {
        let changes = data.as_object().ok_or_else(|| {
            StoreError::InvalidRequest("update payload must be an object".to_string())
        })?;

        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let mut updated = Vec::new();
        if let Some(rows) = tables.get_mut(table) {
            for row in rows.iter_mut().filter(|r| matches(r, filters)) {
                if let Some(fields) = row.as_object_mut() {
                    for (k, v) in changes {
                        fields.insert(k.clone(), v.clone());
                    }
                }
                updated.push(row.clone());
            }
        }
        Ok(Value::Array(updated))
    }

    async fn delete(&self, table: &str, filters: &Filters) -> StoreResult<Value> {
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let mut deleted = Vec::new();
        if let Some(rows) = tables.get_mut(table) {
            let (gone, kept): (Vec<Value>, Vec<Value>) =
                rows.drain(..).partition(|r| matches(r, filters));
            *rows = kept;
            deleted = gone;
        }
        Ok(Value::Array(deleted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::filters;
    use serde_json::json;

    fn courses() -> MemoryStore {
        let store = MemoryStore::new();
        store.seed(
            "courses",
            vec![
                json!({"id": 1, "name": "Physics", "college_id": "C1", "credits": 4}),
                json!({"id": 2, "name": "Algebra", "college_id": "C1", "credits": 3}),
                json!({"id": 3, "name": "Biology", "college_id": "C2", "credits": 4}),
            ],
        );
        store
    }

    #[tokio::test]
    async fn test_select_filters_orders_and_projects() {
        let store = courses();
        let query = QueryOptions::new()
            .columns(["name"])
            .filter("college_id", "C1")
            .order_by("name", true);

        let rows = store.select("courses", &query).await.unwrap();
        assert_eq!(rows, json!([{"name": "Algebra"}, {"name": "Physics"}]));
    }

    #[tokio::test]
    async fn test_select_paginates() {
        let store = courses();
        let query = QueryOptions::new().order_by("id", false).offset(1).limit(1);
        let rows = store.select("courses", &query).await.unwrap();
        assert_eq!(rows, json!([{"id": 2, "name": "Algebra", "college_id": "C1", "credits": 3}]));
    }

    #[tokio::test]
    async fn test_update_and_delete_by_filter() {
        let store = courses();
        let updated = store
            .update("courses", &json!({"credits": 5}), &filters([("credits", 4)]))
            .await
            .unwrap();
        assert_eq!(updated.as_array().map(Vec::len), Some(2));

        let deleted = store
            .delete("courses", &filters([("college_id", "C2")]))
            .await
            .unwrap();
        assert_eq!(deleted[0]["credits"], json!(5));
        assert_eq!(store.row_count("courses"), 2);
    }

    #[tokio::test]
    async fn test_insert_rejects_scalars() {
        let store = MemoryStore::new();
        let err = store.insert("courses", &json!("nope")).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidRequest(_)));

        store.insert("courses", &json!([{"id": 9}, {"id": 10}])).await.unwrap();
        assert_eq!(store.row_count("courses"), 2);
    }
}
