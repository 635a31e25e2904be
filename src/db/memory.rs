use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Connector, Document, DocumentStore, Filter, FindDocumentsOptions, SortOrder, ID_FIELD};
use crate::error::DatabaseError;

/// Connection string prefix accepted by [`MemoryConnector`].
pub const MEMORY_SCHEME: &str = "memory://";

/// In-process document store.
///
/// Filters support field equality (an array field also matches any of its
/// elements) and the `$eq`, `$ne`, `$in`, `$nin` and `$exists` operators.
/// Documents keep insertion order unless sorted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every document in `collection`.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        let collections = self.collections.read().await;
        collections.get(collection).cloned().unwrap_or_default()
    }
}

/// Generates an id shaped like a 12-byte object id: 4 bytes of seconds
/// followed by 8 random bytes, hex encoded.
fn generate_id() -> String {
    id_at(Utc::now().timestamp())
}

/// Builds an id whose leading 8 hex digits are `timestamp`, saturated to
/// the `u32` range.
fn id_at(timestamp: i64) -> String {
    let seconds = u32::try_from(timestamp.max(0)).unwrap_or(u32::MAX);
    let random = Uuid::new_v4().simple().to_string();
    format!("{seconds:08x}{}", &random[..16])
}

fn operators(condition: &Value) -> Option<&Map<String, Value>> {
    match condition {
        Value::Object(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => Some(ops),
        _ => None,
    }
}

fn equals(value: Option<&Value>, expected: &Value) -> bool {
    match value {
        Some(v) => v == expected || v.as_array().is_some_and(|items| items.contains(expected)),
        None => expected.is_null(),
    }
}

fn in_list(value: Option<&Value>, op: &str, arg: &Value) -> Result<bool, DatabaseError> {
    let candidates = arg
        .as_array()
        .ok_or_else(|| DatabaseError::Store(format!("{op} requires an array")))?;
    Ok(candidates.iter().any(|c| equals(value, c)))
}

fn field_matches(value: Option<&Value>, condition: &Value) -> Result<bool, DatabaseError> {
    let Some(ops) = operators(condition) else {
        return Ok(equals(value, condition));
    };
    for (op, arg) in ops {
        let ok = match op.as_str() {
            "$eq" => equals(value, arg),
            "$ne" => !equals(value, arg),
            "$in" => in_list(value, op, arg)?,
            "$nin" => !in_list(value, op, arg)?,
            "$exists" => value.is_some() == arg.as_bool().unwrap_or(true),
            other => {
                return Err(DatabaseError::Store(format!(
                    "unsupported query operator {other}"
                )))
            }
        };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches(doc: &Document, filter: &Filter) -> Result<bool, DatabaseError> {
    for (field, condition) in filter {
        if !field_matches(doc.get(field), condition)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn sort_documents(docs: &mut [Document], sort: &[(String, SortOrder)]) {
    if sort.is_empty() {
        return;
    }
    docs.sort_by(|a, b| {
        sort.iter()
            .map(|(field, order)| {
                let ord = compare_values(a.get(field), b.get(field));
                match order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                }
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    });
}

fn matching_indices(docs: &[Document], filter: &Filter) -> Result<Vec<usize>, DatabaseError> {
    let mut indices = Vec::new();
    for (i, doc) in docs.iter().enumerate() {
        if matches(doc, filter)? {
            indices.push(i);
        }
    }
    Ok(indices)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(&self, collection: &str, mut doc: Document) -> Result<String, DatabaseError> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();

        let id = match doc.get(ID_FIELD).and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => generate_id(),
        };
        let taken = docs
            .iter()
            .any(|d| d.get(ID_FIELD).and_then(Value::as_str) == Some(id.as_str()));
        if taken {
            return Err(DatabaseError::DuplicateId(id));
        }

        doc.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        docs.push(doc);
        Ok(id)
    }

    async fn replace_unique(
        &self,
        collection: &str,
        filter: &Filter,
        mut replacement: Document,
    ) -> Result<usize, DatabaseError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let indices = matching_indices(docs, filter)?;
        if let [index] = *indices.as_slice() {
            if let Some(id) = docs[index].get(ID_FIELD).cloned() {
                replacement.insert(ID_FIELD.to_string(), id);
            }
            docs[index] = replacement;
        }
        Ok(indices.len())
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<usize, DatabaseError> {
        let mut collections = self.collections.write().await;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let mut position = None;
        for (i, doc) in docs.iter().enumerate() {
            if matches(doc, filter)? {
                position = Some(i);
                break;
            }
        }
        Ok(position.map_or(0, |i| {
            docs.remove(i);
            1
        }))
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> Result<Option<Document>, DatabaseError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(None);
        };

        for doc in docs {
            if matches(doc, filter)? {
                return Ok(Some(doc.clone()));
            }
        }
        Ok(None)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindDocumentsOptions,
    ) -> Result<Vec<Document>, DatabaseError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut found: Vec<Document> = matching_indices(docs, filter)?
            .into_iter()
            .map(|i| docs[i].clone())
            .collect();
        drop(collections);

        sort_documents(&mut found, &options.sort);
        Ok(found
            .into_iter()
            .skip(options.skip.unwrap_or(0))
            .take(options.limit.unwrap_or(usize::MAX))
            .collect())
    }
}

/// Connects `memory://` connection strings to a [`MemoryStore`].
///
/// Every connect creates a fresh store unless one was supplied with
/// [`with_store`](MemoryConnector::with_store).
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    store: Option<Arc<MemoryStore>>,
}

impl MemoryConnector {
    /// Creates a connector that opens a new store per connect.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connector that always hands out `store`.
    pub fn with_store(store: Arc<MemoryStore>) -> Self {
        Self { store: Some(store) }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        connection_string: &str,
        database_name: &str,
    ) -> Result<Arc<dyn DocumentStore>, DatabaseError> {
        if !connection_string.starts_with(MEMORY_SCHEME) {
            return Err(DatabaseError::Initialization(format!(
                "unsupported connection string, expected {MEMORY_SCHEME}"
            )));
        }
        tracing::debug!(database = database_name, "opening in-memory document store");
        let store: Arc<dyn DocumentStore> = self.store.clone().unwrap_or_default();
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn generated_ids_are_object_id_shaped() {
        let a = generate_id();
        let b = generate_id();
        assert!(crate::db::is_document_id(&a));
        assert_ne!(a, b);
    }

    #[test]
    fn id_timestamp_saturates_instead_of_wrapping() {
        assert!(id_at(0x6500_0000).starts_with("65000000"));
        assert!(id_at(1 << 40).starts_with("ffffffff"));
        assert!(id_at(-5).starts_with("00000000"));
        assert!(crate::db::is_document_id(&id_at(1 << 40)));
    }

    #[test]
    fn equality_and_operators() {
        let doc = obj(json!({"n": 2, "tags": ["a", "b"], "owner": "u"}));

        assert!(matches(&doc, &obj(json!({"n": 2}))).unwrap());
        assert!(matches(&doc, &obj(json!({"tags": "b"}))).unwrap());
        assert!(matches(&doc, &obj(json!({"n": {"$in": [1, 2]}}))).unwrap());
        assert!(matches(&doc, &obj(json!({"n": {"$ne": 3}, "owner": "u"}))).unwrap());
        assert!(matches(&doc, &obj(json!({"missing": null}))).unwrap());
        assert!(matches(&doc, &obj(json!({"missing": {"$exists": false}}))).unwrap());

        assert!(!matches(&doc, &obj(json!({"n": {"$nin": [2]}}))).unwrap());
        assert!(!matches(&doc, &obj(json!({"n": 2, "owner": "x"}))).unwrap());
    }

    #[test]
    fn nested_objects_compare_by_value() {
        let doc = obj(json!({"meta": {"a": 1}}));
        assert!(matches(&doc, &obj(json!({"meta": {"a": 1}}))).unwrap());
    }

    #[test]
    fn unsupported_operator_is_an_error() {
        let doc = obj(json!({"n": 1}));
        let err = matches(&doc, &obj(json!({"n": {"$regex": "1"}}))).unwrap_err();
        assert!(matches!(err, DatabaseError::Store(_)));

        let err = matches(&doc, &obj(json!({"n": {"$in": 1}}))).unwrap_err();
        assert!(matches!(err, DatabaseError::Store(_)));
    }

    #[test]
    fn sorts_by_multiple_keys() {
        let mut docs = vec![
            obj(json!({"g": "b", "n": 1})),
            obj(json!({"g": "a", "n": 1})),
            obj(json!({"g": "a", "n": 2})),
        ];
        sort_documents(
            &mut docs,
            &[
                ("g".to_string(), SortOrder::Ascending),
                ("n".to_string(), SortOrder::Descending),
            ],
        );
        let order: Vec<_> = docs.iter().map(|d| (d["g"].clone(), d["n"].clone())).collect();
        assert_eq!(
            order,
            vec![
                (json!("a"), json!(2)),
                (json!("a"), json!(1)),
                (json!("b"), json!(1)),
            ]
        );
    }

    #[tokio::test]
    async fn duplicate_id_rejected() {
        let store = MemoryStore::new();
        let id = store.insert_one("c", Map::new()).await.unwrap();

        let err = store
            .insert_one("c", obj(json!({"_id": id.clone()})))
            .await
            .unwrap_err();
        assert_eq!(err, DatabaseError::DuplicateId(id));
    }

    #[tokio::test]
    async fn replace_writes_only_on_single_match() {
        let store = MemoryStore::new();
        store.insert_one("c", obj(json!({"k": 1}))).await.unwrap();
        store.insert_one("c", obj(json!({"k": 1}))).await.unwrap();

        let matched = store
            .replace_unique("c", &obj(json!({"k": 1})), obj(json!({"k": 2})))
            .await
            .unwrap();
        assert_eq!(matched, 2);
        assert!(store.documents("c").await.iter().all(|d| d["k"] == json!(1)));

        let missing = store
            .replace_unique("absent", &Map::new(), Map::new())
            .await
            .unwrap();
        assert_eq!(missing, 0);
    }

    #[tokio::test]
    async fn find_pages_results() {
        let store = MemoryStore::new();
        for n in 0..5 {
            store.insert_one("c", obj(json!({"n": n}))).await.unwrap();
        }

        let options = FindDocumentsOptions::default()
            .sort_by("n", SortOrder::Ascending)
            .skip(1)
            .limit(2);
        let page = store.find("c", &Map::new(), &options).await.unwrap();
        let values: Vec<_> = page.iter().map(|d| d["n"].clone()).collect();
        assert_eq!(values, vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn delete_removes_first_match_only() {
        let store = MemoryStore::new();
        store.insert_one("c", obj(json!({"k": 1}))).await.unwrap();
        store.insert_one("c", obj(json!({"k": 1}))).await.unwrap();

        let deleted = store.delete_one("c", &obj(json!({"k": 1}))).await.unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.documents("c").await.len(), 1);
    }

    #[tokio::test]
    async fn connector_accepts_memory_scheme_only() {
        let connector = MemoryConnector::new();
        assert!(connector.connect("memory://local", "db").await.is_ok());

        let err = connector
            .connect("mongodb://localhost", "db")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DatabaseError::Initialization(_)));
    }
}
