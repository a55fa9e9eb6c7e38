//! In-memory mock of the Zenkit list service API, used by integration
//! tests and runnable standalone.
//!
//! Entries are stored the way the real service returns them: open JSON
//! maps whose custom-field keys are element-uuid strings with a semantic
//! suffix (`*_text`, `*_date`, `*_categories_sort`). Field insertion order
//! matters to the client's heuristics, so `serde_json`'s `preserve_order`
//! feature is enabled.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Category color the service convention reserves for "Completed".
pub const COMPLETED_COLOR: &str = "#3ba744";

const API_KEY_HEADER: &str = "zenkit-api-key";

/// One mocked list plus its entries and the generated element field keys.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MockList {
    pub id: i64,
    pub short_id: String,
    pub uuid: Uuid,
    pub name: String,
    pub icon_class_names: Option<String>,
    #[serde(skip)]
    pub title_field: String,
    #[serde(skip)]
    pub notes_field: String,
    #[serde(skip)]
    pub due_field: String,
    #[serde(skip)]
    pub stage_field: String,
    #[serde(skip)]
    pub entries: Vec<Map<String, Value>>,
}

impl MockList {
    fn new(id: i64, short_id: &str, name: &str) -> Self {
        Self {
            id,
            short_id: short_id.to_string(),
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            icon_class_names: None,
            title_field: format!("{}_text", Uuid::new_v4()),
            notes_field: format!("{}_text", Uuid::new_v4()),
            due_field: format!("{}_date", Uuid::new_v4()),
            stage_field: format!("{}_categories_sort", Uuid::new_v4()),
            entries: Vec::new(),
        }
    }

    fn matches(&self, any_id: &str) -> bool {
        self.short_id == any_id
            || self.id.to_string() == any_id
            || self.uuid.to_string() == any_id
    }
}

/// Shared server state: two lists in one workspace, empty until seeded or
/// written through the API.
pub struct MockState {
    pub lists: Vec<MockList>,
    next_entry_id: i64,
}

impl MockState {
    pub fn new() -> Self {
        Self {
            lists: vec![
                MockList::new(1, "inbox-1", "Inbox"),
                MockList::new(2, "errands-2", "Errands"),
            ],
            next_entry_id: 1000,
        }
    }

    fn list(&self, any_id: &str) -> Option<&MockList> {
        self.lists.iter().find(|list| list.matches(any_id))
    }

    fn list_mut(&mut self, any_id: &str) -> Option<&mut MockList> {
        self.lists.iter_mut().find(|list| list.matches(any_id))
    }

    /// Seed a plain entry with just a title.
    pub fn seed_entry(&mut self, list_any_id: &str, title: &str) -> Uuid {
        self.seed_detailed_entry(list_any_id, title, None, None, false)
    }

    /// Seed `count` entries titled `Task {i}`.
    pub fn seed_entries(&mut self, list_any_id: &str, count: usize) {
        for i in 0..count {
            self.seed_entry(list_any_id, &format!("Task {i}"));
        }
    }

    /// Seed an entry exercising every custom field the heuristics look at.
    pub fn seed_detailed_entry(
        &mut self,
        list_any_id: &str,
        title: &str,
        notes: Option<&str>,
        due: Option<&str>,
        completed: bool,
    ) -> Uuid {
        let id = self.next_id();
        let uuid = Uuid::new_v4();
        let list = self
            .list_mut(list_any_id)
            .unwrap_or_else(|| panic!("unknown list {list_any_id}"));
        let mut entry = bare_entry(list, id, uuid);
        entry.insert("displayString".to_string(), json!(title));
        entry.insert(list.title_field.clone(), json!(title));
        if let Some(notes) = notes {
            entry.insert(list.notes_field.clone(), json!(notes));
        }
        if let Some(due) = due {
            entry.insert(list.due_field.clone(), json!(due));
        }
        if completed {
            entry.insert(
                list.stage_field.clone(),
                json!([{
                    "id": id,
                    "uuid": Uuid::new_v4(),
                    "name": "Completed",
                    "colorHex": COMPLETED_COLOR
                }]),
            );
        }
        list.entries.push(entry);
        uuid
    }

    fn next_id(&mut self) -> i64 {
        self.next_entry_id += 1;
        self.next_entry_id
    }
}

impl Default for MockState {
    fn default() -> Self {
        Self::new()
    }
}

/// A bare entry shell, the shape the create endpoint returns before any
/// field is populated. Key order matches the real service: well-known
/// members first, then the custom fields.
fn bare_entry(list: &MockList, id: i64, uuid: Uuid) -> Map<String, Value> {
    let mut entry = Map::new();
    entry.insert("id".to_string(), json!(id));
    entry.insert("uuid".to_string(), json!(uuid));
    entry.insert("displayString".to_string(), Value::Null);
    entry.insert(list.title_field.clone(), Value::Null);
    entry.insert(list.notes_field.clone(), Value::Null);
    entry.insert(list.due_field.clone(), Value::Null);
    entry.insert(list.stage_field.clone(), json!([]));
    entry
}

fn entry_matches(entry: &Map<String, Value>, entry_id: &str) -> bool {
    let by_uuid = entry.get("uuid").and_then(Value::as_str) == Some(entry_id);
    let by_id = entry
        .get("id")
        .and_then(Value::as_i64)
        .is_some_and(|id| id.to_string() == entry_id);
    by_uuid || by_id
}

pub type Db = Arc<RwLock<MockState>>;

pub fn default_db() -> Db {
    Arc::new(RwLock::new(MockState::new()))
}

pub fn app() -> Router {
    app_with(default_db())
}

pub fn app_with(db: Db) -> Router {
    Router::new()
        .route("/auth/currentuser", get(current_user))
        .route("/users/me/workspacesWithLists", get(workspaces_with_lists))
        .route("/lists/{list_id}/entries", post(create_entry))
        .route("/lists/{list_id}/entries/filter/list", post(filter_entries))
        .route(
            "/lists/{list_id}/entries/{entry_id}",
            get(get_entry).put(update_entry),
        )
        .route("/lists/{list_id}/entries/delete/filter", post(delete_entries))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, default_db()).await
}

pub async fn run_with(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(db)).await
}

type ApiError = (StatusCode, Json<Value>);

fn not_found(what: &str) -> ApiError {
    (StatusCode::NOT_FOUND, Json(json!({"error": format!("{what} not found")})))
}

async fn current_user(headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    if !headers.contains_key(API_KEY_HEADER) {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "unauthorized"})),
        ));
    }
    Ok(Json(json!({"id": 1, "username": "mockuser"})))
}

async fn workspaces_with_lists(State(db): State<Db>) -> Json<Value> {
    let state = db.read().await;
    Json(json!([{"id": 1, "name": "Personal", "lists": state.lists}]))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterRequest {
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    skip: usize,
}

fn default_limit() -> usize {
    100
}

async fn filter_entries(
    State(db): State<Db>,
    Path(list_id): Path<String>,
    Json(filter): Json<FilterRequest>,
) -> Result<Json<Value>, ApiError> {
    let state = db.read().await;
    let list = state.list(&list_id).ok_or_else(|| not_found("list"))?;
    let total = list.entries.len();
    let upper = (filter.skip + filter.limit).min(total);
    let page: Vec<&Map<String, Value>> = if filter.skip < total {
        list.entries[filter.skip..upper].iter().collect()
    } else {
        Vec::new()
    };
    Ok(Json(json!({
        "listEntries": page,
        "countData": {"filteredTotal": total, "total": total}
    })))
}

async fn get_entry(
    State(db): State<Db>,
    Path((list_id, entry_id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let state = db.read().await;
    let list = state.list(&list_id).ok_or_else(|| not_found("list"))?;
    list.entries
        .iter()
        .find(|entry| entry_matches(entry, &entry_id))
        .map(|entry| Json(Value::Object(entry.clone())))
        .ok_or_else(|| not_found("entry"))
}

#[derive(Deserialize)]
struct CreateEntry {
    uuid: Uuid,
}

async fn create_entry(
    State(db): State<Db>,
    Path(list_id): Path<String>,
    Json(input): Json<CreateEntry>,
) -> Result<Json<Value>, ApiError> {
    let mut state = db.write().await;
    let id = state.next_id();
    let list = state.list_mut(&list_id).ok_or_else(|| not_found("list"))?;
    let entry = bare_entry(list, id, input.uuid);
    list.entries.push(entry.clone());
    Ok(Json(Value::Object(entry)))
}

async fn update_entry(
    State(db): State<Db>,
    Path((list_id, entry_id)): Path<(String, String)>,
    Json(update): Json<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    let mut state = db.write().await;
    let list = state.list_mut(&list_id).ok_or_else(|| not_found("list"))?;
    let title_field = list.title_field.clone();
    let entry = list
        .entries
        .iter_mut()
        .find(|entry| entry_matches(entry, &entry_id))
        .ok_or_else(|| not_found("entry"))?;
    for (key, value) in update {
        entry.insert(key, value);
    }
    // The service derives the display string from the primary text field.
    let display = entry.get(&title_field).cloned().unwrap_or(Value::Null);
    entry.insert("displayString".to_string(), display);
    Ok(Json(Value::Object(entry.clone())))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteFilter {
    list_entry_ids: Vec<i64>,
}

async fn delete_entries(
    State(db): State<Db>,
    Path(list_id): Path<String>,
    Json(input): Json<DeleteFilter>,
) -> Result<Json<Value>, ApiError> {
    let mut state = db.write().await;
    let list = state.list_mut(&list_id).ok_or_else(|| not_found("list"))?;
    let before = list.entries.len();
    list.entries.retain(|entry| {
        entry
            .get("id")
            .and_then(Value::as_i64)
            .is_none_or(|id| !input.list_entry_ids.contains(&id))
    });
    Ok(Json(json!({"deleted": before - list.entries.len()})))
}
