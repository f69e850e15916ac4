//! In-memory stand-in for the Joplin WebClipper service.
//!
//! Serves the same paths as the desktop app (`/notes/`, `/folders/:id/notes`,
//! `/tags/:id/notes/:note_id`, `/resources/:id/file`, ...) and rejects any
//! request whose `token` query parameter does not match. `/ping/` answers
//! without a token, as the real service does.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const PING_REPLY: &str = "JoplinClipperServer";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Note {
    pub id: String,
    pub parent_id: String,
    pub title: String,
    pub body: String,
    pub author: String,
    pub source_url: String,
    pub is_todo: u8,
    pub created_time: i64,
    pub updated_time: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Folder {
    pub id: String,
    pub parent_id: String,
    pub title: String,
    pub created_time: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub id: String,
    pub title: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resource {
    pub id: String,
    pub title: String,
    pub filename: String,
    pub size: usize,
}

/// Fields accepted on note create/update. Anything absent is left alone
/// (update) or defaulted (create).
#[derive(Debug, Default, Deserialize)]
pub struct NoteInput {
    pub title: Option<String>,
    pub body: Option<String>,
    pub parent_id: Option<String>,
    pub author: Option<String>,
    pub source_url: Option<String>,
    /// Comma-separated tag titles.
    pub tags: Option<String>,
    pub is_todo: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FolderInput {
    pub title: Option<String>,
    pub parent_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TitleInput {
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LinkInput {
    pub id: String,
}

#[derive(Debug, Default)]
pub struct Store {
    clock: i64,
    notes: HashMap<String, Note>,
    folders: HashMap<String, Folder>,
    tags: HashMap<String, Tag>,
    /// `(tag_id, note_id)` pairs.
    links: BTreeSet<(String, String)>,
    resources: HashMap<String, (Resource, Bytes)>,
}

impl Store {
    fn tick(&mut self) -> i64 {
        self.clock += 1;
        self.clock
    }

    fn tag_by_title(&mut self, title: &str) -> String {
        if let Some(tag) = self.tags.values().find(|t| t.title == title) {
            return tag.id.clone();
        }
        let tag = Tag {
            id: new_id(),
            title: title.to_string(),
        };
        let id = tag.id.clone();
        self.tags.insert(id.clone(), tag);
        id
    }

    fn replace_note_tags(&mut self, note_id: &str, tags: &str) {
        self.links.retain(|(_, n)| n != note_id);
        for title in tags.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let tag_id = self.tag_by_title(title);
            self.links.insert((tag_id, note_id.to_string()));
        }
    }
}

pub type Db = Arc<RwLock<Store>>;

#[derive(Clone)]
pub struct AppState {
    token: Arc<str>,
    db: Db,
}

type ApiResult<T> = Result<T, (StatusCode, Json<Value>)>;

pub fn app(token: &str) -> Router {
    let state = AppState {
        token: Arc::from(token),
        db: Arc::new(RwLock::new(Store::default())),
    };
    Router::new()
        .route("/notes/", get(list_notes).post(create_note))
        .route("/notes/{id}", get(get_note).put(update_note).delete(delete_note))
        .route("/notes/{id}/tags", get(note_tags))
        .route("/folders/", get(list_folders).post(create_folder))
        .route("/folders/{id}", get(get_folder).put(update_folder).delete(delete_folder))
        .route("/folders/{id}/notes", get(folder_notes))
        .route("/tags/", get(list_tags).post(create_tag))
        .route("/tags/{id}", get(get_tag).put(update_tag).delete(delete_tag))
        .route("/tags/{id}/notes", get(tag_notes).post(link_tag))
        .route("/tags/{id}/notes/{note_id}", axum::routing::delete(unlink_tag))
        .route("/resources/", get(list_resources).post(create_resource))
        .route(
            "/resources/{id}",
            get(get_resource).put(update_resource).delete(delete_resource),
        )
        .route("/resources/{id}/file", get(resource_file))
        .route("/version/", get(version))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token))
        .route("/ping/", get(ping))
        .with_state(state)
}

pub async fn run(listener: TcpListener, token: &str) -> Result<(), std::io::Error> {
    axum::serve(listener, app(token)).await
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn not_found() -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not Found" })))
}

fn bad_request(msg: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": msg.to_string() })))
}

async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let token = Query::<HashMap<String, String>>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(params)| params.get("token").cloned());
    if token.as_deref() != Some(&*state.token) {
        tracing::debug!(path = %request.uri().path(), "rejecting request without valid token");
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Invalid \"token\" parameter" })),
        )
            .into_response();
    }
    next.run(request).await
}

async fn ping() -> &'static str {
    PING_REPLY
}

async fn version() -> Json<Value> {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") }))
}

// --- notes ---

async fn list_notes(State(state): State<AppState>) -> Json<Vec<Note>> {
    let store = state.db.read().await;
    let mut notes: Vec<Note> = store.notes.values().cloned().collect();
    notes.sort_by_key(|n| n.created_time);
    Json(notes)
}

async fn create_note(State(state): State<AppState>, Json(input): Json<NoteInput>) -> Json<Note> {
    let mut store = state.db.write().await;
    let now = store.tick();
    let note = Note {
        id: new_id(),
        parent_id: input.parent_id.unwrap_or_default(),
        title: input.title.unwrap_or_default(),
        body: input.body.unwrap_or_default(),
        author: input.author.unwrap_or_default(),
        source_url: input.source_url.unwrap_or_default(),
        is_todo: input.is_todo.unwrap_or_default(),
        created_time: now,
        updated_time: now,
    };
    if let Some(tags) = &input.tags {
        store.replace_note_tags(&note.id, tags);
    }
    store.notes.insert(note.id.clone(), note.clone());
    Json(note)
}

async fn get_note(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Note>> {
    let store = state.db.read().await;
    store.notes.get(&id).cloned().map(Json).ok_or_else(not_found)
}

async fn update_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<NoteInput>,
) -> ApiResult<Json<Note>> {
    let mut store = state.db.write().await;
    let now = store.tick();
    let note = store.notes.get_mut(&id).ok_or_else(not_found)?;
    if let Some(title) = input.title {
        note.title = title;
    }
    if let Some(body) = input.body {
        note.body = body;
    }
    if let Some(parent_id) = input.parent_id {
        note.parent_id = parent_id;
    }
    if let Some(author) = input.author {
        note.author = author;
    }
    if let Some(source_url) = input.source_url {
        note.source_url = source_url;
    }
    if let Some(is_todo) = input.is_todo {
        note.is_todo = is_todo;
    }
    note.updated_time = now;
    let note = note.clone();
    if let Some(tags) = &input.tags {
        store.replace_note_tags(&id, tags);
    }
    Ok(Json(note))
}

async fn delete_note(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let mut store = state.db.write().await;
    store.notes.remove(&id).ok_or_else(not_found)?;
    store.links.retain(|(_, n)| *n != id);
    Ok(StatusCode::OK)
}

async fn note_tags(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Vec<Tag>>> {
    let store = state.db.read().await;
    if !store.notes.contains_key(&id) {
        return Err(not_found());
    }
    let tags = store
        .links
        .iter()
        .filter(|(_, n)| *n == id)
        .filter_map(|(t, _)| store.tags.get(t).cloned())
        .collect();
    Ok(Json(tags))
}

// --- folders ---

async fn list_folders(State(state): State<AppState>) -> Json<Vec<Folder>> {
    let store = state.db.read().await;
    let mut folders: Vec<Folder> = store.folders.values().cloned().collect();
    folders.sort_by_key(|f| f.created_time);
    Json(folders)
}

async fn create_folder(State(state): State<AppState>, Json(input): Json<FolderInput>) -> Json<Folder> {
    let mut store = state.db.write().await;
    let folder = Folder {
        id: new_id(),
        parent_id: input.parent_id.unwrap_or_default(),
        title: input.title.unwrap_or_default(),
        created_time: store.tick(),
    };
    store.folders.insert(folder.id.clone(), folder.clone());
    Json(folder)
}

async fn get_folder(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Folder>> {
    let store = state.db.read().await;
    store.folders.get(&id).cloned().map(Json).ok_or_else(not_found)
}

async fn update_folder(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<FolderInput>,
) -> ApiResult<Json<Folder>> {
    let mut store = state.db.write().await;
    let folder = store.folders.get_mut(&id).ok_or_else(not_found)?;
    if let Some(title) = input.title {
        folder.title = title;
    }
    if let Some(parent_id) = input.parent_id {
        folder.parent_id = parent_id;
    }
    Ok(Json(folder.clone()))
}

async fn delete_folder(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let mut store = state.db.write().await;
    store.folders.remove(&id).map(|_| StatusCode::OK).ok_or_else(not_found)
}

async fn folder_notes(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Vec<Note>>> {
    let store = state.db.read().await;
    if !store.folders.contains_key(&id) {
        return Err(not_found());
    }
    let mut notes: Vec<Note> = store.notes.values().filter(|n| n.parent_id == id).cloned().collect();
    notes.sort_by_key(|n| n.created_time);
    Ok(Json(notes))
}

// --- tags ---

async fn list_tags(State(state): State<AppState>) -> Json<Vec<Tag>> {
    let store = state.db.read().await;
    let mut tags: Vec<Tag> = store.tags.values().cloned().collect();
    tags.sort_by(|a, b| a.title.cmp(&b.title));
    Json(tags)
}

async fn create_tag(State(state): State<AppState>, Json(input): Json<TitleInput>) -> ApiResult<Json<Tag>> {
    let title = input.title.filter(|t| !t.is_empty()).ok_or_else(|| bad_request("title is required"))?;
    let mut store = state.db.write().await;
    let id = store.tag_by_title(&title);
    Ok(Json(store.tags[&id].clone()))
}

async fn get_tag(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Tag>> {
    let store = state.db.read().await;
    store.tags.get(&id).cloned().map(Json).ok_or_else(not_found)
}

async fn update_tag(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<TitleInput>,
) -> ApiResult<Json<Tag>> {
    let mut store = state.db.write().await;
    let tag = store.tags.get_mut(&id).ok_or_else(not_found)?;
    if let Some(title) = input.title {
        tag.title = title;
    }
    Ok(Json(tag.clone()))
}

async fn delete_tag(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let mut store = state.db.write().await;
    store.tags.remove(&id).ok_or_else(not_found)?;
    store.links.retain(|(t, _)| *t != id);
    Ok(StatusCode::OK)
}

async fn tag_notes(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Vec<Note>>> {
    let store = state.db.read().await;
    if !store.tags.contains_key(&id) {
        return Err(not_found());
    }
    let notes = store
        .links
        .iter()
        .filter(|(t, _)| *t == id)
        .filter_map(|(_, n)| store.notes.get(n).cloned())
        .collect();
    Ok(Json(notes))
}

async fn link_tag(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<LinkInput>,
) -> ApiResult<Json<Note>> {
    let mut store = state.db.write().await;
    if !store.tags.contains_key(&id) {
        return Err(not_found());
    }
    let note = store.notes.get(&input.id).cloned().ok_or_else(not_found)?;
    store.links.insert((id, input.id));
    Ok(Json(note))
}

async fn unlink_tag(
    State(state): State<AppState>,
    Path((id, note_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let mut store = state.db.write().await;
    if store.links.remove(&(id, note_id)) {
        Ok(StatusCode::OK)
    } else {
        Err(not_found())
    }
}

// --- resources ---

async fn list_resources(State(state): State<AppState>) -> Json<Vec<Resource>> {
    let store = state.db.read().await;
    let mut resources: Vec<Resource> = store.resources.values().map(|(r, _)| r.clone()).collect();
    resources.sort_by(|a, b| a.id.cmp(&b.id));
    Json(resources)
}

async fn create_resource(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<Json<Resource>> {
    let mut data = None;
    let mut props = TitleInput::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("data") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(bad_request)?;
                data = Some((filename, bytes));
            }
            Some("props") => {
                let text = field.text().await.map_err(bad_request)?;
                props = serde_json::from_str(&text).map_err(bad_request)?;
            }
            _ => {}
        }
    }
    let (filename, bytes) = data.ok_or_else(|| bad_request("Resource cannot be created without a file"))?;
    let resource = Resource {
        id: new_id(),
        title: props.title.unwrap_or_else(|| filename.clone()),
        filename,
        size: bytes.len(),
    };
    let mut store = state.db.write().await;
    store
        .resources
        .insert(resource.id.clone(), (resource.clone(), bytes));
    Ok(Json(resource))
}

async fn get_resource(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Resource>> {
    let store = state.db.read().await;
    store
        .resources
        .get(&id)
        .map(|(r, _)| Json(r.clone()))
        .ok_or_else(not_found)
}

async fn update_resource(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(input): Json<TitleInput>,
) -> ApiResult<Json<Resource>> {
    let mut store = state.db.write().await;
    let (resource, _) = store.resources.get_mut(&id).ok_or_else(not_found)?;
    if let Some(title) = input.title {
        resource.title = title;
    }
    Ok(Json(resource.clone()))
}

async fn resource_file(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Response> {
    let store = state.db.read().await;
    let (_, bytes) = store.resources.get(&id).ok_or_else(not_found)?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes.clone()).into_response())
}

async fn delete_resource(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let mut store = state.db.write().await;
    store.resources.remove(&id).map(|_| StatusCode::OK).ok_or_else(not_found)
}
