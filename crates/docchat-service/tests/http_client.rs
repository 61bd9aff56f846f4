//! Integration tests for `HttpClient` and `AuthSession` against a stand-in
//! API server.
//!
//! Each test spawns an in-process axum server on 127.0.0.1:0 that mimics
//! the remote auth, project and chat endpoints with in-memory state.

use std::sync::{Arc, Mutex};

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use bytes::Bytes;
use docchat_core::project::CreateProject;
use docchat_core::{ProjectState, Role};
use docchat_service::{AuthSession, HttpClient, ServiceError, UploadFile};
use docchat_store::MemoryStore;
use serde_json::{json, Value};

const TOKEN: &str = "tok-123";

#[derive(Default)]
struct Backend {
    next_id: u64,
    projects: Vec<Value>,
    uploads: Vec<(String, usize)>,
    messages: Vec<Value>,
}

type Shared = Arc<Mutex<Backend>>;
type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn fail(status: StatusCode, detail: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "detail": detail })))
}

async fn login(Json(body): Json<Value>) -> ApiResult {
    if body["email"] == "known@example.com" && body["userType"].is_string() {
        Ok(Json(json!({ "token": TOKEN })))
    } else {
        Err(fail(StatusCode::UNAUTHORIZED, "Invalid email"))
    }
}

async fn groups(headers: HeaderMap) -> ApiResult {
    let expected = format!("Bearer {TOKEN}");
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some(value) if value == expected => Ok(Json(json!({
            "groups": ["engineering", "sales"],
            "total_groups": 2,
            "page": 1,
            "page_size": 50,
        }))),
        _ => Err(fail(StatusCode::UNAUTHORIZED, "Missing token")),
    }
}

async fn list_projects(State(state): State<Shared>) -> ApiResult {
    let backend = state.lock().unwrap();
    Ok(Json(Value::Array(backend.projects.clone())))
}

async fn create_project(State(state): State<Shared>, mut multipart: Multipart) -> ApiResult {
    let mut data = Value::Null;
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "project_data" => {
                let text = field.text().await.unwrap();
                data = serde_json::from_str(&text).unwrap();
            }
            "files" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.unwrap();
                files.push((file_name, bytes.len()));
            }
            _ => {}
        }
    }
    if !data["name"].is_string() {
        return Err(fail(StatusCode::BAD_REQUEST, "name is required"));
    }

    let mut backend = state.lock().unwrap();
    backend.next_id += 1;
    let project = json!({
        "id": backend.next_id,
        "name": data["name"],
        "description": data["description"],
        "created_at": "2026-10-18T09:00:00.123456",
        "updated_at": "2026-10-18T09:00:00.123456",
        "state": "DRAFT",
    });
    backend.projects.push(project.clone());
    backend.uploads.extend(files);
    Ok(Json(project))
}

fn find_project<'a>(projects: &'a mut [Value], id: &str) -> Option<&'a mut Value> {
    projects
        .iter_mut()
        .find(|p| p["id"].as_u64().map(|n| n.to_string()).as_deref() == Some(id))
}

async fn get_project(State(state): State<Shared>, Path(id): Path<String>) -> ApiResult {
    let mut backend = state.lock().unwrap();
    find_project(&mut backend.projects, &id)
        .map(|p| Json(p.clone()))
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "Project not found"))
}

async fn delete_project(State(state): State<Shared>, Path(id): Path<String>) -> ApiResult {
    let mut backend = state.lock().unwrap();
    let before = backend.projects.len();
    backend
        .projects
        .retain(|p| p["id"].as_u64().map(|n| n.to_string()).as_deref() != Some(id.as_str()));
    if backend.projects.len() == before {
        return Err(fail(StatusCode::NOT_FOUND, "Project not found"));
    }
    Ok(Json(json!({ "message": "Project deleted successfully" })))
}

async fn publish_project(State(state): State<Shared>, Path(id): Path<String>) -> ApiResult {
    let mut backend = state.lock().unwrap();
    let project = find_project(&mut backend.projects, &id)
        .ok_or_else(|| fail(StatusCode::NOT_FOUND, "Project not found"))?;
    project["state"] = json!("PUBLISHED");
    Ok(Json(project.clone()))
}

async fn chat(
    State(state): State<Shared>,
    Path((project_id, user_id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> ApiResult {
    let content = body["content"]
        .as_str()
        .ok_or_else(|| fail(StatusCode::UNPROCESSABLE_ENTITY, "content is required"))?
        .to_string();
    let reply = format!("echo: {content}");

    let mut backend = state.lock().unwrap();
    for (role, text) in [("user", content.as_str()), ("assistant", reply.as_str())] {
        let id = backend.messages.len() + 1;
        backend.messages.push(json!({
            "id": id.to_string(),
            "content": text,
            "role": role,
            "timestamp": "2026-10-18T09:00:00.654321",
            "project_id": project_id,
            "user_id": user_id,
        }));
    }
    Ok(Json(json!({ "response": reply })))
}

async fn list_messages(
    State(state): State<Shared>,
    Path((project_id, user_id)): Path<(String, String)>,
) -> ApiResult {
    let backend = state.lock().unwrap();
    let found: Vec<Value> = backend
        .messages
        .iter()
        .filter(|m| m["project_id"] == project_id.as_str() && m["user_id"] == user_id.as_str())
        .cloned()
        .collect();
    if found.is_empty() {
        return Err(fail(
            StatusCode::NOT_FOUND,
            "No messages found for the specified project",
        ));
    }
    Ok(Json(Value::Array(found)))
}

async fn spawn_server() -> (String, Shared) {
    let state = Shared::default();
    let app = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/groups", get(groups))
        .route("/projects", get(list_projects))
        .route("/projectsv2", post(create_project))
        .route("/projects/{id}", get(get_project).delete(delete_project))
        .route("/projects/{id}/publish", put(publish_project))
        .route("/chat/{project_id}/{user_id}", post(chat))
        .route("/messages/{project_id}/{user_id}", get(list_messages))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), state)
}

#[tokio::test]
async fn login_stores_token_and_unlocks_groups() {
    let (url, _state) = spawn_server().await;
    let client = HttpClient::new(&url);
    let session = AuthSession::new(Arc::new(MemoryStore::new()));

    let err = session
        .login(&client, "stranger@example.com", "user")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Unauthorized(ref msg) if msg == "Invalid email"));
    assert!(session.token().await.unwrap().is_none());

    let token = session
        .login(&client, "known@example.com", "admin")
        .await
        .unwrap();
    assert_eq!(token, TOKEN);
    assert_eq!(session.token().await.unwrap().as_deref(), Some(TOKEN));
    assert_eq!(
        session.current_user().await.unwrap().as_deref(),
        Some("known@example.com")
    );

    let anonymous = client.groups().await.unwrap_err();
    assert!(matches!(anonymous, ServiceError::Unauthorized(_)));

    let authed = HttpClient::with_token(&url, token);
    let groups = authed.groups().await.unwrap();
    assert_eq!(groups.groups, vec!["engineering", "sales"]);
    assert_eq!(groups.total_groups, 2);
}

#[tokio::test]
async fn project_lifecycle_via_http() {
    let (url, state) = spawn_server().await;
    let client = HttpClient::with_token(&url, TOKEN.into());

    let created = client
        .create_project(
            &CreateProject {
                name: "Handbook".into(),
                description: Some("HR docs".into()),
            },
            vec![
                UploadFile {
                    name: "policy.pdf".into(),
                    mime: Some("application/pdf".into()),
                    data: Bytes::from_static(b"%PDF-1.7"),
                },
                UploadFile {
                    name: "faq.txt".into(),
                    mime: None,
                    data: Bytes::from_static(b"q&a"),
                },
            ],
        )
        .await
        .unwrap();
    assert_eq!(created.id, "1");
    assert_eq!(created.name, "Handbook");
    assert_eq!(created.description.as_deref(), Some("HR docs"));
    assert_eq!(created.state, Some(ProjectState::Draft));
    assert_eq!(
        created.created_at.unwrap().to_rfc3339(),
        "2026-10-18T09:00:00.123456+00:00"
    );
    {
        let backend = state.lock().unwrap();
        assert_eq!(
            backend.uploads,
            vec![("policy.pdf".to_string(), 8), ("faq.txt".to_string(), 3)]
        );
    }

    let all = client.list_projects().await.unwrap();
    assert_eq!(all.len(), 1);

    let fetched = client.get_project(&created.id).await.unwrap();
    assert_eq!(fetched.name, "Handbook");

    let published = client.publish_project(&created.id).await.unwrap();
    assert_eq!(published.state, Some(ProjectState::Published));

    let message = client.delete_project(&created.id).await.unwrap();
    assert_eq!(message, "Project deleted successfully");

    let err = client.get_project(&created.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(ref msg) if msg == "Project not found"));
}

#[tokio::test]
async fn chat_reply_and_history_via_http() {
    let (url, _state) = spawn_server().await;
    let client = HttpClient::new(&url);

    let empty = client.list_messages("p1", "u1").await.unwrap();
    assert!(empty.is_empty());

    let reply = client.send_chat("p1", "u1", "What is the policy?").await.unwrap();
    assert_eq!(reply, "echo: What is the policy?");

    let history = client.list_messages("p1", "u1").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, reply);
    assert_eq!(
        history[0].timestamp.to_rfc3339(),
        "2026-10-18T09:00:00.654321+00:00"
    );

    let other_user = client.list_messages("p1", "u2").await.unwrap();
    assert!(other_user.is_empty());
}

#[tokio::test]
async fn unreachable_server_is_a_remote_error() {
    let client = HttpClient::new("http://127.0.0.1:1");
    let err = client.list_projects().await.unwrap_err();
    assert!(matches!(err, ServiceError::Remote(_)));
}
