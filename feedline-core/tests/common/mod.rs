//! In-process feed server used by the integration tests.
//!
//! Stores messages newest first and only accepts envelopes whose signature
//! verifies, mirroring what a real server enforces.

#![allow(dead_code)]

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use feedline::{ProfileEnvelope, SignedEnvelope, TimelineEntry};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Default)]
pub struct FakeFeed {
    pub messages: Mutex<Vec<TimelineEntry>>,
    pub characters: Mutex<Vec<ProfileEnvelope>>,
    pub message_queries: Mutex<Vec<Option<String>>>,
}

type Shared = Arc<FakeFeed>;

async fn list_messages(
    State(feed): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let users = params.get("users").cloned();
    feed.message_queries.lock().unwrap().push(users.clone());

    let messages = feed.messages.lock().unwrap().clone();
    let messages: Vec<TimelineEntry> = match users {
        Some(users) => {
            let wanted: Vec<&str> = users.split(',').collect();
            messages
                .into_iter()
                .filter(|m| wanted.contains(&m.author.as_str()))
                .collect()
        }
        None => messages,
    };

    Json(json!({ "messages": messages, "status": "ok" }))
}

async fn create_message(
    State(feed): State<Shared>,
    Json(envelope): Json<SignedEnvelope>,
) -> (StatusCode, Json<Value>) {
    if !envelope.verify().unwrap_or(false) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "error", "message": "invalid signature" })),
        );
    }

    let mut messages = feed.messages.lock().unwrap();
    let id = format!("m{}", messages.len() + 1);
    messages.insert(
        0,
        TimelineEntry {
            id: Some(id.clone()),
            author: envelope.author,
            payload: envelope.payload,
            signature: envelope.signature,
            cdate: Some(chrono::Utc::now().to_rfc3339()),
        },
    );

    (StatusCode::CREATED, Json(json!({ "status": "ok", "id": id })))
}

async fn find_characters(
    State(feed): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let author = params.get("author").cloned().unwrap_or_default();
    let schema = params.get("schema").cloned().unwrap_or_default();

    let characters: Vec<Value> = feed
        .characters
        .lock()
        .unwrap()
        .iter()
        .rev()
        .filter(|c| c.author == author && c.schema == schema)
        .map(|c| json!({ "author": c.author, "schema": c.schema, "payload": c.payload }))
        .collect();

    Json(json!({ "characters": characters }))
}

async fn put_character(
    State(feed): State<Shared>,
    Json(envelope): Json<ProfileEnvelope>,
) -> StatusCode {
    if !envelope.verify().unwrap_or(false) {
        return StatusCode::BAD_REQUEST;
    }
    feed.characters.lock().unwrap().push(envelope);
    StatusCode::OK
}

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    // Give server time to start
    tokio::time::sleep(Duration::from_millis(50)).await;

    format!("http://127.0.0.1:{}/feed", port)
}

/// Start a well-behaved feed server; returns its base URL and state
pub async fn start_feed_server() -> (String, Shared) {
    let feed: Shared = Arc::new(FakeFeed::default());

    let router = Router::new()
        .route("/feed/messages", get(list_messages).post(create_message))
        .route("/feed/characters", get(find_characters).put(put_character))
        .with_state(feed.clone());

    (serve(router).await, feed)
}

/// Start a server whose every endpoint misbehaves the same way
pub async fn start_broken_server(mode: Broken) -> String {
    let handler = move || async move {
        match mode {
            Broken::ServerError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "boom".to_string())
            }
            Broken::Malformed => (StatusCode::OK, "{\"messages\": [".to_string()),
            Broken::WrongShape => (StatusCode::OK, "{\"items\": []}".to_string()),
            Broken::Slow => {
                tokio::time::sleep(Duration::from_secs(2)).await;
                (StatusCode::OK, "{\"messages\": []}".to_string())
            }
        }
    };

    let router = Router::new()
        .route("/feed/messages", get(handler).post(handler))
        .route("/feed/characters", get(handler).put(handler));

    serve(router).await
}

#[derive(Debug, Clone, Copy)]
pub enum Broken {
    ServerError,
    Malformed,
    WrongShape,
    Slow,
}
