/*
 * In-memory Store for tests: keeps records as JSON, applies RFC 7386 merge
 * patches to them, remembers every patch it was asked for and feeds
 * watchers from replace().
 */

use crate::store::{Kind, Store, StoreError, Subresource, Update, UpdateStream};

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use kube::core::ErrorResponse;
use kube::runtime::watcher as kube_watcher;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

type Key = (Kind, String, String);

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPatch {
    pub kind: Kind,
    pub name: String,
    pub body: Value,
    pub subresource: Option<Subresource>,
}

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<Key, Value>>,
    patches: Mutex<Vec<RecordedPatch>>,
    watchers: Mutex<Vec<(Key, mpsc::UnboundedSender<Result<Update, StoreError>>)>>,
    failing_patches: Mutex<Vec<Kind>>,
    failing_gets: AtomicBool,
}

/* the error the API server sends back for a failed request */
fn error_response(code: u16, reason: &str, message: String) -> ErrorResponse {
    ErrorResponse{
	status: String::from("Failure"),
	message: message,
	reason: reason.to_string(),
	code: code,
    }
}

fn api_error(code: u16, reason: &str, message: String) -> StoreError {
    StoreError::Kube(kube::Error::Api(error_response(code, reason, message)))
}

fn key(kind: Kind, namespace: &str, name: &str) -> Key {
    (kind, namespace.to_string(), name.to_string())
}

impl MemoryStore {

    pub fn new() -> Self {
	Self::default()
    }

    /* store a record without telling watchers, like an add */
    pub fn insert(&self, kind: Kind, namespace: &str, name: &str, record: Value) {
	self.records.lock().unwrap().insert(key(kind, namespace, name), record);
    }

    /* store a record and hand (old, new) to watchers of it */
    pub fn replace(&self, kind: Kind, namespace: &str, name: &str, record: Value) {
	let key = key(kind, namespace, name);
	let old = self.records.lock().unwrap().insert(key.clone(), record.clone());

	if let Some(old) = old {
	    self.notify(&key, Ok(Update{ old: old, new: record }));
	}
    }

    pub fn send_watch_error(&self, kind: Kind, namespace: &str, name: &str) {
	let gone = error_response(410, "Expired", String::from("too old resource version"));
	let err = StoreError::Watch(kube_watcher::Error::WatchError(gone));
	self.notify(&key(kind, namespace, name), Err(err));
    }

    fn notify(&self, key: &Key, update: Result<Update, StoreError>) {
	let mut watchers = self.watchers.lock().unwrap();
	watchers.retain(|(_, tx)| !tx.is_closed());

	let mut update = Some(update);
	for (watched, tx) in watchers.iter() {
	    if watched == key {
		if let Some(update) = update.take() {
		    let _ = tx.unbounded_send(update);
		}
	    }
	}
    }

    pub fn record(&self, kind: Kind, namespace: &str, name: &str) -> Option<Value> {
	self.records.lock().unwrap().get(&key(kind, namespace, name)).cloned()
    }

    pub fn patches(&self) -> Vec<RecordedPatch> {
	self.patches.lock().unwrap().clone()
    }

    pub fn patches_of(&self, kind: Kind) -> Vec<RecordedPatch> {
	self.patches().into_iter().filter(|p| p.kind == kind).collect()
    }

    pub fn fail_patches(&self, kind: Kind, failing: bool) {
	let mut failing_patches = self.failing_patches.lock().unwrap();
	failing_patches.retain(|k| *k != kind);
	if failing {
	    failing_patches.push(kind);
	}
    }

    pub fn fail_gets(&self, failing: bool) {
	self.failing_gets.store(failing, Ordering::SeqCst);
    }

    pub async fn wait_for_watchers(&self, count: usize) {
	loop {
	    let open = self.watchers.lock().unwrap()
		.iter()
		.filter(|(_, tx)| !tx.is_closed())
		.count();
	    if open >= count {
		return;
	    }
	    tokio::time::sleep(Duration::from_millis(5)).await;
	}
    }
}

#[async_trait]
impl Store for MemoryStore {

    async fn get(&self, kind: Kind, namespace: &str, name: &str) -> Result<Option<Value>, StoreError> {
	if self.failing_gets.load(Ordering::SeqCst) {
	    return Err(api_error(503, "ServiceUnavailable", String::from("get failed")));
	}

	Ok(self.record(kind, namespace, name))
    }

    async fn patch(&self, kind: Kind, namespace: &str, name: &str, body: &Value, subresource: Option<Subresource>) -> Result<(), StoreError> {
	self.patches.lock().unwrap().push(RecordedPatch{
	    kind: kind,
	    name: name.to_string(),
	    body: body.clone(),
	    subresource: subresource,
	});

	if self.failing_patches.lock().unwrap().contains(&kind) {
	    return Err(api_error(503, "ServiceUnavailable", format!("patch of {} {}/{} failed", kind, namespace, name)));
	}

	let mut records = self.records.lock().unwrap();
	match records.get_mut(&key(kind, namespace, name)) {
	    Some(record) => {
		json_patch::merge(record, body);
		Ok(())
	    },
	    None => Err(api_error(404, "NotFound", format!("{} {}/{} not found", kind, namespace, name))),
	}
    }

    fn watch(&self, kind: Kind, namespace: &str, name: &str) -> UpdateStream {
	let (tx, rx) = mpsc::unbounded();
	self.watchers.lock().unwrap().push((key(kind, namespace, name), tx));

	rx.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn failures_look_like_the_api_server() {
	let store = MemoryStore::new();
	let body = json!({"spec": {}});

	let missing = store.patch(Kind::GameServerDetail, "default", "gs", &body, None).await.unwrap_err();
	assert!(matches!(&missing, StoreError::Kube(kube::Error::Api(resp)) if resp.code == 404));
	assert!(!missing.is_retryable());

	store.insert(Kind::GameServerDetail, "default", "gs", json!({}));
	store.fail_patches(Kind::GameServerDetail, true);
	let down = store.patch(Kind::GameServerDetail, "default", "gs", &body, None).await.unwrap_err();
	assert!(matches!(&down, StoreError::Kube(kube::Error::Api(resp)) if resp.code == 503));
	assert!(down.is_retryable());
    }

    #[tokio::test]
    async fn patches_touch_only_named_leaves() {
	let store = MemoryStore::new();
	store.insert(Kind::GameServer, "default", "gs", json!({"status": {"health": "", "state": "", "sessionID": "s"}, "spec": {"a": 1}}));

	let body = json!({"status": {"health": "Healthy", "state": "StandingBy"}});
	store.patch(Kind::GameServer, "default", "gs", &body, Some(Subresource::Status)).await.unwrap();

	assert_eq!(
	    store.record(Kind::GameServer, "default", "gs").unwrap(),
	    json!({"status": {"health": "Healthy", "state": "StandingBy", "sessionID": "s"}, "spec": {"a": 1}})
	);
    }

    #[tokio::test]
    async fn patches_replace_lists() {
	let store = MemoryStore::new();
	store.insert(Kind::GameServerDetail, "default", "gs", json!({"spec": {"connectedPlayers": ["p1", "p2"], "connectedPlayersCount": 2}}));

	let body = json!({"spec": {"connectedPlayers": [], "connectedPlayersCount": 0}});
	store.patch(Kind::GameServerDetail, "default", "gs", &body, None).await.unwrap();

	assert_eq!(
	    store.record(Kind::GameServerDetail, "default", "gs").unwrap(),
	    json!({"spec": {"connectedPlayers": [], "connectedPlayersCount": 0}})
	);
    }
}
