use gameserver_api as api;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use kube::Api as KubeApi;
use kube::Client as KubeClient;
use kube::api::ApiResource as KubeApiResource;
use kube::api::DynamicObject as KubeDynamicObject;
use kube::api::Patch as KubePatch;
use kube::api::PatchParams as KubePatchParams;
use kube::runtime::WatchStreamExt;
use kube::runtime::watcher as kube_watcher;
use kube::runtime::watcher::Config as KubeWatcherConfig;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/*
 * The record kinds the sidecar reads and writes.
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Kind {
    GameServer,
    GameServerDetail,
}

impl Kind {

    pub fn api_resource(&self) -> KubeApiResource {
	match self {
	    Kind::GameServer => KubeApiResource::erase::<api::GameServer>(&()),
	    Kind::GameServerDetail => KubeApiResource::erase::<api::GameServerDetail>(&()),
	}
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
	match self {
	    Kind::GameServer => f.write_str("GameServer"),
	    Kind::GameServerDetail => f.write_str("GameServerDetail"),
	}
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Subresource {
    Status,
}

/* A record as it was before and after a change */
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub old: Value,
    pub new: Value,
}

pub type UpdateStream = BoxStream<'static, Result<Update, StoreError>>;

#[derive(Error, Debug)]
pub enum StoreError {

    /* encapsulate a kube-rust error */
    #[error("kube error: {0}")]
    Kube(#[from] kube::Error),

    #[error("watch error: {0}")]
    Watch(#[from] kube_watcher::Error),

    #[error("unable to decode record: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StoreError {

    /*
     * Whether trying the same call again later can succeed. Throttling,
     * server side failures and broken connections can; a request the API
     * server refused as invalid cannot.
     */
    pub fn is_retryable(&self) -> bool {
	match self {
	    StoreError::Kube(kube::Error::Api(resp)) => resp.code == 429 || resp.code >= 500,
	    StoreError::Kube(kube::Error::HyperError(_))
		| StoreError::Kube(kube::Error::Service(_))
		| StoreError::Kube(kube::Error::ReadEvents(_)) => true,
	    StoreError::Kube(_) => false,
	    StoreError::Watch(_) => true,
	    StoreError::Decode(_) => false,
	}
    }
}

/*
 * Read, patch and watch named records in a namespace. Records are handled
 * as plain JSON, callers project the fields they need.
 */
#[async_trait]
pub trait Store: Send + Sync {

    /* Ok(None) when the record does not exist */
    async fn get(&self, kind: Kind, namespace: &str, name: &str) -> Result<Option<Value>, StoreError>;

    /*
     * Apply `body` as a JSON merge patch, either to the record itself or
     * to one of its subresources.
     */
    async fn patch(&self, kind: Kind, namespace: &str, name: &str, body: &Value, subresource: Option<Subresource>) -> Result<(), StoreError>;

    /*
     * Stream of updates to the single record called `name`. Updates for
     * the record are delivered one at a time, in order. Dropping the
     * stream ends the subscription.
     */
    fn watch(&self, kind: Kind, namespace: &str, name: &str) -> UpdateStream;
}

/*
 * Pairs every observed version of a record with the previous one. The
 * first version seen only primes the pair: it is an add, not an update.
 */
#[derive(Default)]
struct LastSeen {
    record: Option<Value>,
}

impl LastSeen {

    fn observe(&mut self, event: kube_watcher::Event<KubeDynamicObject>) -> Option<Result<Update, StoreError>> {
	match event {
	    kube_watcher::Event::Apply(obj) | kube_watcher::Event::InitApply(obj) => {
		let new = match serde_json::to_value(&obj) {
		    Ok(new) => new,
		    Err(err) => return Some(Err(StoreError::Decode(err))),
		};

		self.record.replace(new.clone())
		    .map(|old| Ok(Update{ old: old, new: new }))
	    },
	    kube_watcher::Event::Delete(_) => {
		self.record = None;
		None
	    },
	    kube_watcher::Event::Init | kube_watcher::Event::InitDone => None,
	}
    }
}

/*
 * Store backed by the kubernetes API server, talking to the custom
 * resources as dynamic objects.
 */
#[derive(Clone)]
pub struct KubeStore {
    kube_client: KubeClient,
}

impl KubeStore {

    pub fn new(kube_client: KubeClient) -> Self {
	Self{
	    kube_client: kube_client,
	}
    }

    fn api(&self, kind: Kind, namespace: &str) -> KubeApi<KubeDynamicObject> {
	KubeApi::namespaced_with(self.kube_client.clone(), namespace, &kind.api_resource())
    }
}

#[async_trait]
impl Store for KubeStore {

    async fn get(&self, kind: Kind, namespace: &str, name: &str) -> Result<Option<Value>, StoreError> {
	match self.api(kind, namespace).get_opt(name).await? {
	    Some(obj) => Ok(Some(serde_json::to_value(&obj)?)),
	    None => Ok(None),
	}
    }

    async fn patch(&self, kind: Kind, namespace: &str, name: &str, body: &Value, subresource: Option<Subresource>) -> Result<(), StoreError> {
	let api = self.api(kind, namespace);
	let opts = KubePatchParams::default();
	let patch = KubePatch::Merge(body);

	match subresource {
	    Some(Subresource::Status) => api.patch_status(name, &opts, &patch).await?,
	    None => api.patch(name, &opts, &patch).await?,
	};

	Ok(())
    }

    fn watch(&self, kind: Kind, namespace: &str, name: &str) -> UpdateStream {
	let config = KubeWatcherConfig::default().fields(&format!("metadata.name={}", name));
	let mut last_seen = LastSeen::default();

	kube_watcher(self.api(kind, namespace), config)
	    .default_backoff()
	    .filter_map(move |event| {
		let update = match event {
		    Ok(event) => last_seen.observe(event),
		    Err(err) => Some(Err(StoreError::Watch(err))),
		};

		futures::future::ready(update)
	    })
	    .boxed()
    }
}
