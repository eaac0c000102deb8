use crate::errors::Error;
use crate::session::SessionCell;
use crate::store::{Kind, Store, Subresource};
use gameserver_api as api;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::routing::post;
use log;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const SIDECAR_PORT: u16 = 56001;

/*
 * What was last written to the store on behalf of the game server, so
 * heartbeats that change nothing do not turn into patches. Only moves
 * forward once the store accepted the write.
 */
#[derive(Debug, Default)]
struct Remembered {
    state: Option<api::GameServerState>,
    health: String,
    connected_players_count: usize,
}

/*
 * SidecarManager terminates the heartbeats of the game server process,
 * mirrors its health, state and players onto its GameServer and
 * GameServerDetail, and answers with what the allocator decided.
 */
pub struct SidecarManager {
    name: String,
    namespace: String,
    log_every_heartbeat: bool,

    store: Arc<dyn Store>,
    session: SessionCell,

    // held across the patches so concurrent heartbeats apply in turn
    remembered: Mutex<Remembered>,
}

pub fn router(mgr: Arc<SidecarManager>) -> Router {
    Router::new()
	.route("/v1/sessionHosts/{session_host_id}", post(heartbeat_handler))
	.route("/v1/sessionHosts/{session_host_id}/heartbeats", post(heartbeat_handler))
	.with_state(mgr)
}

/*
 * The body is taken raw: GSDKs do not always send a content type, and an
 * empty body has to be a 400 like any other undecodable one.
 */
async fn heartbeat_handler(
    State(mgr): State<Arc<SidecarManager>>,
    Path(session_host_id): Path<String>,
    body: Bytes,
) -> Result<Json<api::HeartbeatResponse>, Error> {
    mgr.heartbeat(&session_host_id, &body).await.map(Json)
}

/*
 * The GSDK retries on its own, a store that is only briefly unavailable is
 * not worth an error line.
 */
fn log_store_failure(err: &Error) {
    match err {
	Error::Store{ source, .. } if source.is_retryable() => log::warn!("{}, will retry on next heartbeat", err),
	_ => log::error!("{}", err),
    }
}

impl SidecarManager {

    pub fn new(store: Arc<dyn Store>, name: &str, namespace: &str, session: SessionCell, log_every_heartbeat: bool) -> Self {
	Self{
	    name: name.to_string(),
	    namespace: namespace.to_string(),
	    log_every_heartbeat: log_every_heartbeat,

	    store: store,
	    session: session,
	    remembered: Mutex::new(Remembered::default()),
	}
    }

    pub async fn heartbeat(&self, session_host_id: &str, body: &[u8]) -> Result<api::HeartbeatResponse, Error> {
	let request: api::HeartbeatRequest = match serde_json::from_slice(body) {
	    Ok(request) => request,
	    Err(err) => {
		log::warn!("cannot deserialize heartbeat from sessionHostId {}: {}", session_host_id, err);
		return Err(Error::BadRequest(format!("cannot deserialize json {}", err)));
	    }
	};

	if self.log_every_heartbeat {
	    log::debug!("heartbeat received from sessionHostId {}, data {:?}", session_host_id, request);
	}

	let hb = match request.validate() {
	    Ok(hb) => hb,
	    Err(err) => {
		log::warn!("error validating heartbeat request {}", err);
		return Err(Error::BadRequest(format!("invalid heartbeat request {}", err)));
	    }
	};

	{
	    let mut remembered = self.remembered.lock().await;

	    if let Err(err) = self.update_health_and_state_if_needed(&mut remembered, &hb).await {
		log_store_failure(&err);
		return Err(err);
	    }

	    if let Err(err) = self.update_connected_players_if_needed(&mut remembered, &hb).await {
		log_store_failure(&err);
		return Err(err);
	    }
	}

	let session = self.session.snapshot();
	Ok(api::HeartbeatResponse{
	    operation: session.operation(),
	    session_config: session.session_config(),
	})
    }

    /*
     * One patch for both fields whenever either of them changed.
     */
    async fn update_health_and_state_if_needed(&self, remembered: &mut Remembered, hb: &api::Heartbeat) -> Result<(), Error> {
	if remembered.health == hb.health && remembered.state == Some(hb.state) {
	    return Ok(());
	}

	log::info!(
	    "Health or state is different than before, updating. Old health {}, new health {}, old state {}, new state {}",
	    remembered.health,
	    hb.health,
	    remembered.state.map(|s| s.as_str()).unwrap_or(""),
	    hb.state,
	);

	let patch = api::gameserver::health_and_state_patch(&hb.health, hb.state);
	if let Err(err) = self.store.patch(Kind::GameServer, &self.namespace, &self.name, &patch, Some(Subresource::Status)).await {
	    return Err(Error::Store{ context: "error updating health", source: err });
	}

	remembered.health = hb.health.clone();
	remembered.state = Some(hb.state);
	Ok(())
    }

    /*
     * Player lists only matter once the game is Active.
     */
    async fn update_connected_players_if_needed(&self, remembered: &mut Remembered, hb: &api::Heartbeat) -> Result<(), Error> {
	if hb.state != api::GameServerState::Active || remembered.connected_players_count == hb.players.len() {
	    return Ok(());
	}

	log::info!(
	    "ConnectedPlayersCount is different than before, updating. Old connectedPlayersCount {}, new connectedPlayersCount {}",
	    remembered.connected_players_count,
	    hb.players.len(),
	);

	let patch = api::gameserverdetail::connected_players_patch(&hb.players);
	if let Err(err) = self.store.patch(Kind::GameServerDetail, &self.namespace, &self.name, &patch, None).await {
	    return Err(Error::Store{ context: "error updating connected players count", source: err });
	}

	remembered.connected_players_count = hb.players.len();
	Ok(())
    }
}
