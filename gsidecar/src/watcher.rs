use crate::session::{SessionCell, SessionDetails};
use crate::store::{Kind, Store, Update};
use gameserver_api as api;

use api::Field;
use api::GameServerState;
use api::GameServerView;
use futures::StreamExt;
use log;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;

/*
 * One-shot stop signal for a watch. Stopping more than once is a no-op.
 */
#[derive(Clone, Debug)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopHandle {
    fn default() -> Self {
	Self::new()
    }
}

impl StopHandle {

    pub fn new() -> Self {
	let (tx, _rx) = watch::channel(false);
	Self{
	    tx: Arc::new(tx),
	}
    }

    pub fn stop(&self) {
	self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
	*self.tx.borrow()
    }

    /* resolves once stop() was called, immediately if it already was */
    pub async fn stopped(&self) {
	let mut rx = self.tx.subscribe();
	// the sender lives in self, so the channel cannot close under us
	let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ignored,
    Allocated,

    // the cell had already moved past Active
    Refused,
}

/*
 * Watches this game server's own record, waiting for the allocator to
 * move it from StandingBy to Active. When that happens the session
 * details are handed to the SessionCell and the watch is closed: the edge
 * happens once per pod.
 */
pub struct AllocationWatcher {
    name: String,
    namespace: String,

    store: Arc<dyn Store>,
    session: SessionCell,
    stop: StopHandle,
}

fn or_empty(field: Field<String>, what: &str) -> String {
    match field {
	Field::Present(value) => value,
	Field::Absent => {
	    log::warn!("{} does not exist on the allocated GameServer", what);
	    String::new()
	},
	Field::Malformed(err) => {
	    log::warn!("error getting {}: {}", what, err);
	    String::new()
	},
    }
}

fn state_of(view: &GameServerView, which: &str) -> Option<String> {
    match &view.state {
	Field::Present(state) => Some(state.clone()),
	Field::Absent => {
	    log::warn!("{} state does not exist", which);
	    None
	},
	Field::Malformed(err) => {
	    log::error!("error getting {} state: {}", which, err);
	    None
	},
    }
}

impl AllocationWatcher {

    pub fn new(store: Arc<dyn Store>, name: &str, namespace: &str, session: SessionCell) -> Self {
	Self{
	    name: name.to_string(),
	    namespace: namespace.to_string(),

	    store: store,
	    session: session,
	    stop: StopHandle::new(),
	}
    }

    pub fn stop_handle(&self) -> StopHandle {
	self.stop.clone()
    }

    /*
     * Consume updates until the allocation shows up, the stop handle is
     * signalled or the store ends the stream.
     */
    pub async fn run(&self) {
	if self.stop.is_stopped() {
	    return;
	}

	log::info!("Watching GameServer {}/{} for allocation", self.namespace, self.name);
	let mut updates = self.store.watch(Kind::GameServer, &self.namespace, &self.name);

	loop {
	    tokio::select! {
		_ = self.stop.stopped() => {
		    log::info!("Watch on GameServer {}/{} stopped", self.namespace, self.name);
		    break;
		},
		update = updates.next() => match update {
		    Some(Ok(Update{ old, new })) => {
			self.on_update(&old, &new).await;
		    },
		    Some(Err(err)) => {
			log::warn!("Error watching GameServer {}/{}: {}", self.namespace, self.name, err);
		    },
		    None => {
			log::warn!("Watch on GameServer {}/{} ended", self.namespace, self.name);
			break;
		    },
		},
	    }
	}
    }

    /*
     * Handle one (old, new) pair. Updates arriving after the allocation
     * was handled are ignored.
     */
    pub async fn on_update(&self, old: &Value, new: &Value) -> Outcome {
	if self.stop.is_stopped() {
	    return Outcome::Ignored;
	}

	let old_view = GameServerView::from_record(old);
	let new_view = GameServerView::from_record(new);

	let (old_state, new_state) = match (state_of(&old_view, "old"), state_of(&new_view, "new")) {
	    (Some(old_state), Some(new_state)) => (old_state, new_state),
	    _ => return Outcome::Ignored,
	};

	log::info!("GameServer {} updated: {} -> {}", self.name, old_state, new_state);

	if old_state != GameServerState::StandingBy.as_str() || new_state != GameServerState::Active.as_str() {
	    return Outcome::Ignored;
	}

	let session_id = or_empty(new_view.session_id, "sessionID");
	let session_cookie = or_empty(new_view.session_cookie, "sessionCookie");
	log::info!("Got values from allocation, sessionID: {}, sessionCookie: {}", session_id, session_cookie);

	let initial_players = self.initial_players().await;
	log::info!("Got values from allocation, initialPlayers: {:?}", initial_players);

	let published = self.session.publish(SessionDetails{
	    state: GameServerState::Active,
	    session_id: session_id,
	    session_cookie: session_cookie,
	    initial_players: Some(initial_players),
	});

	// no more state changes are expected, spare the API server the watch
	self.stop.stop();

	if !published {
	    log::error!("Allocation of GameServer {}/{} arrived after the session ended, ignoring it", self.namespace, self.name);
	    return Outcome::Refused;
	}

	Outcome::Allocated
    }

    async fn initial_players(&self) -> Vec<String> {
	let detail = match self.store.get(Kind::GameServerDetail, &self.namespace, &self.name).await {
	    Ok(Some(detail)) => detail,
	    Ok(None) => {
		log::warn!("GameServerDetail {}/{} does not exist", self.namespace, self.name);
		return vec![];
	    },
	    Err(err) => {
		log::warn!("error getting initial players details: {}", err);
		return vec![];
	    },
	};

	match api::gameserverdetail::initial_players_of(&detail) {
	    Field::Present(players) => players,
	    Field::Absent => {
		log::warn!("initial players does not exist");
		vec![]
	    },
	    Field::Malformed(err) => {
		log::warn!("error getting initial players: {}", err);
		vec![]
	    },
	}
    }
}
