use gameserver_api as api;

use log;
use std::sync::{Arc, RwLock};

/*
 * What the allocator decided for this game server, as last seen on the
 * GameServer record.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDetails {
    pub state: api::GameServerState,
    pub session_id: String,
    pub session_cookie: String,
    pub initial_players: Option<Vec<String>>,
}

impl Default for SessionDetails {
    fn default() -> Self {
	Self{
	    state: api::GameServerState::Invalid,
	    session_id: String::new(),
	    session_cookie: String::new(),
	    initial_players: None,
	}
    }
}

impl SessionDetails {

    pub fn operation(&self) -> api::GameOperation {
	api::GameOperation::from(self.state)
    }

    pub fn session_config(&self) -> api::SessionConfig {
	api::SessionConfig{
	    session_id: self.session_id.clone(),
	    session_cookie: self.session_cookie.clone(),
	    initial_players: self.initial_players.clone(),
	}
    }
}

/*
 * Process wide holder of the SessionDetails. One writer (the allocation
 * watcher), many readers (heartbeats). Locks are only held to copy in or
 * out.
 */
#[derive(Clone, Default)]
pub struct SessionCell {
    inner: Arc<RwLock<SessionDetails>>,
}

impl SessionCell {

    pub fn new() -> Self {
	Self::default()
    }

    pub fn snapshot(&self) -> SessionDetails {
	match self.inner.read() {
	    Ok(details) => details.clone(),
	    Err(poisoned) => poisoned.into_inner().clone(),
	}
    }

    /*
     * Replace the details, unless that would move the state backwards
     * along Invalid -> Active -> Terminating|Terminated. Returns whether
     * the value was taken.
     */
    pub fn publish(&self, details: SessionDetails) -> bool {
	let mut current = match self.inner.write() {
	    Ok(current) => current,
	    Err(poisoned) => poisoned.into_inner(),
	};

	if details.state.rank() < current.state.rank() {
	    log::warn!("Refusing to move session state back from {} to {}", current.state, details.state);
	    return false;
	}

	*current = details;
	true
    }
}
