/*
 * Wire types exchanged between the game server process (through its GSDK)
 * and the sidecar on every heartbeat.
 */

use crate::gameserver::GameServerState;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedPlayer {
    #[serde(default, alias = "PlayerId")]
    pub player_id: String,
}

/*
 * GSDKs in the wild send both camelCase and PascalCase keys, accept either.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    #[serde(default, alias = "CurrentGameState")]
    pub current_game_state: String,

    #[serde(default, alias = "CurrentGameHealth")]
    pub current_game_health: String,

    #[serde(default, alias = "CurrentPlayers")]
    pub current_players: Option<Vec<ConnectedPlayer>>,
}

/* A heartbeat that passed validation */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    pub state: GameServerState,
    pub health: String,

    // player ids, in the order the process reported them
    pub players: Vec<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {

    #[error("{}", .0.join(" - "))]
    Missing(Vec<&'static str>),

    #[error("{0}")]
    UnknownState(#[from] crate::gameserver::UnknownState),
}

impl HeartbeatRequest {

    pub fn validate(&self) -> Result<Heartbeat, ValidationError> {
	let mut missing = vec![];

	if self.current_game_health.is_empty() {
	    missing.push("CurrentGameHealth cannot be empty");
	}
	if self.current_game_state.is_empty() {
	    missing.push("CurrentGameState cannot be empty");
	}
	if !missing.is_empty() {
	    return Err(ValidationError::Missing(missing));
	}

	let state = self.current_game_state.parse::<GameServerState>()?;
	let players = self.current_players
	    .iter()
	    .flatten()
	    .map(|p| p.player_id.clone())
	    .collect();

	Ok(Heartbeat{
	    state: state,
	    health: self.current_game_health.clone(),
	    players: players,
	})
    }
}

/*
 * What the process should do next.
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameOperation {
    Continue,
    Active,
    Terminate,
}

impl From<GameServerState> for GameOperation {
    fn from(state: GameServerState) -> Self {
	match state {
	    GameServerState::Invalid
		| GameServerState::Initializing
		| GameServerState::StandingBy => GameOperation::Continue,
	    GameServerState::Active => GameOperation::Active,
	    GameServerState::Terminating
		| GameServerState::Terminated => GameOperation::Terminate,
	}
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    pub session_id: String,
    pub session_cookie: String,

    // null until an allocation hands over a list
    pub initial_players: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    pub operation: GameOperation,
    pub session_config: SessionConfig,
}
