use kube_derive::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/*
 * Lifecycle of a game server process, as reported by the process on every
 * heartbeat and mirrored on the GameServer record.
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum GameServerState {
    /* nothing was reported yet */
    Invalid,

    Initializing,

    /*
     * initialised and ready to be handed a session by the allocator
     */
    StandingBy,

    /*
     * allocated: a session is bound to this process
     */
    Active,

    Terminating,
    Terminated,
}

impl GameServerState {

    /*
     * Position of the state along Invalid -> Active -> Terminating|Terminated.
     * Everything before allocation shares the same rank.
     */
    pub fn rank(&self) -> u8 {
	match self {
	    GameServerState::Invalid
		| GameServerState::Initializing
		| GameServerState::StandingBy => 0,
	    GameServerState::Active => 1,
	    GameServerState::Terminating
		| GameServerState::Terminated => 2,
	}
    }

    pub fn as_str(&self) -> &'static str {
	match self {
	    GameServerState::Invalid => "Invalid",
	    GameServerState::Initializing => "Initializing",
	    GameServerState::StandingBy => "StandingBy",
	    GameServerState::Active => "Active",
	    GameServerState::Terminating => "Terminating",
	    GameServerState::Terminated => "Terminated",
	}
    }
}

impl fmt::Display for GameServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
	f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown game server state `{0}`")]
pub struct UnknownState(pub String);

impl FromStr for GameServerState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
	let state = match s {
	    "Invalid" => GameServerState::Invalid,
	    "Initializing" => GameServerState::Initializing,
	    "StandingBy" => GameServerState::StandingBy,
	    "Active" => GameServerState::Active,
	    "Terminating" => GameServerState::Terminating,
	    "Terminated" => GameServerState::Terminated,
	    other => return Err(UnknownState(other.to_string())),
	};

	Ok(state)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PortToExpose {
    pub container_name: Option<String>,
    pub port_name: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct BuildMetadataItem {
    pub key: String,
    pub value: String,
}

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(group = "mps.playfab.com", version = "v1alpha1", kind = "GameServer", namespaced)]
#[kube(status = "GameServerStatus", shortname = "gs")]
pub struct GameServerSpec {

    #[serde(rename = "titleID")]
    pub title_id: Option<String>,

    #[serde(rename = "buildID")]
    pub build_id: Option<String>,

    // container/port name pairs exposed on the node
    #[serde(rename = "portsToExpose")]
    pub ports_to_expose: Option<Vec<PortToExpose>>,

    #[serde(rename = "buildMetadata")]
    pub build_metadata: Option<Vec<BuildMetadataItem>>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct GameServerStatus {

    // free form, usually Healthy or Unhealthy
    pub health: Option<String>,

    // one of GameServerState, as a string
    pub state: Option<String>,

    #[serde(rename = "publicIP")]
    pub public_ip: Option<String>,

    pub ports: Option<String>,

    // written by the allocator
    #[serde(rename = "sessionID")]
    pub session_id: Option<String>,

    #[serde(rename = "sessionCookie")]
    pub session_cookie: Option<String>,
}

/*
 * Merge patch for the status subresource. Health and state always travel
 * together so nobody observes one without the other.
 */
pub fn health_and_state_patch(health: &str, state: GameServerState) -> Value {
    serde_json::json!({
	"status": {
	    "health": health,
	    "state": state.as_str(),
	}
    })
}

/*
 * Result of looking a field up inside a schema-less record: either it is
 * there with the expected type, it is not there at all, or something else
 * sits at that path.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    Present(T),
    Absent,
    Malformed(String),
}

impl<T> Field<T> {

    pub fn present(&self) -> Option<&T> {
	match self {
	    Field::Present(v) => Some(v),
	    _ => None,
	}
    }

    pub fn into_option(self) -> Option<T> {
	match self {
	    Field::Present(v) => Some(v),
	    _ => None,
	}
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
	Value::Null => "null",
	Value::Bool(_) => "bool",
	Value::Number(_) => "number",
	Value::String(_) => "string",
	Value::Array(_) => "array",
	Value::Object(_) => "object",
    }
}

/*
 * Walk `path` inside `record`. A null leaf counts as absent, same as a
 * missing key; a non-object in the middle of the path is malformed.
 */
fn nested<'a>(record: &'a Value, path: &[&str]) -> Field<&'a Value> {
    let mut current = record;

    for (depth, key) in path.iter().enumerate() {
	let obj = match current {
	    Value::Object(obj) => obj,
	    other => {
		let at = path[..depth].join(".");
		return Field::Malformed(format!("{} is a {}, expected an object", at, kind_of(other)));
	    }
	};

	current = match obj.get(*key) {
	    Some(Value::Null) | None => return Field::Absent,
	    Some(v) => v,
	};
    }

    Field::Present(current)
}

pub fn nested_str(record: &Value, path: &[&str]) -> Field<String> {
    match nested(record, path) {
	Field::Present(Value::String(s)) => Field::Present(s.clone()),
	Field::Present(other) => Field::Malformed(format!("{} is a {}, expected a string", path.join("."), kind_of(other))),
	Field::Absent => Field::Absent,
	Field::Malformed(msg) => Field::Malformed(msg),
    }
}

pub fn nested_str_list(record: &Value, path: &[&str]) -> Field<Vec<String>> {
    let items = match nested(record, path) {
	Field::Present(Value::Array(items)) => items,
	Field::Present(other) => {
	    return Field::Malformed(format!("{} is a {}, expected an array", path.join("."), kind_of(other)));
	},
	Field::Absent => return Field::Absent,
	Field::Malformed(msg) => return Field::Malformed(msg),
    };

    let mut list = Vec::with_capacity(items.len());
    for item in items {
	match item {
	    Value::String(s) => list.push(s.clone()),
	    other => {
		return Field::Malformed(format!("{} holds a {}, expected strings", path.join("."), kind_of(other)));
	    }
	}
    }

    Field::Present(list)
}

/*
 * The part of a GameServer record the sidecar cares about, read without
 * decoding the whole object against a schema.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameServerView {
    pub name: Field<String>,
    pub state: Field<String>,
    pub health: Field<String>,
    pub session_id: Field<String>,
    pub session_cookie: Field<String>,
}

impl GameServerView {

    pub fn from_record(record: &Value) -> Self {
	Self{
	    name: nested_str(record, &["metadata", "name"]),
	    state: nested_str(record, &["status", "state"]),
	    health: nested_str(record, &["status", "health"]),
	    session_id: nested_str(record, &["status", "sessionID"]),
	    session_cookie: nested_str(record, &["status", "sessionCookie"]),
	}
    }

    /*
     * The reported state parsed into a GameServerState, if it is one we
     * know about.
     */
    pub fn game_state(&self) -> Option<GameServerState> {
	self.state.present().and_then(|s| s.parse().ok())
    }
}
