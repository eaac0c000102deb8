use crate::gameserver::{nested_str_list, Field};

use kube_derive::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/*
 * Companion of a GameServer (same name and namespace) holding the player
 * lists, which would otherwise bloat the GameServer status.
 */
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(group = "mps.playfab.com", version = "v1alpha1", kind = "GameServerDetail", namespaced)]
#[kube(shortname = "gsd")]
#[serde(rename_all = "camelCase")]
pub struct GameServerDetailSpec {

    // players the allocator asked for
    pub initial_players: Option<Vec<String>>,

    pub connected_players_count: Option<u32>,

    pub connected_players: Option<Vec<String>>,
}

pub fn initial_players_of(record: &Value) -> Field<Vec<String>> {
    nested_str_list(record, &["spec", "initialPlayers"])
}

/*
 * Merge patch for the connected players of a GameServerDetail. The list
 * is always sent in full, even when empty, so it replaces the stored one.
 */
pub fn connected_players_patch(players: &[String]) -> Value {
    json!({
	"spec": {
	    "connectedPlayersCount": players.len(),
	    "connectedPlayers": players,
	}
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_players_patch_keeps_order() {
	let players = vec!["p2".to_string(), "p1".to_string()];

	assert_eq!(
	    connected_players_patch(&players),
	    json!({"spec": {"connectedPlayersCount": 2, "connectedPlayers": ["p2", "p1"]}})
	);
	assert_eq!(
	    connected_players_patch(&[]),
	    json!({"spec": {"connectedPlayersCount": 0, "connectedPlayers": []}})
	);
    }

    #[test]
    fn initial_players_from_detail_record() {
	let detail = GameServerDetail::new("gs-1", GameServerDetailSpec{
	    initial_players: Some(vec!["p1".to_string(), "p2".to_string()]),
	    ..Default::default()
	});
	let record = serde_json::to_value(&detail).unwrap();

	assert_eq!(initial_players_of(&record), Field::Present(vec!["p1".to_string(), "p2".to_string()]));
	assert_eq!(initial_players_of(&json!({"spec": {}})), Field::Absent);
    }
}
