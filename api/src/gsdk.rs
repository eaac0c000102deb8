use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const FQDN_NOT_APPLICABLE: &str = "NOT_APPLICABLE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamePort {
    pub name: String,
    pub server_listening_port: u16,
    pub client_connection_port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameServerConnectionInfo {
    pub public_ip_v4_address: String,
    pub game_ports_configuration: Vec<GamePort>,
}

/*
 * Descriptor read by the GSDK inside the game server process when it
 * starts: where to send heartbeats, where to write logs, which ports it
 * was given.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GsdkConfig {
    pub heartbeat_endpoint: String,
    pub session_host_id: String,
    pub vm_id: String,
    pub log_folder: String,
    pub certificate_folder: String,
    pub shared_content_folder: String,
    pub build_metadata: BTreeMap<String, String>,

    // port name -> container port, as a string
    pub game_ports: BTreeMap<String, String>,

    pub public_ip_v4_address: String,
    pub game_server_connection_info: GameServerConnectionInfo,

    // always 0, kept for GSDK compatibility
    pub server_instance_number: u32,

    pub fully_qualified_domain_name: String,
}

impl GsdkConfig {

    /*
     * Fill in the derived parts of the descriptor: the string port map
     * and the connection info both come from `ports`.
     */
    pub fn new(
	heartbeat_endpoint: String,
	session_host_id: String,
	vm_id: String,
	log_folder: String,
	certificate_folder: String,
	shared_content_folder: String,
	build_metadata: BTreeMap<String, String>,
	ports: Vec<GamePort>,
	public_ip: String,
    ) -> Self {
	let game_ports = ports.iter()
	    .map(|p| (p.name.clone(), p.server_listening_port.to_string()))
	    .collect();

	Self{
	    heartbeat_endpoint: heartbeat_endpoint,
	    session_host_id: session_host_id,
	    vm_id: vm_id,
	    log_folder: log_folder,
	    certificate_folder: certificate_folder,
	    shared_content_folder: shared_content_folder,
	    build_metadata: build_metadata,
	    game_ports: game_ports,
	    public_ip_v4_address: public_ip.clone(),
	    game_server_connection_info: GameServerConnectionInfo{
		public_ip_v4_address: public_ip,
		game_ports_configuration: ports,
	    },
	    server_instance_number: 0,
	    fully_qualified_domain_name: FQDN_NOT_APPLICABLE.to_string(),
	}
    }
}
