use crate::errors::Error;
use gameserver_api as api;

use std::collections::BTreeMap;

/*
 * Inputs handed to the init container by the pod spec.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GsdkEnv {
    pub name: String,
    pub namespace: String,
    pub heartbeat_endpoint_port: String,
    pub node_internal_ip: String,
    pub gsdk_config_file: String,
    pub shared_content_folder: String,
    pub certificate_folder: String,
    pub server_log_directory: String,
    pub vm_id: String,
    pub game_ports: String,
    pub build_metadata: Option<String>,
}

impl GsdkEnv {

    pub fn from_env() -> Result<Self, Error> {
	Self::from_lookup(|key| std::env::var(key).ok())
    }

    /*
     * Read every input through `lookup`. Empty values count as unset, and
     * all missing inputs are reported at once.
     */
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
	F: Fn(&str) -> Option<String>,
    {
	let mut missing = vec![];
	let mut required = |key: &'static str| -> String {
	    match lookup(key).filter(|v| !v.is_empty()) {
		Some(value) => value,
		None => {
		    missing.push(key);
		    String::new()
		}
	    }
	};

	let env = GsdkEnv{
	    name: required("PF_GAMESERVER_NAME"),
	    namespace: required("PF_GAMESERVER_NAMESPACE"),
	    heartbeat_endpoint_port: required("HEARTBEAT_ENDPOINT_PORT"),
	    node_internal_ip: required("PF_NODE_INTERNAL_IP"),
	    gsdk_config_file: required("GSDK_CONFIG_FILE"),
	    shared_content_folder: required("PF_SHARED_CONTENT_FOLDER"),
	    certificate_folder: required("CERTIFICATE_FOLDER"),
	    server_log_directory: required("PF_SERVER_LOG_DIRECTORY"),
	    vm_id: required("PF_VM_ID"),
	    game_ports: required("PF_GAMESERVER_PORTS"),
	    build_metadata: lookup("PF_GAMESERVER_BUILD_METADATA").filter(|v| !v.is_empty()),
	};

	if !missing.is_empty() {
	    return Err(Error::MissingEnv(missing));
	}
	Ok(env)
    }
}

fn parse_port(entry: &str, what: &str, value: &str) -> Result<u16, Error> {
    value.parse::<u16>().map_err(|err| Error::InvalidPort{
	entry: entry.to_string(),
	reason: format!("{} `{}`: {}", what, value, err),
    })
}

/*
 * Ports come as `name,containerPort,hostPort` entries separated by `?`,
 * much like `docker run -p`. Empty entries are skipped.
 */
pub fn parse_ports(ports: &str) -> Result<Vec<api::GamePort>, Error> {
    let mut parsed = vec![];

    for entry in ports.split('?').filter(|e| !e.is_empty()) {
	let fields: Vec<&str> = entry.split(',').collect();
	if fields.len() != 3 {
	    return Err(Error::InvalidPort{
		entry: entry.to_string(),
		reason: String::from("expected name,containerPort,hostPort"),
	    });
	}

	parsed.push(api::GamePort{
	    name: fields[0].to_string(),
	    server_listening_port: parse_port(entry, "containerPort", fields[1])?,
	    client_connection_port: parse_port(entry, "hostPort", fields[2])?,
	});
    }

    Ok(parsed)
}

/*
 * `key,value` pairs separated by `?`. A later key wins over an earlier one.
 */
pub fn parse_build_metadata(metadata: &str) -> Result<BTreeMap<String, String>, Error> {
    let mut parsed = BTreeMap::new();

    for entry in metadata.split('?').filter(|e| !e.is_empty()) {
	match entry.split_once(',') {
	    Some((key, value)) => {
		parsed.insert(key.to_string(), value.to_string());
	    },
	    None => return Err(Error::InvalidMetadata(entry.to_string())),
	}
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn canonical_env() -> HashMap<&'static str, String> {
	HashMap::from([
	    ("PF_GAMESERVER_NAME", String::from("testGameServerName")),
	    ("PF_GAMESERVER_NAMESPACE", String::from("testGameServerNamespace")),
	    ("HEARTBEAT_ENDPOINT_PORT", String::from("56001")),
	    ("PF_NODE_INTERNAL_IP", String::from("127.0.0.1")),
	    ("GSDK_CONFIG_FILE", String::from("/tmp/GsdkConfig.json")),
	    ("PF_SHARED_CONTENT_FOLDER", String::from("testSharedContentFolder")),
	    ("CERTIFICATE_FOLDER", String::from("testCertificateFolder")),
	    ("PF_SERVER_LOG_DIRECTORY", String::from("testLogDirectory")),
	    ("PF_VM_ID", String::from("testVmId")),
	    ("PF_GAMESERVER_PORTS", String::from("portName,80,10000?portName2,443,10001")),
	    ("PF_GAMESERVER_BUILD_METADATA", String::from("key1,value1?key2,value2")),
	])
    }

    fn port(name: &str, container: u16, host: u16) -> api::GamePort {
	api::GamePort{
	    name: name.to_string(),
	    server_listening_port: container,
	    client_connection_port: host,
	}
    }

    #[test]
    fn reads_all_inputs() {
	let vars = canonical_env();
	let env = GsdkEnv::from_lookup(|k| vars.get(k).cloned()).unwrap();

	assert_eq!(env.name, "testGameServerName");
	assert_eq!(env.node_internal_ip, "127.0.0.1");
	assert_eq!(env.build_metadata.as_deref(), Some("key1,value1?key2,value2"));
    }

    #[test]
    fn reports_every_missing_input() {
	let mut vars = canonical_env();
	vars.remove("PF_VM_ID");
	vars.insert("GSDK_CONFIG_FILE", String::new());

	let err = GsdkEnv::from_lookup(|k| vars.get(k).cloned()).unwrap_err();

	match err {
	    Error::MissingEnv(missing) => assert_eq!(missing, vec!["GSDK_CONFIG_FILE", "PF_VM_ID"]),
	    other => panic!("unexpected error {:?}", other),
	}
    }

    #[test]
    fn build_metadata_is_optional() {
	let mut vars = canonical_env();
	vars.remove("PF_GAMESERVER_BUILD_METADATA");

	let env = GsdkEnv::from_lookup(|k| vars.get(k).cloned()).unwrap();
	assert_eq!(env.build_metadata, None);
    }

    #[test]
    fn ports_are_parsed_in_order() {
	let ports = parse_ports("gameport,80,10000?udp,443,10001").unwrap();

	assert_eq!(ports, vec![port("gameport", 80, 10000), port("udp", 443, 10001)]);
    }

    #[test]
    fn blank_port_entries_are_skipped() {
	let ports = parse_ports("?gameport,80,10000??").unwrap();

	assert_eq!(ports, vec![port("gameport", 80, 10000)]);
	assert!(parse_ports("").unwrap().is_empty());
    }

    #[test]
    fn bad_ports_are_rejected() {
	assert!(matches!(parse_ports("gameport,eighty,10000"), Err(Error::InvalidPort{ .. })));
	assert!(matches!(parse_ports("gameport,80,"), Err(Error::InvalidPort{ .. })));
	assert!(matches!(parse_ports("gameport,80"), Err(Error::InvalidPort{ .. })));
	assert!(matches!(parse_ports("gameport,80,70000"), Err(Error::InvalidPort{ .. })));
    }

    #[test]
    fn later_metadata_wins() {
	let metadata = parse_build_metadata("key1,value1??key2,value2?key1,other").unwrap();

	assert_eq!(metadata.len(), 2);
	assert_eq!(metadata["key1"], "other");
	assert_eq!(metadata["key2"], "value2");
    }

    #[test]
    fn metadata_values_keep_commas() {
	let metadata = parse_build_metadata("tags,a,b").unwrap();

	assert_eq!(metadata["tags"], "a,b");
	assert!(matches!(parse_build_metadata("novalue"), Err(Error::InvalidMetadata(_))));
    }
}
