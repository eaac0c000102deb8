mod config;
mod errors;

use config::GsdkEnv;
use errors::Error;
use gameserver_api as api;

use log;
use std::fs;
use std::path::{Path, PathBuf};

/*
 * Assemble the descriptor the GSDK reads when the game server starts.
 */
fn descriptor(env: &GsdkEnv) -> Result<api::GsdkConfig, Error> {
    let ports = config::parse_ports(&env.game_ports)?;
    let build_metadata = match &env.build_metadata {
	Some(metadata) => config::parse_build_metadata(metadata)?,
	None => Default::default(),
    };

    Ok(api::GsdkConfig::new(
	format!("{}:{}", env.node_internal_ip, env.heartbeat_endpoint_port),
	env.name.clone(),
	env.vm_id.clone(),
	env.server_log_directory.clone(),
	env.certificate_folder.clone(),
	env.shared_content_folder.clone(),
	build_metadata,
	ports,
	// the node's internal IP doubles as the public one
	env.node_internal_ip.clone(),
    ))
}

fn create_dir(path: &Path) -> Result<(), Error> {
    fs::create_dir_all(path).map_err(|err| Error::Io{ path: path.to_path_buf(), source: err })
}

fn write_descriptor(config: &api::GsdkConfig, path: &Path) -> Result<(), Error> {
    if let Some(folder) = path.parent() {
	log::info!("Creating folder(s) {}", folder.display());
	create_dir(folder)?;
    }

    log::info!("Saving GSDK JSON to file {}", path.display());
    let json = serde_json::to_vec(config)?;
    fs::write(path, json).map_err(|err| Error::Io{ path: path.to_path_buf(), source: err })
}

/*
 * Program design specification:
 *
 *  1. Read the pod's environment, fail on anything missing.
 *  2. Make sure the game server's log folder exists.
 *  3. Write the GSDK descriptor where the game server will look for it.
 */
fn run(env: &GsdkEnv) -> Result<PathBuf, Error> {
    let config = descriptor(env)?;

    log::info!("Creating log folder {}", env.server_log_directory);
    create_dir(Path::new(&env.server_log_directory))?;

    let path = PathBuf::from(&env.gsdk_config_file);
    write_descriptor(&config, &path)?;

    Ok(path)
}

fn main() {
    let log_env = env_logger::Env::default().filter_or("LOG_LEVEL", "info");
    env_logger::Builder::from_env(log_env).init();

    let env = match GsdkEnv::from_env() {
	Ok(env) => env,
	Err(err) => {
	    log::error!("{}", err);
	    std::process::exit(1);
	}
    };

    log::info!("Configuring GSDK for GameServer {}/{}", env.namespace, env.name);
    match run(&env) {
	Ok(path) => log::info!("GSDK configuration written to {}", path.display()),
	Err(err) => {
	    log::error!("Unable to configure GSDK for GameServer {}/{}: {}", env.namespace, env.name, err);
	    std::process::exit(1);
	}
    }
}
