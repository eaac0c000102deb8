mod errors;
mod heartbeat;
mod session;
mod store;
mod watcher;

#[cfg(test)]
mod testutil;

use errors::Error;
use heartbeat::SidecarManager;
use session::SessionCell;
use store::{KubeStore, Store};
use watcher::AllocationWatcher;

use clap::Parser;
use kube::Client as KubeClient;
use log;
use std::future::IntoFuture;
use std::io::Write;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(author, version, about = "Heartbeat sidecar for a game server pod")]
struct Args {
    /// Name of the GameServer record owned by this pod
    #[arg(long, env = "PF_GAMESERVER_NAME")]
    name: String,

    /// Namespace of the GameServer record
    #[arg(long, env = "PF_GAMESERVER_NAMESPACE")]
    namespace: String,

    /// Address the heartbeat endpoint listens on
    #[arg(long, env = "SIDECAR_BIND_ADDRESS", default_value = "127.0.0.1")]
    bind: String,

    /// Port the heartbeat endpoint listens on
    #[arg(long, env = "SIDECAR_PORT", default_value_t = heartbeat::SIDECAR_PORT)]
    port: u16,

    /// Trace every heartbeat at debug level
    #[arg(long, env = "LOG_EVERY_HEARTBEAT")]
    log_every_heartbeat: bool,
}

/*
 * Level comes from LOG_LEVEL (info when unset). Every line carries the
 * namespace/name of the game server, several sidecars share a node's logs.
 */
fn init_logger(args: &Args) {
    let owner = format!("{}/{}", args.namespace, args.name);
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", "info");

    env_logger::Builder::from_env(env)
	.format(move |buf, record| {
	    writeln!(buf, "[{} {} {}] {}", buf.timestamp(), record.level(), owner, record.args())
	})
	.init();
}

/*
 * Program design:
 *
 *  1. Serve heartbeats from the game server process.
 *  2. Watch our own GameServer until the allocator makes it Active.
 *  3. Keep serving until we are told to stop.
 */
#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();
    init_logger(&args);

    let kube_client = KubeClient::try_default().await?;
    let store: Arc<dyn Store> = Arc::new(KubeStore::new(kube_client));
    let session = SessionCell::new();

    let watcher = AllocationWatcher::new(store.clone(), &args.name, &args.namespace, session.clone());
    let mgr = SidecarManager::new(store, &args.name, &args.namespace, session, args.log_every_heartbeat);

    let address = format!("{}:{}", args.bind, args.port);
    let listener = TcpListener::bind(&address).await?;
    log::info!("starting sidecar for GameServer {}/{} on {}", args.namespace, args.name, address);

    let server = axum::serve(listener, heartbeat::router(Arc::new(mgr))).into_future();
    let watch = async {
	watcher.run().await;

	// the allocation was seen (or the watch gave up), heartbeats go on
	std::future::pending::<()>().await
    };

    tokio::select! {
	res = server => res?,
	_ = watch => {},

	// handle CTRL^C as gracefully as we can.
	_ = tokio::signal::ctrl_c() => {
	    log::info!("shutting down");
	},
    }
    watcher.stop_handle().stop();

    Ok(())
}
