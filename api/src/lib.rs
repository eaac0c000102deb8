/*
 * gameserver/api - records, heartbeat protocol and GSDK descriptor shared
 * by the pieces running next to a game server process.
 */

pub mod gameserver;
pub use gameserver::GameServer;
pub use gameserver::GameServerState;
pub use gameserver::GameServerStatus;
pub use gameserver::GameServerView;
pub use gameserver::Field;

pub mod gameserverdetail;
pub use gameserverdetail::GameServerDetail;

pub mod heartbeat;
pub use heartbeat::GameOperation;
pub use heartbeat::Heartbeat;
pub use heartbeat::HeartbeatRequest;
pub use heartbeat::HeartbeatResponse;
pub use heartbeat::SessionConfig;

pub mod gsdk;
pub use gsdk::GamePort;
pub use gsdk::GsdkConfig;
