use std::net::SocketAddr;

/// Length of the container id prefix recorded in samples
pub const SHORT_ID_LEN: usize = 10;

/// Truncate a runtime container id to its short prefix.
pub fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

const LISTEN_ADDRESS: &str = "MONITOR_LISTEN_ADDRESS";

/// Listen address from the environment, falling back to `default`.
pub fn get_listen_address(default: SocketAddr) -> SocketAddr {
    let addr_from_env = std::env::var(LISTEN_ADDRESS);
    addr_from_env.map_or(default, |res| res.parse().unwrap_or(default))
}

const DOCKER_SOCKET: &str = "MONITOR_DOCKER_SOCKET";

pub fn get_docker_socket() -> Option<String> {
    std::env::var(DOCKER_SOCKET).ok().filter(|s| !s.is_empty())
}
