//! Session configuration

/// Hub configuration
#[derive(Clone, Debug)]
pub struct HubConfig {
    /// Shared session password, compared during the handshake
    pub password: String,
    /// Maximum simultaneous peers
    pub max_peers: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        HubConfig {
            password: String::new(),
            max_peers: 64,
        }
    }
}

/// Peer configuration
#[derive(Clone, Debug)]
pub struct PeerConfig {
    /// Display name sent during the handshake
    pub name: String,
    /// Shared session password
    pub password: String,
}

impl Default for PeerConfig {
    fn default() -> Self {
        PeerConfig {
            name: "anonymous".into(),
            password: String::new(),
        }
    }
}
