use serde::{Deserialize, Serialize};

/// Network location of a remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAddr {
    pub host: String,
    pub port: String,
}

impl PeerAddr {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
        }
    }

    /// Splits a `proto://host:port/path` URL into the address and its path
    /// component. Returns `None` when the URL has no host part.
    pub fn from_url(url: &str) -> Option<(PeerAddr, String)> {
        let rest = match url.find("://") {
            Some(at) => &url[at + 3..],
            None => url,
        };
        let (authority, path) = match rest.find('/') {
            Some(at) => (&rest[..at], rest[at..].to_string()),
            None => (rest, String::from("/")),
        };
        if authority.is_empty() {
            return None;
        }
        let (host, port) = match authority.rfind(':') {
            Some(at) => (&authority[..at], &authority[at + 1..]),
            None => (authority, ""),
        };
        if host.is_empty() {
            return None;
        }
        Some((PeerAddr::new(host, port), path))
    }
}

/// Per-instance endpoint bookkeeping: where this instance listens, where the
/// peer sends from, and where the peer can be reached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEndpoint {
    pub path: String,
    pub source: Option<PeerAddr>,
    pub target: Option<PeerAddr>,
}

impl RemoteEndpoint {
    pub fn clear(&mut self) {
        self.path.clear();
        self.source = None;
        self.target = None;
    }

    pub fn is_attached(&self) -> bool {
        self.target.is_some()
    }
}
