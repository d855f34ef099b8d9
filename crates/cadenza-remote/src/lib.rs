//! Remote-control call contract for the Cadenza plugin host.
//!
//! Every state change a plugin instance makes locally is mirrored to zero or
//! more remote observers: a host-wide broadcast listener that tracks all
//! instances, and (for bridged plugins) a private peer on the other side of
//! the process boundary. This crate defines the messages that flow over
//! those two channels and the endpoint bookkeeping used to (re)attach a
//! peer. The wire encoding is owned by the transport collaborator that
//! implements the sink traits; messages derive `Serialize`/`Deserialize` so
//! any such transport can encode them directly.

mod endpoint;
mod messages;

pub use endpoint::{PeerAddr, RemoteEndpoint};
pub use messages::{HostMessage, PeerMessage};

use serde::{Deserialize, Serialize};

/// Numeric slot id of a plugin instance within the host.
///
/// Assigned externally, unique host-wide, and used to validate that inbound
/// control messages target the right instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub i32);

impl InstanceId {
    pub const UNASSIGNED: InstanceId = InstanceId(-1);

    pub fn is_assigned(self) -> bool {
        self.0 >= 0
    }
}

/// Host-wide broadcast channel carrying state updates for every instance.
///
/// Sends are fire-and-forget; observers must tolerate duplicate or stale
/// notifications.
pub trait BroadcastSink: Send + Sync {
    /// Whether a broadcast listener is currently attached. Full resyncs are
    /// skipped while unregistered.
    fn is_registered(&self) -> bool {
        true
    }

    fn send(&self, instance: InstanceId, message: HostMessage);
}

/// Private channel to a single instance's remote counterpart (the bridge
/// peer, or the master host when the instance itself runs inside a bridge).
pub trait PeerSink: Send + Sync {
    fn send(&self, message: PeerMessage);
}
