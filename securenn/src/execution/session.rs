use crate::{
    execution::player::{Identity, Role, RoleAssignment},
    network::{value::NetworkValue, Networking},
    protocol::{config::ProtocolConfig, prf::Prf},
    shares::{fingerprint::Fingerprint, ring::RingVec},
};
use eyre::eyre;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::trace;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u128);

impl From<u128> for SessionId {
    fn from(id: u128) -> Self {
        SessionId(id)
    }
}

pub type NetworkingImpl = Arc<dyn Networking + Send + Sync>;

/// A session before its PRF keys are agreed.
#[derive(Clone)]
pub struct BootSession {
    pub session_id:       SessionId,
    pub role_assignments: Arc<RoleAssignment>,
    pub networking:       NetworkingImpl,
    pub own_identity:     Identity,
    pub own_role:         Role,
}

/// Everything one party needs to run protocols: its place in the role
/// assignment, its channels, its PRF state and the protocol parameters.
///
/// Protocols take `&mut Session`, so one invocation at a time owns the PRF
/// streams of a party.
pub struct Session {
    pub boot_session: BootSession,
    pub prf:          Prf,
    pub config:       ProtocolConfig,
    tensor_counter:   u64,
}

pub trait SessionHandles {
    fn session_id(&self) -> SessionId;
    fn own_role(&self) -> Role;
    fn own_identity(&self) -> Identity;
    fn identity(&self, role: &Role) -> eyre::Result<&Identity>;
    fn network(&self) -> &NetworkingImpl;
}

impl SessionHandles for BootSession {
    fn session_id(&self) -> SessionId {
        self.session_id
    }

    fn own_role(&self) -> Role {
        self.own_role
    }

    fn own_identity(&self) -> Identity {
        self.own_identity.clone()
    }

    fn identity(&self, role: &Role) -> eyre::Result<&Identity> {
        match self.role_assignments.get(role) {
            Some(id) => Ok(id),
            None => Err(eyre!("Couldn't find role {role} in role assignment map")),
        }
    }

    fn network(&self) -> &NetworkingImpl {
        &self.networking
    }
}

impl SessionHandles for Session {
    fn session_id(&self) -> SessionId {
        self.boot_session.session_id
    }

    fn own_role(&self) -> Role {
        self.boot_session.own_role
    }

    fn own_identity(&self) -> Identity {
        self.boot_session.own_identity()
    }

    fn identity(&self, role: &Role) -> eyre::Result<&Identity> {
        self.boot_session.identity(role)
    }

    fn network(&self) -> &NetworkingImpl {
        self.boot_session.network()
    }
}

impl BootSession {
    pub async fn send(&self, to: Role, value: &NetworkValue) -> eyre::Result<()> {
        let receiver = self.identity(&to)?;
        trace!(target: "securenn::network", from = %self.own_role, to = %to, "send");
        self.networking
            .send(value.to_network()?, receiver, &self.session_id)
            .await
    }

    pub async fn receive(&self, from: Role) -> eyre::Result<NetworkValue> {
        let sender = self.identity(&from)?;
        let bytes = self.networking.receive(sender, &self.session_id).await?;
        trace!(target: "securenn::network", from = %from, to = %self.own_role, "receive");
        NetworkValue::from_network(&bytes)
    }
}

impl Session {
    pub fn new(boot_session: BootSession, prf: Prf, config: ProtocolConfig) -> Self {
        Session {
            boot_session,
            prf,
            config,
            tensor_counter: 0,
        }
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub async fn send(&self, to: Role, value: &NetworkValue) -> eyre::Result<()> {
        self.boot_session.send(to, value).await
    }

    pub async fn receive(&self, from: Role) -> eyre::Result<NetworkValue> {
        self.boot_session.receive(from).await
    }

    pub async fn send_ring_vec(&self, to: Role, value: &RingVec) -> eyre::Result<()> {
        self.send(to, &NetworkValue::RingVec(value.clone())).await
    }

    pub async fn receive_ring_vec(&self, from: Role) -> eyre::Result<RingVec> {
        Ok(self.receive(from).await?.into_ring_vec()?)
    }

    /// Mints the identity of a tensor entering the session. All parties call
    /// this in the same order, so the ids agree.
    pub(crate) fn next_fingerprint(&mut self) -> Fingerprint {
        self.tensor_counter += 1;
        Fingerprint::leaf(self.session_id(), self.tensor_counter)
    }
}
