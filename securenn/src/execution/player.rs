use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

/// Runtime identity of party.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(pub String);

impl Default for Identity {
    fn default() -> Self {
        Identity("test_identity".to_string())
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Identity(s.to_string())
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Identity(s)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Protocol role of a party.
///
/// The two servers hold the additive shares. The crypto producer deals
/// correlated randomness and answers masked queries, never holding a share.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Server0,
    Server1,
    CryptoProducer,
}

pub const NUM_PARTIES: usize = 3;

impl Role {
    pub const ALL: [Role; NUM_PARTIES] = [Role::Server0, Role::Server1, Role::CryptoProducer];

    pub fn new(index: usize) -> Result<Self, Error> {
        Role::ALL.get(index).copied().ok_or(Error::Id(index))
    }

    pub fn index(&self) -> usize {
        match self {
            Role::Server0 => 0,
            Role::Server1 => 1,
            Role::CryptoProducer => 2,
        }
    }

    /// Next party in the PRF ring `Server0 -> Server1 -> CryptoProducer`.
    pub fn next(&self) -> Role {
        Role::ALL[(self.index() + 1) % NUM_PARTIES]
    }

    pub fn prev(&self) -> Role {
        Role::ALL[(self.index() + NUM_PARTIES - 1) % NUM_PARTIES]
    }

    /// The other computing party.
    pub fn peer(&self) -> Result<Role, Error> {
        match self {
            Role::Server0 => Ok(Role::Server1),
            Role::Server1 => Ok(Role::Server0),
            Role::CryptoProducer => Err(Error::WrongRole(*self, "server pair")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Server0 => f.write_str("server0"),
            Role::Server1 => f.write_str("server1"),
            Role::CryptoProducer => f.write_str("crypto_producer"),
        }
    }
}

pub type RoleAssignment = HashMap<Role, Identity>;
