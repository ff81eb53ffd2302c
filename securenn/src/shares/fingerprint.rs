use super::ring::RingVec;
use crate::execution::session::SessionId;
use siphasher::sip::SipHasher13;
use std::hash::{Hash, Hasher};

/// Structural identity of a tensor.
///
/// Tensors entering a session (shared inputs, dealt randomness, opened values)
/// get a leaf id from the session counter. Everything computed from them hashes
/// the operation together with its operands, so every party arrives at the same
/// fingerprint for the same computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    fn hasher(domain: &str) -> SipHasher13 {
        let mut hasher = SipHasher13::new_with_keys(0, 0);
        domain.hash(&mut hasher);
        hasher
    }

    pub fn leaf(session_id: SessionId, counter: u64) -> Self {
        let mut hasher = Self::hasher("leaf");
        session_id.0.hash(&mut hasher);
        counter.hash(&mut hasher);
        Fingerprint(hasher.finish())
    }

    pub fn derive(op: &str, operands: &[Fingerprint], params: &[u64]) -> Self {
        let mut hasher = Self::hasher(op);
        operands.hash(&mut hasher);
        params.hash(&mut hasher);
        Fingerprint(hasher.finish())
    }

    /// Content hash for values every party knows in full, such as constants.
    pub fn of_public(value: &RingVec) -> Self {
        let mut hasher = Self::hasher("public");
        value.ring().hash(&mut hasher);
        value.values().hash(&mut hasher);
        Fingerprint(hasher.finish())
    }
}
