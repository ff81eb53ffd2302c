use super::{
    fingerprint::Fingerprint,
    ring::{Ring, RingVec},
};
use crate::{error::Error, execution::player::Role};

/// This party's additive share of a secret vector.
///
/// The shares held by `Server0` and `Server1` sum to the secret modulo the
/// ring. The crypto producer takes part in every protocol step but holds no
/// share, so its view always carries zeros of the right length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrivateTensor {
    share:       RingVec,
    is_scaled:   bool,
    fingerprint: Fingerprint,
}

/// A vector known in the clear to both servers.
///
/// Constants and values the producer dealt itself are known to all three
/// parties. Values opened only between the servers are zeros in the
/// producer's view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicTensor {
    value:       RingVec,
    is_scaled:   bool,
    fingerprint: Fingerprint,
}

/// A private tensor `x` bundled with a dealt mask `a` and the opened
/// difference `e = x - a`, ready to be fed into any number of Beaver
/// multiplications without masking again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskedTensor {
    pub(crate) unmasked:    PrivateTensor,
    pub(crate) mask:        PrivateTensor,
    pub(crate) masked:      PublicTensor,
    /// The mask in the clear; only the producer that dealt it has one.
    pub(crate) dealer_mask: Option<RingVec>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tensor {
    Public(PublicTensor),
    Private(PrivateTensor),
    Masked(MaskedTensor),
}

fn check_scaling(left: bool, right: bool) -> Result<(), Error> {
    if left != right {
        return Err(Error::ScalingMismatch);
    }
    Ok(())
}

impl PrivateTensor {
    pub(crate) fn new(share: RingVec, is_scaled: bool, fingerprint: Fingerprint) -> Self {
        PrivateTensor {
            share,
            is_scaled,
            fingerprint,
        }
    }

    pub fn ring(&self) -> Ring {
        self.share.ring()
    }

    pub fn len(&self) -> usize {
        self.share.len()
    }

    pub fn is_empty(&self) -> bool {
        self.share.is_empty()
    }

    pub fn is_scaled(&self) -> bool {
        self.is_scaled
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// This party's share.
    pub fn share(&self) -> &RingVec {
        &self.share
    }

    pub(crate) fn with_fingerprint(mut self, fingerprint: Fingerprint) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    pub(crate) fn with_scaling(mut self, is_scaled: bool) -> Self {
        self.is_scaled = is_scaled;
        self
    }

    fn derived(&self, share: RingVec, is_scaled: bool, op: &str, others: &[Fingerprint]) -> Self {
        let mut operands = vec![self.fingerprint];
        operands.extend_from_slice(others);
        PrivateTensor::new(share, is_scaled, Fingerprint::derive(op, &operands, &[]))
    }

    pub fn add(&self, other: &PrivateTensor) -> Result<PrivateTensor, Error> {
        check_scaling(self.is_scaled, other.is_scaled)?;
        let share = self.share.add(&other.share)?;
        Ok(self.derived(share, self.is_scaled, "add", &[other.fingerprint]))
    }

    pub fn sub(&self, other: &PrivateTensor) -> Result<PrivateTensor, Error> {
        check_scaling(self.is_scaled, other.is_scaled)?;
        let share = self.share.sub(&other.share)?;
        Ok(self.derived(share, self.is_scaled, "sub", &[other.fingerprint]))
    }

    pub fn neg(&self) -> PrivateTensor {
        self.derived(self.share.neg(), self.is_scaled, "neg", &[])
    }

    /// Multiplies by a public integer constant; the scaling is unchanged.
    pub fn scale(&self, factor: u64) -> PrivateTensor {
        PrivateTensor::new(
            self.share.scale(factor),
            self.is_scaled,
            Fingerprint::derive("scale", &[self.fingerprint], &[factor]),
        )
    }

    /// `x + p`: only `Server0` folds the public value into its share.
    pub fn add_public(&self, other: &PublicTensor, role: Role) -> Result<PrivateTensor, Error> {
        check_scaling(self.is_scaled, other.is_scaled)?;
        self.share.check_compatible(&other.value)?;
        let share = match role {
            Role::Server0 => self.share.add(&other.value)?,
            Role::Server1 | Role::CryptoProducer => self.share.clone(),
        };
        Ok(self.derived(share, self.is_scaled, "add", &[other.fingerprint]))
    }

    /// `x - p`
    pub fn sub_public(&self, other: &PublicTensor, role: Role) -> Result<PrivateTensor, Error> {
        check_scaling(self.is_scaled, other.is_scaled)?;
        self.share.check_compatible(&other.value)?;
        let share = match role {
            Role::Server0 => self.share.sub(&other.value)?,
            Role::Server1 | Role::CryptoProducer => self.share.clone(),
        };
        Ok(self.derived(share, self.is_scaled, "sub", &[other.fingerprint]))
    }

    /// `p - x`
    pub fn rsub_public(&self, other: &PublicTensor, role: Role) -> Result<PrivateTensor, Error> {
        check_scaling(self.is_scaled, other.is_scaled)?;
        self.share.check_compatible(&other.value)?;
        let share = match role {
            Role::Server0 => other.value.sub(&self.share)?,
            Role::Server1 | Role::CryptoProducer => self.share.neg(),
        };
        Ok(PrivateTensor::new(
            share,
            self.is_scaled,
            Fingerprint::derive("sub", &[other.fingerprint, self.fingerprint], &[]),
        ))
    }

    /// Local product with a public vector. The result is scaled if either
    /// factor is; truncation is left to the caller.
    pub fn mul_public(&self, other: &PublicTensor) -> Result<PrivateTensor, Error> {
        let share = self.share.mul(&other.value)?;
        Ok(self.derived(
            share,
            self.is_scaled || other.is_scaled,
            "mul",
            &[other.fingerprint],
        ))
    }

    /// Representation lift of each party's own share into `target`.
    ///
    /// This does not preserve the shared value in general; callers correct for
    /// the wrap of the two shares themselves.
    pub fn lift(&self, target: Ring) -> PrivateTensor {
        PrivateTensor::new(
            self.share.lift(target),
            self.is_scaled,
            Fingerprint::derive("lift", &[self.fingerprint], &[target.modulus() as u64]),
        )
    }

    /// Adds a term only this party knows, e.g. a wrap correction.
    pub(crate) fn add_local(&self, term: &RingVec) -> Result<PrivateTensor, Error> {
        let share = self.share.add(term)?;
        Ok(self.derived(share, self.is_scaled, "add_local", &[]))
    }
}

impl PublicTensor {
    /// A value every party knows in full.
    pub fn new(value: RingVec, is_scaled: bool) -> Self {
        let fingerprint = Fingerprint::of_public(&value);
        PublicTensor {
            value,
            is_scaled,
            fingerprint,
        }
    }

    pub fn constant(ring: Ring, len: usize, value: u64) -> Self {
        PublicTensor::new(RingVec::constant(ring, len, value), false)
    }

    /// A value opened during the protocol, identified by the session.
    pub(crate) fn opened(value: RingVec, is_scaled: bool, fingerprint: Fingerprint) -> Self {
        PublicTensor {
            value,
            is_scaled,
            fingerprint,
        }
    }

    pub fn ring(&self) -> Ring {
        self.value.ring()
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn is_scaled(&self) -> bool {
        self.is_scaled
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn value(&self) -> &RingVec {
        &self.value
    }

    pub fn values(&self) -> &[u64] {
        self.value.values()
    }

    fn derived(&self, value: RingVec, is_scaled: bool, op: &str, others: &[Fingerprint]) -> Self {
        let mut operands = vec![self.fingerprint];
        operands.extend_from_slice(others);
        PublicTensor::opened(value, is_scaled, Fingerprint::derive(op, &operands, &[]))
    }

    pub fn add(&self, other: &PublicTensor) -> Result<PublicTensor, Error> {
        check_scaling(self.is_scaled, other.is_scaled)?;
        let value = self.value.add(&other.value)?;
        Ok(self.derived(value, self.is_scaled, "add", &[other.fingerprint]))
    }

    pub fn sub(&self, other: &PublicTensor) -> Result<PublicTensor, Error> {
        check_scaling(self.is_scaled, other.is_scaled)?;
        let value = self.value.sub(&other.value)?;
        Ok(self.derived(value, self.is_scaled, "sub", &[other.fingerprint]))
    }

    pub fn mul(&self, other: &PublicTensor) -> Result<PublicTensor, Error> {
        let value = self.value.mul(&other.value)?;
        Ok(self.derived(
            value,
            self.is_scaled || other.is_scaled,
            "mul",
            &[other.fingerprint],
        ))
    }

    pub fn neg(&self) -> PublicTensor {
        self.derived(self.value.neg(), self.is_scaled, "neg", &[])
    }

    pub fn scale(&self, factor: u64) -> PublicTensor {
        PublicTensor::opened(
            self.value.scale(factor),
            self.is_scaled,
            Fingerprint::derive("scale", &[self.fingerprint], &[factor]),
        )
    }

    pub fn lsb(&self, target: Ring) -> PublicTensor {
        PublicTensor::opened(
            self.value.lsb(target),
            false,
            Fingerprint::derive("lsb", &[self.fingerprint], &[target.modulus() as u64]),
        )
    }

    /// Signed right shift by `bits`, used after multiplying two scaled values.
    pub fn truncate(&self, bits: u32) -> PublicTensor {
        let ring = self.ring();
        let values = self
            .value
            .values()
            .iter()
            .map(|&v| {
                let shifted = ring.to_signed(v) >> bits;
                ring.reduce(shifted.rem_euclid(ring.modulus() as i128) as u128)
            })
            .collect();
        PublicTensor::opened(
            RingVec::new(ring, values),
            self.is_scaled,
            Fingerprint::derive("truncate", &[self.fingerprint], &[bits as u64]),
        )
    }
}

impl MaskedTensor {
    pub fn unmasked(&self) -> &PrivateTensor {
        &self.unmasked
    }

    pub fn ring(&self) -> Ring {
        self.unmasked.ring()
    }

    pub fn len(&self) -> usize {
        self.unmasked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unmasked.is_empty()
    }

    pub fn is_scaled(&self) -> bool {
        self.unmasked.is_scaled()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.unmasked.fingerprint()
    }
}

impl Tensor {
    pub fn ring(&self) -> Ring {
        match self {
            Tensor::Public(x) => x.ring(),
            Tensor::Private(x) => x.ring(),
            Tensor::Masked(x) => x.ring(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Tensor::Public(x) => x.len(),
            Tensor::Private(x) => x.len(),
            Tensor::Masked(x) => x.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_scaled(&self) -> bool {
        match self {
            Tensor::Public(x) => x.is_scaled(),
            Tensor::Private(x) => x.is_scaled(),
            Tensor::Masked(x) => x.is_scaled(),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        match self {
            Tensor::Public(x) => x.fingerprint(),
            Tensor::Private(x) => x.fingerprint(),
            Tensor::Masked(x) => x.fingerprint(),
        }
    }

    pub fn add(&self, other: &Tensor, role: Role) -> Result<Tensor, Error> {
        Ok(match (self, other) {
            (Tensor::Public(a), Tensor::Public(b)) => Tensor::Public(a.add(b)?),
            (Tensor::Public(a), Tensor::Private(y)) => Tensor::Private(y.add_public(a, role)?),
            (Tensor::Public(a), Tensor::Masked(y)) => {
                Tensor::Private(y.unmasked.add_public(a, role)?)
            }
            (Tensor::Private(x), Tensor::Public(b)) => Tensor::Private(x.add_public(b, role)?),
            (Tensor::Masked(x), Tensor::Public(b)) => {
                Tensor::Private(x.unmasked.add_public(b, role)?)
            }
            (Tensor::Private(x), Tensor::Private(y)) => Tensor::Private(x.add(y)?),
            (Tensor::Private(x), Tensor::Masked(y)) => Tensor::Private(x.add(&y.unmasked)?),
            (Tensor::Masked(x), Tensor::Private(y)) => Tensor::Private(x.unmasked.add(y)?),
            (Tensor::Masked(x), Tensor::Masked(y)) => {
                Tensor::Private(x.unmasked.add(&y.unmasked)?)
            }
        })
    }

    pub fn sub(&self, other: &Tensor, role: Role) -> Result<Tensor, Error> {
        Ok(match (self, other) {
            (Tensor::Public(a), Tensor::Public(b)) => Tensor::Public(a.sub(b)?),
            (Tensor::Public(a), Tensor::Private(y)) => Tensor::Private(y.rsub_public(a, role)?),
            (Tensor::Public(a), Tensor::Masked(y)) => {
                Tensor::Private(y.unmasked.rsub_public(a, role)?)
            }
            (Tensor::Private(x), Tensor::Public(b)) => Tensor::Private(x.sub_public(b, role)?),
            (Tensor::Masked(x), Tensor::Public(b)) => {
                Tensor::Private(x.unmasked.sub_public(b, role)?)
            }
            (Tensor::Private(x), Tensor::Private(y)) => Tensor::Private(x.sub(y)?),
            (Tensor::Private(x), Tensor::Masked(y)) => Tensor::Private(x.sub(&y.unmasked)?),
            (Tensor::Masked(x), Tensor::Private(y)) => Tensor::Private(x.unmasked.sub(y)?),
            (Tensor::Masked(x), Tensor::Masked(y)) => {
                Tensor::Private(x.unmasked.sub(&y.unmasked)?)
            }
        })
    }

    pub fn scale(&self, factor: u64) -> Tensor {
        match self {
            Tensor::Public(x) => Tensor::Public(x.scale(factor)),
            Tensor::Private(x) => Tensor::Private(x.scale(factor)),
            Tensor::Masked(x) => Tensor::Private(x.unmasked.scale(factor)),
        }
    }
}

impl From<PublicTensor> for Tensor {
    fn from(x: PublicTensor) -> Self {
        Tensor::Public(x)
    }
}

impl From<PrivateTensor> for Tensor {
    fn from(x: PrivateTensor) -> Self {
        Tensor::Private(x)
    }
}

impl From<MaskedTensor> for Tensor {
    fn from(x: MaskedTensor) -> Self {
        Tensor::Masked(x)
    }
}

impl TryFrom<Tensor> for PrivateTensor {
    type Error = Error;

    fn try_from(x: Tensor) -> Result<Self, Error> {
        match x {
            Tensor::Public(_) => Err(Error::ExpectedPrivate),
            Tensor::Private(x) => Ok(x),
            Tensor::Masked(x) => Ok(x.unmasked),
        }
    }
}
