//! Bit extraction and the comparisons built on top of it.
//!
//! Every operation runs through a [`Comparator`], which memoizes the bits it
//! extracts for the lifetime of one top-level call. The free functions at the
//! bottom of this module each open a fresh comparator, so randomness is never
//! shared between unrelated invocations.

use crate::{
    error::Error,
    execution::{
        player::Role,
        session::{Session, SessionHandles},
    },
    protocol::{
        boolean, private_compare::private_compare, secure_random::random_bits,
        share_convert::share_convert, sharing,
    },
    shares::{
        fingerprint::Fingerprint,
        ring::{Ring, RingVec},
        tensor::{PrivateTensor, PublicTensor, Tensor},
    },
};
use eyre::Result;
use rand::Rng;
use std::collections::HashMap;
use tracing::{instrument, trace};

pub struct Comparator<'s> {
    session: &'s mut Session,
    memo:    HashMap<Fingerprint, PrivateTensor>,
    hits:    usize,
}

impl<'s> Comparator<'s> {
    pub fn new(session: &'s mut Session) -> Self {
        Comparator {
            session,
            memo: HashMap::new(),
            hits: 0,
        }
    }

    /// Number of sub-results served from the memo so far.
    pub fn cache_hits(&self) -> usize {
        self.hits
    }

    fn cached(&mut self, key: Fingerprint) -> Option<PrivateTensor> {
        let hit = self.memo.get(&key).cloned();
        if hit.is_some() {
            self.hits += 1;
            trace!(target: "securenn::comparison", ?key, "memo hit");
        }
        hit
    }

    fn remember(&mut self, key: Fingerprint, value: PrivateTensor) -> PrivateTensor {
        let value = value.with_fingerprint(key);
        self.memo.insert(key, value.clone());
        value
    }

    /// Least significant bit of `y`, shared over `out`.
    pub async fn lsb(&mut self, y: &Tensor, out: Ring) -> Result<Tensor> {
        Ok(match y {
            Tensor::Public(p) => p.lsb(out).into(),
            Tensor::Private(p) => self.lsb_private(p, out).await?.into(),
            Tensor::Masked(m) => self.lsb_private(m.unmasked(), out).await?.into(),
        })
    }

    /// Most significant bit of `y`, i.e. whether its signed value is
    /// negative. Only defined over odd rings, where it equals `lsb(2y)`.
    pub async fn msb(&mut self, y: &Tensor) -> Result<Tensor> {
        let ring = y.ring();
        Ok(match y {
            Tensor::Public(p) => {
                check_odd(ring)?;
                p.scale(2).lsb(ring).into()
            }
            Tensor::Private(p) => self.msb_private(p, ring).await?.into(),
            Tensor::Masked(m) => self.msb_private(m.unmasked(), ring).await?.into(),
        })
    }

    /// 1 where `x` is negative. Power-of-two inputs are converted to the odd
    /// ring first; there the result is exact for every value but `-2^(k-1)`.
    pub async fn negative(&mut self, x: &Tensor) -> Result<Tensor> {
        Ok(match x {
            Tensor::Public(p) => public_negative(p).into(),
            Tensor::Private(p) => self.negative_private(p).await?.into(),
            Tensor::Masked(m) => self.negative_private(m.unmasked()).await?.into(),
        })
    }

    pub async fn non_negative(&mut self, x: &Tensor) -> Result<Tensor> {
        let negative = self.negative(x).await?;
        boolean::not(self.session, &negative)
    }

    pub async fn less(&mut self, x: &Tensor, y: &Tensor) -> Result<Tensor> {
        let difference = x.sub(y, self.session.own_role())?;
        self.negative(&difference).await
    }

    pub async fn greater(&mut self, x: &Tensor, y: &Tensor) -> Result<Tensor> {
        let difference = y.sub(x, self.session.own_role())?;
        self.negative(&difference).await
    }

    pub async fn less_equal(&mut self, x: &Tensor, y: &Tensor) -> Result<Tensor> {
        let greater = self.greater(x, y).await?;
        boolean::not(self.session, &greater)
    }

    pub async fn greater_equal(&mut self, x: &Tensor, y: &Tensor) -> Result<Tensor> {
        let less = self.less(x, y).await?;
        boolean::not(self.session, &less)
    }

    /// `x` where `bit` is 0 and `y` where it is 1.
    pub async fn select_share(&mut self, x: &Tensor, y: &Tensor, bit: &Tensor) -> Result<Tensor> {
        let role = self.session.own_role();
        let offset = sharing::mul(self.session, bit, &y.sub(x, role)?).await?;
        Ok(x.add(&offset, role)?)
    }

    pub async fn relu(&mut self, x: &Tensor) -> Result<Tensor> {
        let keep = self.non_negative(x).await?;
        sharing::mul(self.session, &keep, x).await
    }

    pub fn divide(&self, _x: &Tensor, _y: &Tensor) -> Result<Tensor> {
        Err(Error::Unsupported("divide").into())
    }

    pub fn max_pool(&self, _x: &Tensor) -> Result<Tensor> {
        Err(Error::Unsupported("max_pool").into())
    }

    pub fn dmax_pool(&self, _x: &Tensor) -> Result<Tensor> {
        Err(Error::Unsupported("dmax_pool").into())
    }

    #[instrument(level = "debug", target = "securenn::comparison", skip_all, fields(role = %self.session.own_role(), len = y.len()))]
    async fn lsb_private(&mut self, y: &PrivateTensor, out: Ring) -> Result<PrivateTensor> {
        let key = Fingerprint::derive("lsb", &[y.fingerprint()], &[out.modulus() as u64]);
        if let Some(hit) = self.cached(key) {
            return Ok(hit);
        }

        let session = &mut *self.session;
        let role = session.own_role();
        let ring = y.ring();
        let prime = session.config().prime_ring;
        let width = session.config().bits();
        let len = y.len();
        if ring.bits() as usize > width {
            return Err(Error::BitWidthMismatch {
                expected: width,
                actual:   ring.bits() as usize,
            }
            .into());
        }

        // The producer deals a uniform mask together with its bits and parity.
        let dealt = match role {
            Role::CryptoProducer => {
                let mask = ring.sample_uniform(session.prf.local_rng(), len);
                Some((mask.to_bits(width, prime), mask.lsb(out), mask))
            }
            Role::Server0 | Role::Server1 => None,
        };
        let mask = sharing::deal(session, ring, len, dealt.as_ref().map(|(_, _, m)| m.values())).await?;
        let mask_bits = sharing::deal(
            session,
            prime,
            len * width,
            dealt.as_ref().map(|(bits, _, _)| bits.values()),
        )
        .await?;
        let mask_lsb =
            sharing::deal(session, out, len, dealt.as_ref().map(|(_, lsb, _)| lsb.values())).await?;

        let flip = if ring.is_odd() {
            Some(sample_flip(session, out, len).await?)
        } else {
            None
        };

        let masked = sharing::reveal(session, &y.clone().with_scaling(false).add(&mask)?).await?;
        let parity =
            boolean::xor(session, &mask_lsb.into(), &masked.lsb(out).into()).await?;

        // Over an odd ring the sum wrapped iff mask > masked, which flips the
        // parity once more.
        let bit = match flip {
            Some(flip) => {
                let compared = private_compare(session, &mask_bits, &masked, &flip, out).await?;
                let wrapped = boolean::xor(session, &compared.into(), &flip.into()).await?;
                boolean::xor(session, &wrapped, &parity).await?
            }
            None => parity,
        };
        Ok(self.remember(key, PrivateTensor::try_from(bit)?))
    }

    async fn msb_private(&mut self, y: &PrivateTensor, out: Ring) -> Result<PrivateTensor> {
        check_odd(y.ring())?;
        let key = Fingerprint::derive("msb", &[y.fingerprint()], &[out.modulus() as u64]);
        if let Some(hit) = self.cached(key) {
            return Ok(hit);
        }
        let bit = self.lsb_private(&y.scale(2), out).await?;
        Ok(self.remember(key, bit))
    }

    async fn negative_private(&mut self, x: &PrivateTensor) -> Result<PrivateTensor> {
        let ring = x.ring();
        let key = Fingerprint::derive("negative", &[x.fingerprint()], &[]);
        if let Some(hit) = self.cached(key) {
            return Ok(hit);
        }
        let bit = match ring {
            Ring::PowerOfTwo { .. } => {
                // Conversion maps 2^k - 1 to 0. Shifting by one sends 0 there,
                // which still reads as non-negative; only -2^(k-1) changes sign.
                let role = self.session.own_role();
                let one = PublicTensor::constant(ring, x.len(), 1);
                let shifted = x.clone().with_scaling(false).sub_public(&one, role)?;
                let converted = share_convert(self.session, &shifted).await?;
                self.msb_private(&converted, ring).await?
            }
            Ring::Odd { .. } | Ring::Prime { .. } => self.msb_private(x, ring).await?,
        };
        Ok(self.remember(key, bit))
    }
}

fn check_odd(ring: Ring) -> Result<(), Error> {
    if !ring.is_odd() {
        return Err(Error::EvenModulus(ring));
    }
    Ok(())
}

fn public_negative(x: &PublicTensor) -> PublicTensor {
    let ring = x.ring();
    let bits = x
        .values()
        .iter()
        .map(|&v| (ring.to_signed(v) < 0) as u64)
        .collect();
    PublicTensor::opened(
        RingVec::new(ring, bits),
        false,
        Fingerprint::derive("negative", &[x.fingerprint()], &[]),
    )
}

/// A public random bit vector drawn by one server, picked with the servers'
/// common randomness, and sent to the other.
async fn sample_flip(session: &mut Session, ring: Ring, len: usize) -> Result<PublicTensor> {
    let fingerprint = session.next_fingerprint();
    let role = session.own_role();
    let bits = match role {
        Role::Server0 | Role::Server1 => {
            let chooser = if session.prf.pair_rng(role)?.gen::<bool>() {
                Role::Server0
            } else {
                Role::Server1
            };
            if chooser == role {
                let seed = session.prf.secure_seed();
                let bits = random_bits(&seed, ring, len)?;
                session.send_ring_vec(role.peer()?, &bits).await?;
                bits
            } else {
                let bits = session.receive_ring_vec(chooser).await?;
                bits.check_compatible(&RingVec::zeros(ring, len))?;
                bits
            }
        }
        Role::CryptoProducer => RingVec::zeros(ring, len),
    };
    Ok(PublicTensor::opened(bits, false, fingerprint))
}

pub async fn lsb(session: &mut Session, y: &Tensor, out: Ring) -> Result<Tensor> {
    Comparator::new(session).lsb(y, out).await
}

pub async fn msb(session: &mut Session, y: &Tensor) -> Result<Tensor> {
    Comparator::new(session).msb(y).await
}

pub async fn negative(session: &mut Session, x: &Tensor) -> Result<Tensor> {
    Comparator::new(session).negative(x).await
}

pub async fn non_negative(session: &mut Session, x: &Tensor) -> Result<Tensor> {
    Comparator::new(session).non_negative(x).await
}

pub async fn less(session: &mut Session, x: &Tensor, y: &Tensor) -> Result<Tensor> {
    Comparator::new(session).less(x, y).await
}

pub async fn greater(session: &mut Session, x: &Tensor, y: &Tensor) -> Result<Tensor> {
    Comparator::new(session).greater(x, y).await
}

pub async fn less_equal(session: &mut Session, x: &Tensor, y: &Tensor) -> Result<Tensor> {
    Comparator::new(session).less_equal(x, y).await
}

pub async fn greater_equal(session: &mut Session, x: &Tensor, y: &Tensor) -> Result<Tensor> {
    Comparator::new(session).greater_equal(x, y).await
}

pub async fn select_share(
    session: &mut Session,
    x: &Tensor,
    y: &Tensor,
    bit: &Tensor,
) -> Result<Tensor> {
    Comparator::new(session).select_share(x, y, bit).await
}

pub async fn relu(session: &mut Session, x: &Tensor) -> Result<Tensor> {
    Comparator::new(session).relu(x).await
}
