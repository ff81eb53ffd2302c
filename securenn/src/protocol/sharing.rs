use crate::{
    error::Error,
    execution::{
        player::Role,
        session::{Session, SessionHandles},
    },
    shares::{
        fingerprint::Fingerprint,
        ring::{Ring, RingVec},
        tensor::{MaskedTensor, PrivateTensor, PublicTensor, Tensor},
    },
};
use eyre::Result;
use tracing::instrument;

/// Secret-shares `len` values owned by `owner` between the two servers.
///
/// Only the owner's `values` are read; every other party may pass `None`.
/// The owner samples the share of `Server0` uniformly and derives the share of
/// `Server1` as the difference. The producer ends up with a zero view.
#[instrument(level = "trace", target = "securenn::sharing", skip_all, fields(role = %session.own_role(), owner = %owner, len = len))]
pub async fn share(
    session: &mut Session,
    owner: Role,
    ring: Ring,
    len: usize,
    values: Option<&[u64]>,
    is_scaled: bool,
) -> Result<PrivateTensor> {
    let role = session.own_role();
    let fingerprint = session.next_fingerprint();

    let mut own_share = None;
    if role == owner {
        let values = values.ok_or(Error::MissingInput(owner))?;
        if values.len() != len {
            return Err(Error::LengthMismatch {
                expected: len,
                actual:   values.len(),
            }
            .into());
        }
        let secret = RingVec::new(ring, values.to_vec());
        let share0 = ring.sample_uniform(session.prf.local_rng(), len);
        let share1 = secret.sub(&share0)?;
        match owner {
            Role::Server0 => {
                session.send_ring_vec(Role::Server1, &share1).await?;
                own_share = Some(share0);
            }
            Role::Server1 => {
                session.send_ring_vec(Role::Server0, &share0).await?;
                own_share = Some(share1);
            }
            Role::CryptoProducer => {
                session.send_ring_vec(Role::Server0, &share0).await?;
                session.send_ring_vec(Role::Server1, &share1).await?;
            }
        }
    }

    let share = match (own_share, role) {
        (Some(share), _) => share,
        (None, Role::CryptoProducer) => RingVec::zeros(ring, len),
        (None, _) => {
            let share = session.receive_ring_vec(owner).await?;
            if share.ring() != ring {
                return Err(Error::RingMismatch {
                    left:  ring,
                    right: share.ring(),
                }
                .into());
            }
            if share.len() != len {
                return Err(Error::LengthMismatch {
                    expected: len,
                    actual:   share.len(),
                }
                .into());
            }
            share
        }
    };
    Ok(PrivateTensor::new(share, is_scaled, fingerprint))
}

/// Shares values the crypto producer generated.
pub async fn deal(
    session: &mut Session,
    ring: Ring,
    len: usize,
    values: Option<&[u64]>,
) -> Result<PrivateTensor> {
    share(session, Role::CryptoProducer, ring, len, values, false).await
}

/// Shares fixed-point encoded reals; the result is scaled.
pub async fn share_fixed(
    session: &mut Session,
    owner: Role,
    len: usize,
    values: Option<&[f64]>,
) -> Result<PrivateTensor> {
    let ring = session.config().base_ring;
    let encoded = values.map(|v| session.config().fixed_point.encode(ring, v));
    share(
        session,
        owner,
        ring,
        len,
        encoded.as_ref().map(|v| v.values()),
        true,
    )
    .await
}

/// Opens `x` to both servers. The producer's result is all zeros.
#[instrument(level = "trace", target = "securenn::sharing", skip_all, fields(role = %session.own_role(), len = x.len()))]
pub async fn reveal(session: &mut Session, x: &PrivateTensor) -> Result<PublicTensor> {
    let fingerprint = session.next_fingerprint();
    let value = match session.own_role() {
        role @ (Role::Server0 | Role::Server1) => {
            let peer = role.peer()?;
            session.send_ring_vec(peer, x.share()).await?;
            let other = session.receive_ring_vec(peer).await?;
            x.share().add(&other)?
        }
        Role::CryptoProducer => RingVec::zeros(x.ring(), x.len()),
    };
    Ok(PublicTensor::opened(value, x.is_scaled(), fingerprint))
}

/// What the crypto producer learns from [`reveal_to_producer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProducerOpening {
    pub value: RingVec,
    /// 1 where adding the two server shares wrapped around the modulus.
    pub wrap:  Vec<u64>,
}

/// Opens `x` to the crypto producer only; servers get `None`.
#[instrument(level = "trace", target = "securenn::sharing", skip_all, fields(role = %session.own_role(), len = x.len()))]
pub async fn reveal_to_producer(
    session: &mut Session,
    x: &PrivateTensor,
) -> Result<Option<ProducerOpening>> {
    match session.own_role() {
        Role::Server0 | Role::Server1 => {
            session.send_ring_vec(Role::CryptoProducer, x.share()).await?;
            Ok(None)
        }
        Role::CryptoProducer => {
            let share0 = session.receive_ring_vec(Role::Server0).await?;
            let share1 = session.receive_ring_vec(Role::Server1).await?;
            x.share().check_compatible(&share0)?;
            x.share().check_compatible(&share1)?;
            Ok(Some(ProducerOpening {
                wrap:  share0.compute_wrap(&share1)?,
                value: share0.add(&share1)?,
            }))
        }
    }
}

/// Masks `x` with a dealt uniform `a` and opens `x - a` to the servers.
#[instrument(level = "trace", target = "securenn::sharing", skip_all, fields(role = %session.own_role(), len = x.len()))]
pub async fn mask(session: &mut Session, x: &PrivateTensor) -> Result<MaskedTensor> {
    let ring = x.ring();
    let dealer_mask = match session.own_role() {
        Role::CryptoProducer => Some(ring.sample_uniform(session.prf.local_rng(), x.len())),
        Role::Server0 | Role::Server1 => None,
    };
    let mask = deal(session, ring, x.len(), dealer_mask.as_ref().map(|a| a.values())).await?;
    let difference = x.clone().with_scaling(false).sub(&mask)?;
    let masked = reveal(session, &difference).await?;
    Ok(MaskedTensor {
        unmasked: x.clone(),
        mask,
        masked: PublicTensor::opened(masked.value().clone(), false, masked.fingerprint()),
        dealer_mask,
    })
}

/// Beaver multiplication of two masked tensors.
///
/// With `x = e + a` and `y = f + b`, the producer deals `c = a * b` and the
/// servers compute `z = c + e * b + f * a`, `Server0` adding the public
/// `e * f`. Either operand may be reused across calls.
#[instrument(level = "trace", target = "securenn::sharing", skip_all, fields(role = %session.own_role(), len = x.len()))]
pub async fn mul_masked(
    session: &mut Session,
    x: &MaskedTensor,
    y: &MaskedTensor,
) -> Result<PrivateTensor> {
    x.unmasked.share().check_compatible(y.unmasked.share())?;
    let role = session.own_role();
    let ring = x.ring();

    let triple = match (&x.dealer_mask, &y.dealer_mask) {
        (Some(a), Some(b)) => Some(a.mul(b)?),
        _ => None,
    };
    let c = deal(session, ring, x.len(), triple.as_ref().map(|c| c.values())).await?;

    let e = &x.masked;
    let f = &y.masked;
    let product = c
        .add(&y.mask.mul_public(e)?)?
        .add(&x.mask.mul_public(f)?)?
        .add_public(&e.mul(f)?, role)?;
    Ok(product
        .with_scaling(x.is_scaled() || y.is_scaled())
        .with_fingerprint(Fingerprint::derive(
            "mul",
            &[x.fingerprint(), y.fingerprint()],
            &[],
        )))
}

/// Product of two tensors of any kind. Products of two scaled operands are
/// truncated back to single precision.
#[instrument(level = "trace", target = "securenn::sharing", skip_all, fields(role = %session.own_role(), len = x.len()))]
pub async fn mul(session: &mut Session, x: &Tensor, y: &Tensor) -> Result<Tensor> {
    let product = match (x, y) {
        (Tensor::Public(a), Tensor::Public(b)) => Tensor::Public(a.mul(b)?),
        (Tensor::Public(a), Tensor::Private(s)) | (Tensor::Private(s), Tensor::Public(a)) => {
            Tensor::Private(s.mul_public(a)?)
        }
        (Tensor::Public(a), Tensor::Masked(m)) | (Tensor::Masked(m), Tensor::Public(a)) => {
            Tensor::Private(m.unmasked.mul_public(a)?)
        }
        (Tensor::Private(s), Tensor::Private(t)) => {
            let ms = mask(session, s).await?;
            if s.fingerprint() == t.fingerprint() {
                Tensor::Private(mul_masked(session, &ms, &ms).await?)
            } else {
                let mt = mask(session, t).await?;
                Tensor::Private(mul_masked(session, &ms, &mt).await?)
            }
        }
        (Tensor::Private(s), Tensor::Masked(m)) => {
            let ms = mask(session, s).await?;
            Tensor::Private(mul_masked(session, &ms, m).await?)
        }
        (Tensor::Masked(m), Tensor::Private(s)) => {
            let ms = mask(session, s).await?;
            Tensor::Private(mul_masked(session, m, &ms).await?)
        }
        (Tensor::Masked(m), Tensor::Masked(n)) => Tensor::Private(mul_masked(session, m, n).await?),
    };

    if !(x.is_scaled() && y.is_scaled()) {
        return Ok(product);
    }
    let bits = session.config().fixed_point.fractional_bits;
    Ok(match product {
        Tensor::Public(p) => Tensor::Public(p.truncate(bits)),
        Tensor::Private(p) => Tensor::Private(truncate(&p, bits, session.own_role())?),
        Tensor::Masked(m) => Tensor::Private(truncate(&m.unmasked, bits, session.own_role())?),
    })
}

/// Local two-party truncation by `bits` on a power-of-two ring.
///
/// `Server0` shifts its share, `Server1` shifts the negation of its share and
/// negates back. The result is off by at most one in the last place, and
/// correct with overwhelming probability when the value is far below the
/// modulus.
pub fn truncate(x: &PrivateTensor, bits: u32, role: Role) -> Result<PrivateTensor, Error> {
    let ring = x.ring();
    if !matches!(ring, Ring::PowerOfTwo { .. }) {
        return Err(Error::UnsupportedModulus(format!(
            "truncation needs a power-of-two ring, got {ring}"
        )));
    }
    let values = x
        .share()
        .values()
        .iter()
        .map(|&v| match role {
            Role::Server0 => v >> bits,
            Role::Server1 => ring.neg(ring.neg(v) >> bits),
            Role::CryptoProducer => 0,
        })
        .collect();
    Ok(PrivateTensor::new(
        RingVec::new(ring, values),
        true,
        Fingerprint::derive("truncate", &[x.fingerprint()], &[bits as u64]),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::local::LocalRuntime;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;
    use rstest::rstest;

    fn owned<'a>(role: Role, owner: Role, values: &'a [u64]) -> Option<&'a [u64]> {
        (role == owner).then_some(values)
    }

    #[rstest]
    #[case(Role::Server0)]
    #[case(Role::Server1)]
    #[case(Role::CryptoProducer)]
    #[tokio::test]
    async fn test_share_and_reveal(#[case] owner: Role) -> Result<()> {
        let ring = Ring::PowerOfTwo { bits: 32 };
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let plain: Vec<u64> = (0..16).map(|_| rng.gen::<u32>() as u64).collect();

        let expected = plain.clone();
        let outputs = LocalRuntime::mock_setup()
            .await?
            .run(move |mut session| {
                let plain = plain.clone();
                async move {
                    let role = session.own_role();
                    let x = share(&mut session, owner, ring, 16, owned(role, owner, &plain), false)
                        .await?;
                    if role == Role::CryptoProducer {
                        assert!(x.share().values().iter().all(|&v| v == 0));
                    }
                    Ok((x.share().clone(), reveal(&mut session, &x).await?))
                }
            })
            .await?;

        let sum = outputs[0].0.add(&outputs[1].0)?;
        assert_eq!(sum.values(), expected.as_slice());
        assert_eq!(outputs[0].1.values(), expected.as_slice());
        assert_eq!(outputs[1].1.values(), expected.as_slice());
        assert!(outputs[2].1.values().iter().all(|&v| v == 0));
        // All parties agree on the identity of the opened tensor.
        assert_eq!(outputs[0].1.fingerprint(), outputs[2].1.fingerprint());
        Ok(())
    }

    #[tokio::test]
    async fn test_reveal_to_producer() -> Result<()> {
        let ring = Ring::Odd { bits: 32 };
        let plain = vec![0, 1, (1 << 32) - 2];
        let expected = plain.clone();
        let outputs = LocalRuntime::mock_setup()
            .await?
            .run(move |mut session| {
                let plain = plain.clone();
                async move {
                    let role = session.own_role();
                    let x = share(&mut session, Role::Server1, ring, 3, owned(role, Role::Server1, &plain), false)
                        .await?;
                    let opened = reveal_to_producer(&mut session, &x).await?;
                    Ok((x.share().clone(), opened))
                }
            })
            .await?;
        assert_eq!(outputs[0].1, None);
        assert_eq!(outputs[1].1, None);
        let opened = outputs[2].1.as_ref().unwrap();
        assert_eq!(opened.value.values(), expected.as_slice());
        assert_eq!(opened.wrap, outputs[0].0.compute_wrap(&outputs[1].0)?);
        Ok(())
    }

    #[tokio::test]
    async fn test_share_requires_owner_values() -> Result<()> {
        let result = LocalRuntime::mock_setup()
            .await?
            .run(|mut session| async move {
                let ring = session.config().base_ring;
                share(&mut session, Role::Server0, ring, 2, None, false).await
            })
            .await;
        let err = result.unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::MissingInput(Role::Server0))
        );
        Ok(())
    }

    #[rstest]
    #[case(Ring::PowerOfTwo { bits: 32 })]
    #[case(Ring::Odd { bits: 32 })]
    #[case(Ring::Prime { modulus: 37 })]
    #[tokio::test]
    async fn test_beaver_mul(#[case] ring: Ring) -> Result<()> {
        let x_plain: Vec<i64> = vec![3, -4, 0, 7, -1];
        let y_plain: Vec<i64> = vec![5, 6, -9, -7, -1];
        let x_enc = RingVec::from_signed(ring, &x_plain).into_values();
        let y_enc = RingVec::from_signed(ring, &y_plain).into_values();

        let outputs = LocalRuntime::mock_setup()
            .await?
            .run(move |mut session| {
                let (x_enc, y_enc) = (x_enc.clone(), y_enc.clone());
                async move {
                    let role = session.own_role();
                    let x = share(&mut session, Role::Server0, ring, 5, owned(role, Role::Server0, &x_enc), false).await?;
                    let y = share(&mut session, Role::Server1, ring, 5, owned(role, Role::Server1, &y_enc), false).await?;
                    let z = mul(&mut session, &x.clone().into(), &y.into()).await?;
                    let squared = mul(&mut session, &x.clone().into(), &x.into()).await?;
                    let z = PrivateTensor::try_from(z)?;
                    let squared = PrivateTensor::try_from(squared)?;
                    Ok((
                        reveal(&mut session, &z).await?,
                        reveal(&mut session, &squared).await?,
                    ))
                }
            })
            .await?;

        let expected: Vec<i64> = x_plain.iter().zip(&y_plain).map(|(a, b)| a * b).collect();
        assert_eq!(
            outputs[0].0.value().to_signed(),
            expected.iter().map(|&v| ring.to_signed(ring.from_signed(v))).collect::<Vec<_>>()
        );
        let squares: Vec<i128> = x_plain
            .iter()
            .map(|&a| ring.to_signed(ring.from_signed(a * a)))
            .collect();
        assert_eq!(outputs[1].1.value().to_signed(), squares);
        Ok(())
    }

    #[tokio::test]
    async fn test_masked_operand_is_reused() -> Result<()> {
        let ring = Ring::PowerOfTwo { bits: 32 };
        let outputs = LocalRuntime::mock_setup()
            .await?
            .run(move |mut session| async move {
                let role = session.own_role();
                let x = share(&mut session, Role::Server0, ring, 2, owned(role, Role::Server0, &[2, 3]), false).await?;
                let y = share(&mut session, Role::Server0, ring, 2, owned(role, Role::Server0, &[10, 20]), false).await?;
                let w = share(&mut session, Role::Server1, ring, 2, owned(role, Role::Server1, &[5, 7]), false).await?;
                let masked_x: Tensor = mask(&mut session, &x).await?.into();
                let xy = mul(&mut session, &masked_x, &y.into()).await?;
                let xw = mul(&mut session, &masked_x, &w.into()).await?;
                Ok((
                    reveal(&mut session, &xy.try_into()?).await?,
                    reveal(&mut session, &xw.try_into()?).await?,
                ))
            })
            .await?;
        assert_eq!(outputs[0].0.values(), &[20, 60]);
        assert_eq!(outputs[1].1.values(), &[10, 21]);
        Ok(())
    }

    #[tokio::test]
    async fn test_fixed_point_mul_truncates() -> Result<()> {
        let outputs = LocalRuntime::mock_setup()
            .await?
            .run(|mut session| async move {
                let role = session.own_role();
                let x_in = [1.5, -2.25, 0.5];
                let y_in = [2.0, 4.0, -0.5];
                let x = share_fixed(&mut session, Role::Server0, 3, (role == Role::Server0).then_some(&x_in[..])).await?;
                let y = share_fixed(&mut session, Role::Server1, 3, (role == Role::Server1).then_some(&y_in[..])).await?;
                let z = PrivateTensor::try_from(mul(&mut session, &x.into(), &y.into()).await?)?;
                assert!(z.is_scaled());
                let opened = reveal(&mut session, &z).await?;
                Ok(session.config().fixed_point.decode(opened.value()))
            })
            .await?;
        let expected = [3.0, -9.0, -0.25];
        for (got, want) in outputs[0].iter().zip(expected) {
            assert!((got - want).abs() <= 1.0 / 128.0, "{got} vs {want}");
        }
        Ok(())
    }

    #[test]
    fn test_truncate_rejects_odd_ring() {
        let x = PrivateTensor::new(
            RingVec::zeros(Ring::Odd { bits: 32 }, 1),
            true,
            Fingerprint::leaf(crate::execution::session::SessionId(0), 0),
        );
        assert!(matches!(
            truncate(&x, 8, Role::Server0),
            Err(Error::UnsupportedModulus(_))
        ));
    }
}
