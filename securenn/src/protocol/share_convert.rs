use crate::{
    error::Error,
    execution::{
        player::Role,
        session::{Session, SessionHandles},
    },
    network::value::NetworkValue,
    protocol::{
        boolean,
        private_compare::private_compare,
        secure_random::random_bits,
        sharing::{deal, reveal_to_producer},
    },
    shares::{
        fingerprint::Fingerprint,
        ring::{Ring, RingVec},
        tensor::{PrivateTensor, PublicTensor, Tensor},
    },
};
use eyre::Result;
use securenn_common::config::MAX_BITS;
use tracing::instrument;

/// What each server knows about the random offset added before the masked
/// reveal. The producer holds zeros of the right shape.
struct Offset {
    /// The full offset, known to both servers.
    sharemask: RingVec,
    /// This server's additive part of the offset.
    part:      RingVec,
    /// Wrap of the two parts; only `Server0` uses it.
    wrap:      RingVec,
    /// Flip bits fed to the comparison, over the odd ring.
    flip:      RingVec,
}

impl Offset {
    fn empty(ring: Ring, odd: Ring, len: usize) -> Self {
        Offset {
            sharemask: RingVec::zeros(ring, len),
            part:      RingVec::zeros(ring, len),
            wrap:      RingVec::zeros(odd, len),
            flip:      RingVec::zeros(odd, len),
        }
    }
}

fn next_ring_vec(parts: &mut impl Iterator<Item = NetworkValue>) -> Result<RingVec, Error> {
    parts
        .next()
        .ok_or(Error::UnexpectedMessage("share conversion offset"))?
        .into_ring_vec()
}

/// Converts shares over `Z_{2^k}` into shares of the same value over
/// `Z_{2^k - 1}`. The value `2^k - 1` has no counterpart and maps to 0.
///
/// The servers blind `x` with an offset known only to them, the producer
/// learns the blinded shares and deals the bits of their sum together with
/// the carry of the addition. A private comparison against the offset then
/// recovers the wrap of the original shares, which each server subtracts from
/// the lift of its share.
#[instrument(level = "debug", target = "securenn::share_convert", skip_all, fields(role = %session.own_role(), len = x.len()))]
pub async fn share_convert(session: &mut Session, x: &PrivateTensor) -> Result<PrivateTensor> {
    let role = session.own_role();
    let ring = x.ring();
    let width = session.config().bits();
    let prime = session.config().prime_ring;
    let len = x.len();

    let Ring::PowerOfTwo { bits } = ring else {
        return Err(Error::UnsupportedModulus(format!(
            "share conversion starts from a power-of-two ring, got {ring}"
        ))
        .into());
    };
    if bits == 0 || bits > MAX_BITS {
        return Err(Error::UnsupportedModulus(format!("{ring}")).into());
    }
    if bits as usize > width {
        return Err(Error::BitWidthMismatch {
            expected: width,
            actual:   bits as usize,
        }
        .into());
    }
    let odd = Ring::odd(bits)?;

    let offset = match role {
        Role::Server0 => {
            let seed = session.prf.secure_seed();
            let flip = random_bits(&seed, odd, len)?;
            let rng = session.prf.local_rng();
            // A zero offset would make the comparison target wrap to 2^k - 1.
            let sharemask = ring.sample_nonzero(rng, len);
            let part = ring.sample_uniform(rng, len);
            let other_part = sharemask.sub(&part)?;
            let wrap = RingVec::new(odd, part.compute_wrap(&other_part)?);
            session
                .send(
                    Role::Server1,
                    &NetworkValue::Vec(vec![
                        NetworkValue::RingVec(sharemask.clone()),
                        NetworkValue::RingVec(other_part),
                        NetworkValue::RingVec(flip.clone()),
                    ]),
                )
                .await?;
            Offset {
                sharemask,
                part,
                wrap,
                flip,
            }
        }
        Role::Server1 => {
            let mut parts = session.receive(Role::Server0).await?.into_vec()?.into_iter();
            let sharemask = next_ring_vec(&mut parts)?;
            let part = next_ring_vec(&mut parts)?;
            let flip = next_ring_vec(&mut parts)?;
            sharemask.check_compatible(x.share())?;
            part.check_compatible(x.share())?;
            Offset {
                sharemask,
                part,
                wrap: RingVec::zeros(odd, len),
                flip,
            }
        }
        Role::CryptoProducer => Offset::empty(ring, odd, len),
    };

    // Blinded shares go to the producer, which deals the bits of their sum
    // and the carry of adding them.
    let own_wrap = RingVec::new(odd, x.share().compute_wrap(&offset.part)?);
    let blinded = x.clone().with_scaling(false).add_local(&offset.part)?;
    let dealt = reveal_to_producer(session, &blinded)
        .await?
        .map(|opened| (opened.value.to_bits(width, prime), opened.wrap));
    let blinded_bits = deal(
        session,
        prime,
        len * width,
        dealt.as_ref().map(|(bits, _)| bits.values()),
    )
    .await?;
    let carry = deal(
        session,
        odd,
        len,
        dealt.as_ref().map(|(_, carry)| carry.as_slice()),
    )
    .await?;

    // eta' = flip ^ (blinded > sharemask - 1), so eta = eta' ^ flip is the
    // indicator of blinded >= sharemask, i.e. that adding the offset did not wrap.
    let target = PublicTensor::opened(
        offset.sharemask.sub(&RingVec::constant(ring, len, 1))?,
        false,
        session.next_fingerprint(),
    );
    let flip = PublicTensor::opened(offset.flip, false, session.next_fingerprint());
    let eta_prime = private_compare(session, &blinded_bits, &target, &flip, odd).await?;
    let eta = PrivateTensor::try_from(
        boolean::xor(session, &Tensor::Private(eta_prime), &Tensor::Public(flip)).await?,
    )?;

    // The wrap of the input shares is
    //   eta + carry + wrap(x_0, r_0) + wrap(x_1, r_1) - wrap(r_0, r_1) - 1,
    // the last two terms being folded in by Server0 alone.
    let mut correction = own_wrap;
    if role == Role::Server0 {
        let offset_term: Vec<u64> = offset
            .wrap
            .values()
            .iter()
            .map(|&alpha| odd.neg(alpha + 1))
            .collect();
        correction = correction.add(&RingVec::new(odd, offset_term))?;
    }
    let input_wrap = eta.add(&carry)?.add_local(&correction)?;

    let converted = x.clone().with_scaling(false).lift(odd).sub(&input_wrap)?;
    Ok(converted
        .with_scaling(x.is_scaled())
        .with_fingerprint(Fingerprint::derive(
            "share_convert",
            &[x.fingerprint()],
            &[],
        )))
}
