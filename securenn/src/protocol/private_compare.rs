//! Private comparison of a bit-shared value with a public one.
//!
//! The servers hold shares over `Z_p` of the bits of a secret `x` and both
//! know a public `r` and a flip bit `beta`. The crypto producer learns a
//! masked, permuted vector per row from which it can only tell whether some
//! position is zero, and re-shares that single bit. The bit equals
//! `beta ^ (x > r)`, so the producer learns nothing about the comparison.

use crate::{
    error::Error,
    execution::{
        player::Role,
        session::{Session, SessionHandles},
    },
    protocol::sharing::{deal, reveal_to_producer},
    shares::{
        fingerprint::Fingerprint,
        ring::{Ring, RingVec},
        tensor::{PrivateTensor, PublicTensor},
    },
};
use eyre::Result;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use tracing::{debug, instrument};

/// Common randomness of the two servers for one row.
struct RowMasks {
    /// Multiplicative masks in `Z_p^*`.
    scalars:     Vec<u64>,
    /// Fresh values in `Z_p^*` for the wrap-around row.
    edge:        Vec<u64>,
    permutation: Vec<usize>,
}

impl RowMasks {
    fn sample<R: rand::Rng>(rng: &mut R, prime: Ring, width: usize) -> Self {
        let scalars = prime.sample_nonzero(rng, width).into_values();
        let edge = prime.sample_nonzero(rng, width).into_values();
        let mut permutation: Vec<usize> = (0..width).collect();
        permutation.shuffle(rng);
        RowMasks {
            scalars,
            edge,
            permutation,
        }
    }
}

/// Share of `c_i = (rho_i - x_i) + 1 + sum_{k > i} (x_k ^ rho_k)` for every
/// position i. Zero at some position iff `x > rho`.
///
/// `lead` marks the party that folds public constants into its share.
fn greater_than_terms(prime: Ring, x: &[u64], rho: u64, lead: bool) -> Vec<u64> {
    let one = lead as u64;
    let mut c = vec![0; x.len()];
    let mut suffix = 0;
    for i in (0..x.len()).rev() {
        let rho_i = (rho >> i) & 1;
        c[i] = prime.add(prime.sub(rho_i * one, x[i]), prime.add(one, suffix));
        let w_i = if rho_i == 1 { prime.sub(one, x[i]) } else { x[i] };
        suffix = prime.add(suffix, w_i);
    }
    c
}

/// Share of `c_i = (x_i - theta_i) + 1 + sum_{k > i} (x_k ^ theta_k)`. Zero at
/// some position iff `x < theta`.
fn less_than_terms(prime: Ring, x: &[u64], theta: u64, lead: bool) -> Vec<u64> {
    let one = lead as u64;
    let mut c = vec![0; x.len()];
    let mut suffix = 0;
    for i in (0..x.len()).rev() {
        let theta_i = (theta >> i) & 1;
        c[i] = prime.add(prime.sub(x[i], theta_i * one), prime.add(one, suffix));
        let w_i = if theta_i == 1 { prime.sub(one, x[i]) } else { x[i] };
        suffix = prime.add(suffix, w_i);
    }
    c
}

/// Replacement row for `r = 2^W - 1` when `theta = r + 1` wraps to zero: every
/// `x` is at most `r`, so exactly one position must reconstruct to zero.
/// Position 0 is shared as `(u_0, -u_0)`, every other as `(u_i + 1, -u_i)`.
fn wraparound_terms(prime: Ring, edge: &[u64], lead: bool) -> Vec<u64> {
    edge.iter()
        .enumerate()
        .map(|(i, &u)| match (lead, i) {
            (true, 0) => u,
            (true, _) => prime.add(u, 1),
            (false, _) => prime.neg(u),
        })
        .collect()
}

/// Writes every selected row of `branch` into `buffer`, failing if a row was
/// already written.
fn scatter_rows(
    buffer: &mut [Option<Vec<u64>>],
    rows: &[usize],
    branch: &mut [Option<Vec<u64>>],
) -> Result<(), Error> {
    for &row in rows {
        if buffer[row].is_some() {
            return Err(Error::OverlappingSelection(row));
        }
        buffer[row] = branch[row].take();
    }
    Ok(())
}

/// Returns shares over `out_ring` of `beta ^ (x > r)` per row.
///
/// `x_bits` holds `r.len() * W` shares over the prime ring, row-major with
/// the least significant bit first. `r` and `beta` are only read on the
/// servers.
#[instrument(level = "debug", target = "securenn::private_compare", skip_all, fields(role = %session.own_role(), rows = r.len()))]
pub async fn private_compare(
    session: &mut Session,
    x_bits: &PrivateTensor,
    r: &PublicTensor,
    beta: &PublicTensor,
    out_ring: Ring,
) -> Result<PrivateTensor> {
    let role = session.own_role();
    let prime = session.config().prime_ring;
    let width = session.config().bits();
    let rows = r.len();

    if x_bits.is_scaled() || beta.is_scaled() {
        return Err(Error::ScaledBitOperand.into());
    }
    if x_bits.ring() != prime {
        return Err(Error::RingMismatch {
            left:  prime,
            right: x_bits.ring(),
        }
        .into());
    }
    if prime.modulus() <= width as u128 + 1 {
        return Err(Error::Config(format!("{prime} is too small for {width}-bit comparisons")).into());
    }
    if x_bits.len() != rows * width {
        return Err(Error::BitWidthMismatch {
            expected: width,
            actual:   if rows == 0 { x_bits.len() } else { x_bits.len() / rows },
        }
        .into());
    }
    if beta.len() != rows {
        return Err(Error::LengthMismatch {
            expected: rows,
            actual:   beta.len(),
        }
        .into());
    }
    if r.ring().bits() as usize > width {
        return Err(Error::BitWidthMismatch {
            expected: width,
            actual:   r.ring().bits() as usize,
        }
        .into());
    }

    let masked_rows = match role {
        Role::Server0 | Role::Server1 => {
            if let Some(&flip) = beta.values().iter().find(|&&b| b > 1) {
                return Err(Error::NonBinaryFlip(flip).into());
            }
            let masks: Vec<RowMasks> = {
                let rng = session.prf.pair_rng(role)?;
                (0..rows)
                    .map(|_| RowMasks::sample(&mut *rng, prime, width))
                    .collect()
            };
            let masked = mask_rows(
                prime,
                width,
                x_bits.share().values(),
                r.values(),
                beta.values(),
                &masks,
                role == Role::Server0,
            )?;
            debug!(target: "securenn::private_compare", rows, "sending masked rows to producer");
            RingVec::new(prime, masked)
        }
        Role::CryptoProducer => RingVec::zeros(prime, rows * width),
    };
    let masked_rows = PrivateTensor::new(
        masked_rows,
        false,
        Fingerprint::derive(
            "private_compare_rows",
            &[x_bits.fingerprint(), r.fingerprint(), beta.fingerprint()],
            &[],
        ),
    );
    let result_bits = reveal_to_producer(session, &masked_rows).await?.map(|opened| {
        opened
            .value
            .values()
            .chunks(width)
            .map(|row| row.iter().any(|&v| v == 0) as u64)
            .collect::<Vec<u64>>()
    });

    let output = deal(session, out_ring, rows, result_bits.as_deref()).await?;
    Ok(output.with_fingerprint(Fingerprint::derive(
        "private_compare",
        &[x_bits.fingerprint(), r.fingerprint(), beta.fingerprint()],
        &[out_ring.modulus() as u64],
    )))
}

/// Per-row comparison terms of this server, branch-selected by `beta`,
/// multiplied by the common scalars and permuted.
fn mask_rows(
    prime: Ring,
    width: usize,
    x_bits: &[u64],
    r: &[u64],
    beta: &[u64],
    masks: &[RowMasks],
    lead: bool,
) -> Result<Vec<u64>, Error> {
    let rows = r.len();
    let top = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
    let x_rows = |row: usize| &x_bits[row * width..(row + 1) * width];

    // Both branches are evaluated for every row.
    let mut greater: Vec<Option<Vec<u64>>> = (0..rows)
        .into_par_iter()
        .map(|row| Some(greater_than_terms(prime, x_rows(row), r[row], lead)))
        .collect();
    let mut less_equal: Vec<Option<Vec<u64>>> = (0..rows)
        .into_par_iter()
        .map(|row| {
            Some(if r[row] == top {
                wraparound_terms(prime, &masks[row].edge, lead)
            } else {
                less_than_terms(prime, x_rows(row), r[row] + 1, lead)
            })
        })
        .collect();

    let (zeros, ones): (Vec<usize>, Vec<usize>) = (0..rows).partition(|&row| beta[row] == 0);
    let mut selected: Vec<Option<Vec<u64>>> = vec![None; rows];
    scatter_rows(&mut selected, &zeros, &mut greater)?;
    scatter_rows(&mut selected, &ones, &mut less_equal)?;
    let selected: Vec<Vec<u64>> = selected
        .into_iter()
        .enumerate()
        .map(|(row, c)| c.ok_or(Error::IncompleteSelection(row)))
        .collect::<Result<_, _>>()?;

    Ok(selected
        .par_iter()
        .zip(masks.par_iter())
        .flat_map_iter(|(c, mask)| {
            let mut permuted = vec![0; width];
            for (i, (&c_i, &s_i)) in c.iter().zip(&mask.scalars).enumerate() {
                permuted[mask.permutation[i]] = prime.mul(c_i, s_i);
            }
            permuted
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        execution::local::LocalRuntime,
        protocol::{config::ProtocolConfig, sharing::reveal, sharing::share},
    };
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;
    use rstest::rstest;

    /// Shares the bits of `x` from the producer, then compares with `r`.
    async fn run_compare(
        x: Vec<u64>,
        r: Vec<u64>,
        beta: Vec<u64>,
        config: ProtocolConfig,
    ) -> Result<Vec<u64>> {
        let outputs = LocalRuntime::mock_setup_with_config(config)
            .await?
            .run(move |mut session| {
                let (x, r, beta) = (x.clone(), r.clone(), beta.clone());
                async move {
                    let config = *session.config();
                    let width = config.bits();
                    let prime = config.prime_ring;
                    let bits = RingVec::new(config.base_ring, x).to_bits(width, prime);
                    let owned = (session.own_role() == Role::CryptoProducer).then_some(bits.values());
                    let x_bits =
                        share(&mut session, Role::CryptoProducer, prime, bits.len(), owned, false).await?;
                    let r = PublicTensor::new(RingVec::new(config.base_ring, r), false);
                    let beta = PublicTensor::new(RingVec::new(config.base_ring, beta), false);
                    let out = private_compare(&mut session, &x_bits, &r, &beta, config.base_ring).await?;
                    Ok(reveal(&mut session, &out).await?.values().to_vec())
                }
            })
            .await?;
        assert_eq!(outputs[0], outputs[1]);
        Ok(outputs[0].clone())
    }

    fn expected(x: &[u64], r: &[u64], beta: &[u64]) -> Vec<u64> {
        x.iter()
            .zip(r)
            .zip(beta)
            .map(|((x, r), b)| b ^ (x > r) as u64)
            .collect()
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[tokio::test]
    async fn test_random_rows(#[case] flip: u64) -> Result<()> {
        let mut rng = ChaCha20Rng::seed_from_u64(7 + flip);
        let mut x: Vec<u64> = (0..32).map(|_| rng.gen::<u32>() as u64).collect();
        let mut r: Vec<u64> = (0..32).map(|_| rng.gen::<u32>() as u64).collect();
        // Equal and adjacent values exercise the boundary of the comparison.
        x[0] = r[0];
        (x[1], r[1]) = (1001, 1000);
        (x[2], r[2]) = (76, 77);
        (x[3], r[3]) = (0, 0);
        let beta = vec![flip; 32];
        assert_eq!(
            run_compare(x.clone(), r.clone(), beta.clone(), ProtocolConfig::default()).await?,
            expected(&x, &r, &beta)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_mixed_flip_bits() -> Result<()> {
        let mut rng = ChaCha20Rng::seed_from_u64(99);
        let x: Vec<u64> = (0..64).map(|_| rng.gen::<u32>() as u64).collect();
        let r: Vec<u64> = (0..64).map(|_| rng.gen::<u32>() as u64).collect();
        let beta: Vec<u64> = (0..64).map(|_| rng.gen_range(0..2)).collect();
        assert_eq!(
            run_compare(x.clone(), r.clone(), beta.clone(), ProtocolConfig::default()).await?,
            expected(&x, &r, &beta)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_wraparound_target() -> Result<()> {
        let top = u32::MAX as u64;
        let x = vec![0, 5, top - 1, top, 0, top];
        let r = vec![top; 6];
        let beta = vec![1, 1, 1, 1, 0, 0];
        let got = run_compare(x.clone(), r.clone(), beta.clone(), ProtocolConfig::default()).await?;
        assert_eq!(got, vec![1, 1, 1, 1, 0, 0]);
        assert_eq!(got, expected(&x, &r, &beta));
        Ok(())
    }

    #[tokio::test]
    async fn test_small_width() -> Result<()> {
        let config = ProtocolConfig::new(8, 11, 2)?;
        let x: Vec<u64> = (0..=255).collect();
        let r: Vec<u64> = (0..=255).rev().collect();
        let beta: Vec<u64> = (0..256).map(|i| i % 2).collect();
        assert_eq!(
            run_compare(x.clone(), r.clone(), beta.clone(), config).await?,
            expected(&x, &r, &beta)
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_non_binary_flip() -> Result<()> {
        let err = run_compare(vec![1], vec![2], vec![2], ProtocolConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::NonBinaryFlip(2)));
        Ok(())
    }

    #[tokio::test]
    async fn test_bit_width_mismatch() -> Result<()> {
        let result = LocalRuntime::mock_setup()
            .await?
            .run(|mut session| async move {
                let prime = session.config().prime_ring;
                let ring = session.config().base_ring;
                let bits = vec![0; 16];
                let owned = (session.own_role() == Role::CryptoProducer).then_some(&bits[..]);
                let x_bits = share(&mut session, Role::CryptoProducer, prime, 16, owned, false).await?;
                let r = PublicTensor::new(RingVec::zeros(ring, 1), false);
                private_compare(&mut session, &x_bits, &r, &r, ring).await
            })
            .await;
        let err = result.unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::BitWidthMismatch {
                expected: 32,
                actual:   16,
            })
        );
        Ok(())
    }

    #[test]
    fn test_terms_reconstruct_to_zero_exactly_once() {
        let prime = Ring::Prime { modulus: 37 };
        let width = 8;
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        for _ in 0..200 {
            let x: u64 = rng.gen_range(0..256);
            let r: u64 = rng.gen_range(0..255);
            let x_bits: Vec<u64> = (0..width).map(|i| (x >> i) & 1).collect();
            let share0 = prime.sample_uniform(&mut rng, width).into_values();
            let share1: Vec<u64> = x_bits.iter().zip(&share0).map(|(&b, &s)| prime.sub(b, s)).collect();

            let gt0 = greater_than_terms(prime, &share0, r, true);
            let gt1 = greater_than_terms(prime, &share1, r, false);
            let zeros = gt0.iter().zip(&gt1).filter(|(a, b)| prime.add(**a, **b) == 0).count();
            assert_eq!(zeros, (x > r) as usize);

            let lt0 = less_than_terms(prime, &share0, r + 1, true);
            let lt1 = less_than_terms(prime, &share1, r + 1, false);
            let zeros = lt0.iter().zip(&lt1).filter(|(a, b)| prime.add(**a, **b) == 0).count();
            assert_eq!(zeros, (x <= r) as usize);
        }
    }

    #[test]
    fn test_overlapping_selection_is_detected() {
        let mut buffer = vec![None, None];
        let mut branch = vec![Some(vec![1]), Some(vec![2])];
        scatter_rows(&mut buffer, &[0], &mut branch).unwrap();
        let mut other = vec![Some(vec![3]), Some(vec![4])];
        assert_eq!(
            scatter_rows(&mut buffer, &[1, 0], &mut other),
            Err(Error::OverlappingSelection(0))
        );
    }
}
