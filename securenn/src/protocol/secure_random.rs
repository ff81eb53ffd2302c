//! Seeded uniform integer tensors, the randomness source behind flip bits.

use crate::{
    error::Error,
    protocol::prf::PrfRng,
    shares::ring::{Ring, RingVec},
};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::warn;

/// Seed used when none is supplied. Only suitable for tests.
pub const DEFAULT_SEED: [u32; 8] = [87654321; 8];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dtype {
    Int32,
    Int64,
}

impl FromStr for Dtype {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "int32" | "i32" => Ok(Dtype::Int32),
            "int64" | "i64" => Ok(Dtype::Int64),
            other => Err(Error::InvalidDtype(other.to_string())),
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dtype::Int32 => f.write_str("int32"),
            Dtype::Int64 => f.write_str("int64"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RandomTensor {
    Int32(Vec<i32>),
    Int64(Vec<i64>),
}

impl RandomTensor {
    pub fn len(&self) -> usize {
        match self {
            RandomTensor::Int32(values) => values.len(),
            RandomTensor::Int64(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_i64(&self) -> Vec<i64> {
        match self {
            RandomTensor::Int32(values) => values.iter().map(|&v| v as i64).collect(),
            RandomTensor::Int64(values) => values.clone(),
        }
    }
}

fn seed_bytes(words: &[u32; 8]) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    for (chunk, word) in bytes.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    bytes
}

/// Draws `len` integers uniformly from `[minval, maxval)` with a ChaCha20
/// stream keyed by the eight seed words. The same seed always yields the
/// same tensor.
pub fn secure_random(
    len: usize,
    minval: i64,
    maxval: Option<i64>,
    dtype: Dtype,
    seed: Option<&[u32]>,
) -> Result<RandomTensor, Error> {
    let maxval = maxval.ok_or(Error::MissingBound(dtype))?;
    if minval >= maxval {
        return Err(Error::InvalidBounds { minval, maxval });
    }
    let words: [u32; 8] = match seed {
        Some(seed) => seed
            .try_into()
            .map_err(|_| Error::InvalidSeedLength(seed.len()))?,
        None => {
            warn!("secure_random called without a seed, falling back to the fixed default seed");
            DEFAULT_SEED
        }
    };
    let mut rng = PrfRng::from_seed(seed_bytes(&words));

    match dtype {
        Dtype::Int32 => {
            let (Ok(low), Ok(high)) = (i32::try_from(minval), i32::try_from(maxval)) else {
                return Err(Error::InvalidBounds { minval, maxval });
            };
            Ok(RandomTensor::Int32(
                (0..len).map(|_| rng.gen_range(low..high)).collect(),
            ))
        }
        Dtype::Int64 => Ok(RandomTensor::Int64(
            (0..len).map(|_| rng.gen_range(minval..maxval)).collect(),
        )),
    }
}

/// `len` uniform bits in `ring` drawn from the seeded source.
pub(crate) fn random_bits(seed: &[u32; 8], ring: Ring, len: usize) -> Result<RingVec, Error> {
    let bits = secure_random(len, 0, Some(2), Dtype::Int32, Some(&seed[..]))?;
    Ok(RingVec::new(
        ring,
        bits.to_i64().into_iter().map(|b| b as u64).collect(),
    ))
}
