use crate::error::Error;
use itertools::izip;
use num_prime::nt_funcs::is_prime;
use rand::Rng;
use securenn_common::config::MAX_BITS;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The modulus a vector of shares lives in.
///
/// Elements are stored as `u64` in `[0, M)`; arithmetic goes through `u128`
/// so that `M = 2^64` needs no special casing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ring {
    /// `Z_{2^bits}`
    PowerOfTwo { bits: u32 },
    /// `Z_p` for a small prime p, used for bit decompositions.
    Prime { modulus: u64 },
    /// `Z_{2^bits - 1}`, the odd ring share conversion lands in.
    Odd { bits: u32 },
}

impl Ring {
    pub fn power_of_two(bits: u32) -> Result<Self, Error> {
        if bits == 0 || bits > MAX_BITS {
            return Err(Error::UnsupportedModulus(format!("2^{bits}")));
        }
        Ok(Ring::PowerOfTwo { bits })
    }

    pub fn odd(bits: u32) -> Result<Self, Error> {
        if bits < 2 || bits > MAX_BITS {
            return Err(Error::UnsupportedModulus(format!("2^{bits} - 1")));
        }
        Ok(Ring::Odd { bits })
    }

    pub fn prime(modulus: u64) -> Result<Self, Error> {
        if modulus < 3 || !is_prime(&modulus, None).probably() {
            return Err(Error::Config(format!("{modulus} is not an odd prime")));
        }
        Ok(Ring::Prime { modulus })
    }

    pub fn modulus(&self) -> u128 {
        match *self {
            Ring::PowerOfTwo { bits } => 1u128 << bits,
            Ring::Prime { modulus } => modulus as u128,
            Ring::Odd { bits } => (1u128 << bits) - 1,
        }
    }

    pub fn is_odd(&self) -> bool {
        self.modulus() % 2 == 1
    }

    /// Number of bits needed to write down any element.
    pub fn bits(&self) -> u32 {
        match *self {
            Ring::PowerOfTwo { bits } | Ring::Odd { bits } => bits,
            Ring::Prime { modulus } => u64::BITS - (modulus - 1).leading_zeros(),
        }
    }

    pub fn reduce(&self, value: u128) -> u64 {
        (value % self.modulus()) as u64
    }

    pub fn add(&self, a: u64, b: u64) -> u64 {
        self.reduce(a as u128 + b as u128)
    }

    pub fn sub(&self, a: u64, b: u64) -> u64 {
        self.reduce(a as u128 + self.modulus() - b as u128)
    }

    pub fn neg(&self, a: u64) -> u64 {
        self.sub(0, a)
    }

    pub fn mul(&self, a: u64, b: u64) -> u64 {
        self.reduce(a as u128 * b as u128)
    }

    /// Embeds a signed integer, negative values wrapping to the top of the ring.
    pub fn from_signed(&self, value: i64) -> u64 {
        (value as i128).rem_euclid(self.modulus() as i128) as u64
    }

    /// Inverse of [`Ring::from_signed`]: elements in the upper half are negative.
    pub fn to_signed(&self, value: u64) -> i128 {
        if 2 * value as u128 >= self.modulus() {
            value as i128 - self.modulus() as i128
        } else {
            value as i128
        }
    }

    /// 1 if `a + b` overflows the modulus as an integer sum, 0 otherwise.
    pub fn compute_wrap(&self, a: u64, b: u64) -> u64 {
        (a as u128 + b as u128 >= self.modulus()) as u64
    }

    pub fn sample_uniform<R: Rng>(&self, rng: &mut R, len: usize) -> RingVec {
        let modulus = self.modulus();
        let values = (0..len).map(|_| rng.gen_range(0..modulus) as u64).collect();
        RingVec::from_reduced(*self, values)
    }

    /// Uniform values below `2^bound_bits`; `bound_bits = 1` yields random bits.
    pub fn sample_bounded<R: Rng>(
        &self,
        rng: &mut R,
        len: usize,
        bound_bits: u32,
    ) -> RingVec {
        let bound = (1u128 << bound_bits.min(MAX_BITS)).min(self.modulus());
        let values = (0..len).map(|_| rng.gen_range(0..bound) as u64).collect();
        RingVec::from_reduced(*self, values)
    }

    /// Uniform values in `[1, M)`.
    pub fn sample_nonzero<R: Rng>(&self, rng: &mut R, len: usize) -> RingVec {
        let modulus = self.modulus();
        let values = (0..len).map(|_| rng.gen_range(1..modulus) as u64).collect();
        RingVec::from_reduced(*self, values)
    }
}

impl fmt::Display for Ring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ring::PowerOfTwo { bits } => write!(f, "Z_(2^{bits})"),
            Ring::Prime { modulus } => write!(f, "Z_{modulus}"),
            Ring::Odd { bits } => write!(f, "Z_(2^{bits}-1)"),
        }
    }
}

/// A vector of elements of a single ring.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingVec {
    ring:   Ring,
    values: Vec<u64>,
}

impl RingVec {
    /// Reduces every value into the ring.
    pub fn new(ring: Ring, values: Vec<u64>) -> Self {
        let values = values.into_iter().map(|v| ring.reduce(v as u128)).collect();
        RingVec { ring, values }
    }

    pub fn from_signed(ring: Ring, values: &[i64]) -> Self {
        let values = values.iter().map(|&v| ring.from_signed(v)).collect();
        RingVec { ring, values }
    }

    pub(crate) fn from_reduced(ring: Ring, values: Vec<u64>) -> Self {
        debug_assert!(values.iter().all(|&v| (v as u128) < ring.modulus()));
        RingVec { ring, values }
    }

    pub fn zeros(ring: Ring, len: usize) -> Self {
        RingVec {
            ring,
            values: vec![0; len],
        }
    }

    pub fn constant(ring: Ring, len: usize, value: u64) -> Self {
        RingVec {
            ring,
            values: vec![ring.reduce(value as u128); len],
        }
    }

    pub fn ring(&self) -> Ring {
        self.ring
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[u64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<u64> {
        self.values
    }

    pub fn to_signed(&self) -> Vec<i128> {
        self.values.iter().map(|&v| self.ring.to_signed(v)).collect()
    }

    pub(crate) fn check_compatible(&self, other: &RingVec) -> Result<(), Error> {
        if self.ring != other.ring {
            return Err(Error::RingMismatch {
                left:  self.ring,
                right: other.ring,
            });
        }
        if self.len() != other.len() {
            return Err(Error::LengthMismatch {
                expected: self.len(),
                actual:   other.len(),
            });
        }
        Ok(())
    }

    fn zip_with(&self, other: &RingVec, op: impl Fn(u64, u64) -> u64) -> Result<RingVec, Error> {
        self.check_compatible(other)?;
        let values = izip!(&self.values, &other.values)
            .map(|(&a, &b)| op(a, b))
            .collect();
        Ok(RingVec::from_reduced(self.ring, values))
    }

    fn map(&self, op: impl Fn(u64) -> u64) -> RingVec {
        RingVec::from_reduced(self.ring, self.values.iter().map(|&v| op(v)).collect())
    }

    pub fn add(&self, other: &RingVec) -> Result<RingVec, Error> {
        let ring = self.ring;
        self.zip_with(other, |a, b| ring.add(a, b))
    }

    pub fn sub(&self, other: &RingVec) -> Result<RingVec, Error> {
        let ring = self.ring;
        self.zip_with(other, |a, b| ring.sub(a, b))
    }

    pub fn mul(&self, other: &RingVec) -> Result<RingVec, Error> {
        let ring = self.ring;
        self.zip_with(other, |a, b| ring.mul(a, b))
    }

    pub fn neg(&self) -> RingVec {
        let ring = self.ring;
        self.map(|v| ring.neg(v))
    }

    pub fn scale(&self, factor: u64) -> RingVec {
        let ring = self.ring;
        let factor = ring.reduce(factor as u128);
        self.map(|v| ring.mul(v, factor))
    }

    /// Element-wise carry bit of `self + other` over the integers.
    pub fn compute_wrap(&self, other: &RingVec) -> Result<Vec<u64>, Error> {
        self.check_compatible(other)?;
        Ok(izip!(&self.values, &other.values)
            .map(|(&a, &b)| self.ring.compute_wrap(a, b))
            .collect())
    }

    /// Re-tags the same representatives in `target`, reducing by its modulus.
    pub fn lift(&self, target: Ring) -> RingVec {
        RingVec::new(target, self.values.clone())
    }

    /// Row-major bit decomposition, `width` bits per element, LSB first.
    pub fn to_bits(&self, width: usize, target: Ring) -> RingVec {
        let values = self
            .values
            .iter()
            .flat_map(|&v| (0..width).map(move |i| if i < 64 { (v >> i) & 1 } else { 0 }))
            .collect();
        RingVec::from_reduced(target, values)
    }

    pub fn lsb(&self, target: Ring) -> RingVec {
        RingVec::from_reduced(target, self.values.iter().map(|v| v & 1).collect())
    }
}
