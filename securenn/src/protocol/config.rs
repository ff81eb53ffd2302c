use crate::{
    error::Error,
    shares::{fixed_point::FixedPoint, ring::Ring},
};
use securenn_common::config::Config;

/// Rings and precision every protocol in a session agrees on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Ring of the inputs, `Z_{2^bits}`.
    pub base_ring:   Ring,
    /// `Z_{2^bits - 1}`
    pub odd_ring:    Ring,
    /// Ring of bit decompositions.
    pub prime_ring:  Ring,
    pub fixed_point: FixedPoint,
}

impl ProtocolConfig {
    pub fn new(bits: u32, prime: u64, fractional_bits: u32) -> Result<Self, Error> {
        let config = ProtocolConfig {
            base_ring:   Ring::power_of_two(bits)?,
            odd_ring:    Ring::odd(bits)?,
            prime_ring:  Ring::prime(prime)?,
            fixed_point: FixedPoint::new(fractional_bits),
        };
        if prime <= bits as u64 + 1 {
            return Err(Error::Config(format!(
                "prime {prime} cannot hold comparison values of {bits}-bit inputs"
            )));
        }
        Ok(config)
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        config
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;
        ProtocolConfig::new(config.bits, config.prime, config.fractional_bits)
    }

    /// Bit width W of compared values.
    pub fn bits(&self) -> usize {
        self.base_ring.bits() as usize
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig {
            base_ring:   Ring::PowerOfTwo { bits: 32 },
            odd_ring:    Ring::Odd { bits: 32 },
            prime_ring:  Ring::Prime { modulus: 37 },
            fixed_point: FixedPoint::new(8),
        }
    }
}
