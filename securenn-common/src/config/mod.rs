use crate::error::Error;
use clap::Parser;
use eyre::Result;
use num_prime::nt_funcs::{is_prime, next_prime};
use serde::{Deserialize, Serialize};

pub const ENV_DEV: &str = "dev";

/// Largest bit width a ring element can carry.
pub const MAX_BITS: u32 = 64;

#[derive(Debug, Parser)]
pub struct Opt {
    #[clap(long)]
    bits: Option<u32>,

    #[clap(long)]
    prime: Option<u64>,

    #[clap(long)]
    fractional_bits: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub environment: String,

    /// Bit width W of the values being compared.
    #[serde(default = "default_bits")]
    pub bits: u32,

    /// Modulus of the small prime ring that carries bit decompositions.
    #[serde(default = "default_prime")]
    pub prime: u64,

    /// Fractional precision of fixed-point encoded inputs.
    #[serde(default = "default_fractional_bits")]
    pub fractional_bits: u32,
}

fn default_bits() -> u32 {
    32
}

fn default_prime() -> u64 {
    37
}

fn default_fractional_bits() -> u32 {
    8
}

impl Default for Config {
    fn default() -> Self {
        Config {
            environment:     ENV_DEV.to_string(),
            bits:            default_bits(),
            prime:           default_prime(),
            fractional_bits: default_fractional_bits(),
        }
    }
}

impl Config {
    pub fn load_config(prefix: &str) -> Result<Config> {
        let settings = config::Config::builder();
        let settings = settings
            .add_source(
                config::Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize::<Config>()?;
        config.validate()?;
        Ok(config)
    }

    pub fn overwrite_defaults_with_cli_args(&mut self, opts: Opt) {
        if let Some(bits) = opts.bits {
            self.bits = bits;
        }

        if let Some(prime) = opts.prime {
            self.prime = prime;
        }

        if let Some(fractional_bits) = opts.fractional_bits {
            self.fractional_bits = fractional_bits;
        }
    }

    /// Checks that the bit width fits a ring element and that the prime ring
    /// can hold every value produced by a width-`bits` comparison.
    pub fn validate(&self) -> Result<(), Error> {
        if self.bits == 0 || self.bits > MAX_BITS {
            return Err(Error::Config(format!(
                "bits must lie in 1..={MAX_BITS}, got {}",
                self.bits
            )));
        }
        if !is_prime(&self.prime, None).probably() {
            return Err(Error::Config(format!("{} is not prime", self.prime)));
        }
        if self.prime <= self.bits as u64 + 1 {
            let suggestion = next_prime(&(self.bits as u64 + 1), None).unwrap_or(u64::MAX);
            return Err(Error::Config(format!(
                "prime {} is too small for {}-bit comparisons, the smallest valid prime is {}",
                self.prime, self.bits, suggestion
            )));
        }
        if self.fractional_bits >= self.bits {
            return Err(Error::Config(format!(
                "fractional_bits {} leaves no integer part in {} bits",
                self.fractional_bits, self.bits
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.bits, 32);
        assert_eq!(config.prime, 37);
        assert_eq!(config.fractional_bits, 8);
        assert_eq!(config.environment, "");
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_small_prime() {
        let config = Config {
            prime: 31,
            ..Config::default()
        };
        assert_eq!(
            config.validate(),
            Err(Error::Config(
                "prime 31 is too small for 32-bit comparisons, the smallest valid prime is 37"
                    .to_string()
            ))
        );
    }

    #[test]
    fn test_validate_rejects_composite_and_wide() {
        let composite = Config {
            prime: 39,
            ..Config::default()
        };
        assert!(composite.validate().is_err());

        let wide = Config {
            bits: 65,
            prime: 67,
            ..Config::default()
        };
        assert!(wide.validate().is_err());

        let full = Config {
            bits: 64,
            prime: 67,
            ..Config::default()
        };
        full.validate().unwrap();
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::default();
        let opts = Opt::parse_from(["securenn", "--bits", "16", "--prime", "19"]);
        config.overwrite_defaults_with_cli_args(opts);
        assert_eq!(config.bits, 16);
        assert_eq!(config.prime, 19);
        assert_eq!(config.fractional_bits, 8);
        config.validate().unwrap();
    }
}
