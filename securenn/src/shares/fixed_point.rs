use super::ring::{Ring, RingVec};
use serde::{Deserialize, Serialize};

/// Fixed-point encoding of reals into ring elements with `fractional_bits`
/// bits of precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedPoint {
    pub fractional_bits: u32,
}

impl FixedPoint {
    pub fn new(fractional_bits: u32) -> Self {
        FixedPoint { fractional_bits }
    }

    pub fn scale_factor(&self) -> f64 {
        (1u64 << self.fractional_bits) as f64
    }

    pub fn encode(&self, ring: Ring, values: &[f64]) -> RingVec {
        let encoded: Vec<i64> = values
            .iter()
            .map(|v| (v * self.scale_factor()).round() as i64)
            .collect();
        RingVec::from_signed(ring, &encoded)
    }

    pub fn decode(&self, value: &RingVec) -> Vec<f64> {
        value
            .to_signed()
            .into_iter()
            .map(|v| v as f64 / self.scale_factor())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode() {
        let fixed_point = FixedPoint::new(8);
        let ring = Ring::PowerOfTwo { bits: 32 };
        let encoded = fixed_point.encode(ring, &[1.5, -0.25, 0.0, -3.0]);
        assert_eq!(encoded.values()[0], 384);
        assert_eq!(encoded.values()[1], ring.from_signed(-64));
        assert_eq!(fixed_point.decode(&encoded), vec![1.5, -0.25, 0.0, -3.0]);
    }

    #[test]
    fn test_encode_rounds_to_nearest() {
        let fixed_point = FixedPoint::new(2);
        let ring = Ring::PowerOfTwo { bits: 16 };
        let encoded = fixed_point.encode(ring, &[0.1, 0.2, -0.2]);
        assert_eq!(encoded.to_signed(), vec![0, 1, -1]);
    }
}
