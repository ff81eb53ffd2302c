use crate::{error::Error, protocol::prf::PrfSeed, shares::ring::RingVec};
use eyre::Result;
use serde::{Deserialize, Serialize};

/// Value sent over the network
#[derive(PartialEq, Eq, Clone, Debug, Serialize, Deserialize)]
pub enum NetworkValue {
    PrfKey(PrfSeed),
    RingVec(RingVec),
    Vec(Vec<NetworkValue>),
}

impl NetworkValue {
    pub fn to_network(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_network(serialized: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(serialized)?)
    }

    pub fn into_prf_key(self) -> Result<PrfSeed, Error> {
        match self {
            NetworkValue::PrfKey(seed) => Ok(seed),
            _ => Err(Error::UnexpectedMessage("PRF key")),
        }
    }

    pub fn into_ring_vec(self) -> Result<RingVec, Error> {
        match self {
            NetworkValue::RingVec(value) => Ok(value),
            _ => Err(Error::UnexpectedMessage("ring vector")),
        }
    }

    pub fn into_vec(self) -> Result<Vec<NetworkValue>, Error> {
        match self {
            NetworkValue::Vec(values) => Ok(values),
            _ => Err(Error::UnexpectedMessage("vector of values")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shares::ring::Ring;

    #[test]
    fn test_nested_value_survives_the_wire() -> Result<()> {
        let value = NetworkValue::Vec(vec![
            NetworkValue::RingVec(RingVec::new(Ring::Odd { bits: 32 }, vec![1, 2, 3])),
            NetworkValue::PrfKey([7; 32]),
        ]);
        let decoded = NetworkValue::from_network(&value.to_network()?)?;
        let mut parts = decoded.into_vec()?.into_iter();
        let ring_vec = parts.next().unwrap().into_ring_vec()?;
        assert_eq!(ring_vec.ring(), Ring::Odd { bits: 32 });
        assert_eq!(ring_vec.values(), &[1, 2, 3]);
        assert_eq!(parts.next().unwrap().into_prf_key()?, [7; 32]);
        Ok(())
    }

    #[test]
    fn test_wrong_variant() {
        let value = NetworkValue::PrfKey([0; 32]);
        assert_eq!(
            value.into_ring_vec(),
            Err(Error::UnexpectedMessage("ring vector"))
        );
    }
}
