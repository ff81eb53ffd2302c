use crate::{
    error::Error,
    execution::{
        player::Role,
        session::{BootSession, SessionHandles},
    },
    network::value::NetworkValue,
};
use rand::{rngs::OsRng, Rng, RngCore, SeedableRng};

pub use rand_chacha::ChaCha20Rng as PrfRng;

pub type PrfSeed = <PrfRng as SeedableRng>::Seed;

/// Replicated PRF state of one party.
///
/// `my_prf` is keyed with this party's seed and shared with the next party,
/// `prev_prf` with the previous party's seed. With the ring
/// `Server0 -> Server1 -> CryptoProducer`, the stream common to both servers
/// is `Server0.my_prf == Server1.prev_prf`. `local_rng` is private.
#[derive(Debug)]
pub struct Prf {
    pub my_prf:   PrfRng,
    pub prev_prf: PrfRng,
    local_rng:    PrfRng,
}

impl Prf {
    pub fn new(my_key: PrfSeed, prev_key: PrfSeed) -> Self {
        Self {
            my_prf:    PrfRng::from_seed(my_key),
            prev_prf:  PrfRng::from_seed(prev_key),
            local_rng: PrfRng::from_entropy(),
        }
    }

    /// Fully deterministic state, for reproducible runs.
    pub fn with_local_seed(my_key: PrfSeed, prev_key: PrfSeed, local_key: PrfSeed) -> Self {
        Self {
            my_prf:    PrfRng::from_seed(my_key),
            prev_prf:  PrfRng::from_seed(prev_key),
            local_rng: PrfRng::from_seed(local_key),
        }
    }

    pub fn gen_seed() -> PrfSeed {
        let mut seed = PrfSeed::default();
        OsRng.fill_bytes(&mut seed);
        seed
    }

    pub fn get_my_prf(&mut self) -> &mut PrfRng {
        &mut self.my_prf
    }

    pub fn get_prev_prf(&mut self) -> &mut PrfRng {
        &mut self.prev_prf
    }

    pub fn local_rng(&mut self) -> &mut PrfRng {
        &mut self.local_rng
    }

    /// The stream both servers draw identical values from.
    pub fn pair_rng(&mut self, role: Role) -> Result<&mut PrfRng, Error> {
        match role {
            Role::Server0 => Ok(&mut self.my_prf),
            Role::Server1 => Ok(&mut self.prev_prf),
            Role::CryptoProducer => Err(Error::WrongRole(role, "server common randomness")),
        }
    }

    /// Fresh seed words for the secure random source.
    pub fn secure_seed(&mut self) -> [u32; 8] {
        self.local_rng.gen()
    }
}

pub async fn setup_replicated_prf(session: &BootSession, my_seed: PrfSeed) -> eyre::Result<Prf> {
    let next_role = session.own_role().next();
    let prev_role = session.own_role().prev();
    // send my_seed to the next party
    session.send(next_role, &NetworkValue::PrfKey(my_seed)).await?;
    // received other seed from the previous party
    let other_seed = session.receive(prev_role).await?.into_prf_key()?;
    Ok(Prf::new(my_seed, other_seed))
}
