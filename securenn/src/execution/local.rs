use crate::{
    execution::{
        player::*,
        session::{BootSession, Session, SessionHandles, SessionId},
    },
    network::local::LocalNetworkingStore,
    protocol::{
        config::ProtocolConfig,
        prf::{setup_replicated_prf, PrfSeed},
    },
};
use std::{future::Future, sync::Arc};
use tokio::task::JoinSet;

pub fn generate_local_identities() -> Vec<Identity> {
    vec![
        Identity::from("server0"),
        Identity::from("server1"),
        Identity::from("crypto_producer"),
    ]
}

/// Three parties wired together over in-memory channels.
pub struct LocalRuntime {
    pub identities:       Vec<Identity>,
    pub role_assignments: RoleAssignment,
    pub seeds:            Vec<PrfSeed>,
    /// One session per party, in role order.
    pub sessions:         Vec<Session>,
}

impl LocalRuntime {
    pub async fn mock_setup() -> eyre::Result<Self> {
        Self::mock_setup_with_config(ProtocolConfig::default()).await
    }

    pub async fn mock_setup_with_config(config: ProtocolConfig) -> eyre::Result<Self> {
        let identities = generate_local_identities();
        let seeds = (0..NUM_PARTIES)
            .map(|i| {
                let mut seed = PrfSeed::default();
                seed[0] = i as u8;
                seed
            })
            .collect();
        LocalRuntime::new(identities, seeds, config).await
    }

    pub async fn new(
        identities: Vec<Identity>,
        seeds: Vec<PrfSeed>,
        config: ProtocolConfig,
    ) -> eyre::Result<Self> {
        if identities.len() != NUM_PARTIES || seeds.len() != NUM_PARTIES {
            eyre::bail!(
                "a local runtime needs {NUM_PARTIES} identities and seeds, got {} and {}",
                identities.len(),
                seeds.len()
            );
        }
        let role_assignments: RoleAssignment = identities
            .iter()
            .enumerate()
            .map(|(index, id)| Ok((Role::new(index)?, id.clone())))
            .collect::<Result<_, crate::error::Error>>()?;
        let role_assignments = Arc::new(role_assignments);
        let sess_id = SessionId::from(0_u128);
        let network = LocalNetworkingStore::from_host_ids(&identities);

        let mut jobs = JoinSet::new();
        for (index, (identity, seed)) in identities.iter().zip(&seeds).enumerate() {
            let boot_session = BootSession {
                session_id:       sess_id,
                role_assignments: Arc::clone(&role_assignments),
                networking:       Arc::new(network.get_local_network(identity.clone())),
                own_identity:     identity.clone(),
                own_role:         Role::new(index)?,
            };
            let seed = *seed;
            jobs.spawn(async move {
                let prf = setup_replicated_prf(&boot_session, seed).await?;
                eyre::Ok(Session::new(boot_session, prf, config))
            });
        }
        let mut sessions = Vec::with_capacity(NUM_PARTIES);
        while let Some(t) = jobs.join_next().await {
            sessions.push(t??);
        }
        sessions.sort_by_key(|session| session.own_role().index());

        Ok(LocalRuntime {
            identities,
            role_assignments: Arc::unwrap_or_clone(role_assignments),
            seeds,
            sessions,
        })
    }

    /// Runs `party` once per session, each on its own task, and returns the
    /// outputs in role order. The first error aborts the remaining parties.
    pub async fn run<T, F, Fut>(self, party: F) -> eyre::Result<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(Session) -> Fut,
        Fut: Future<Output = eyre::Result<T>> + Send + 'static,
    {
        let mut jobs = JoinSet::new();
        for session in self.sessions {
            let index = session.own_role().index();
            let fut = party(session);
            jobs.spawn(async move { fut.await.map(|output| (index, output)) });
        }
        let mut outputs = Vec::with_capacity(NUM_PARTIES);
        while let Some(t) = jobs.join_next().await {
            outputs.push(t??);
        }
        outputs.sort_by_key(|(index, _)| *index);
        Ok(outputs.into_iter().map(|(_, output)| output).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::prf::Prf;
    use rand::RngCore;

    #[tokio::test]
    async fn test_async_prf_setup() {
        let identities = generate_local_identities();
        let seeds: Vec<PrfSeed> = (0..3u8).map(|i| [i; 32]).collect();
        let mut runtime = LocalRuntime::new(identities, seeds.clone(), ProtocolConfig::default())
            .await
            .unwrap();

        // check whether parties have sent/received the correct seeds.
        // P0: [seed_0, seed_2]
        // P1: [seed_1, seed_0]
        // P2: [seed_2, seed_1]
        for (i, session) in runtime.sessions.iter_mut().enumerate() {
            let prev = (i + 2) % 3;
            let mut expected = Prf::new(seeds[i], seeds[prev]);
            assert_eq!(
                session.prf.get_my_prf().next_u64(),
                expected.get_my_prf().next_u64()
            );
            assert_eq!(
                session.prf.get_prev_prf().next_u64(),
                expected.get_prev_prf().next_u64()
            );
        }
    }

    #[tokio::test]
    async fn test_servers_share_a_stream() {
        let mut runtime = LocalRuntime::mock_setup().await.unwrap();
        let (servers, _) = runtime.sessions.split_at_mut(2);
        let (s0, s1) = servers.split_at_mut(1);
        let a = s0[0].prf.pair_rng(Role::Server0).unwrap().next_u64();
        let b = s1[0].prf.pair_rng(Role::Server1).unwrap().next_u64();
        assert_eq!(a, b);
        assert!(runtime.sessions[2]
            .prf
            .pair_rng(Role::CryptoProducer)
            .is_err());
    }

    #[tokio::test]
    async fn test_run_returns_outputs_in_role_order() {
        let roles = LocalRuntime::mock_setup()
            .await
            .unwrap()
            .run(|session| async move { Ok(session.own_role()) })
            .await
            .unwrap();
        assert_eq!(roles, Role::ALL.to_vec());
    }
}
