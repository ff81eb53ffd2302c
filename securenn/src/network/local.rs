use crate::{
    execution::{player::Identity, session::SessionId},
    network::Networking,
};
use async_trait::async_trait;
use dashmap::DashMap;
use eyre::eyre;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Value {
    value: Vec<u8>,
}

type P2PChannels = Arc<
    DashMap<
        (Identity, Identity),
        (
            Arc<async_channel::Sender<Value>>,
            Arc<async_channel::Receiver<Value>>,
        ),
    >,
>;

/// In-memory point-to-point channels between every ordered pair of parties.
#[derive(Debug, Clone)]
pub struct LocalNetworkingStore {
    p2p_channels: P2PChannels,
}

impl LocalNetworkingStore {
    pub fn from_host_ids(identities: &[Identity]) -> Self {
        let p2p = DashMap::new();
        for sender in identities {
            for receiver in identities {
                if sender != receiver {
                    let (tx, rx) = async_channel::unbounded::<Value>();
                    p2p.insert((sender.clone(), receiver.clone()), (Arc::new(tx), Arc::new(rx)));
                }
            }
        }
        LocalNetworkingStore {
            p2p_channels: Arc::new(p2p),
        }
    }

    pub fn get_local_network(&self, owner: Identity) -> LocalNetworking {
        LocalNetworking {
            p2p_channels: Arc::clone(&self.p2p_channels),
            owner,
        }
    }
}

#[derive(Debug)]
pub struct LocalNetworking {
    p2p_channels: P2PChannels,
    pub owner:    Identity,
}

#[async_trait]
impl Networking for LocalNetworking {
    async fn send(
        &self,
        val: Vec<u8>,
        receiver: &Identity,
        session_id: &SessionId,
    ) -> eyre::Result<()> {
        let (tx, _) = self
            .p2p_channels
            .get(&(self.owner.clone(), receiver.clone()))
            .ok_or_else(|| {
                eyre!(
                    "p2p channel retrieve error when sending: owner: {:?}, receiver: {:?}, \
                     session {:?}",
                    self.owner,
                    receiver,
                    session_id
                )
            })?
            .value()
            .clone();

        tx.send(Value { value: val }).await?;
        Ok(())
    }

    async fn receive(&self, sender: &Identity, session_id: &SessionId) -> eyre::Result<Vec<u8>> {
        let (_, rx) = self
            .p2p_channels
            .get(&(sender.clone(), self.owner.clone()))
            .ok_or_else(|| {
                eyre!(
                    "p2p channel retrieve error when receiving: owner: {:?}, sender: {:?}, \
                     session {:?}",
                    self.owner,
                    sender,
                    session_id
                )
            })?
            .value()
            .clone();

        let received_value = rx.recv().await?;
        Ok(received_value.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        network::value::NetworkValue,
        shares::ring::{Ring, RingVec},
    };

    #[tokio::test]
    async fn test_network_send_receive() {
        let identities: Vec<Identity> = vec!["alice".into(), "bob".into(), "charlie".into()];
        let networking_store = LocalNetworkingStore::from_host_ids(&identities);

        let alice = networking_store.get_local_network("alice".into());
        let bob = networking_store.get_local_network("bob".into());
        let value = NetworkValue::RingVec(RingVec::new(Ring::PowerOfTwo { bits: 16 }, vec![777]));
        let expected = value.clone();

        let task1 = tokio::spawn(async move {
            let recv = bob.receive(&"alice".into(), &SessionId(1)).await.unwrap();
            assert_eq!(NetworkValue::from_network(&recv).unwrap(), expected);
        });
        let task2 = tokio::spawn(async move {
            alice
                .send(value.to_network().unwrap(), &"bob".into(), &SessionId(1))
                .await
                .unwrap()
        });

        let _ = tokio::try_join!(task1, task2).unwrap();
    }

    #[tokio::test]
    async fn test_messages_keep_their_order() {
        let identities: Vec<Identity> = vec!["alice".into(), "bob".into()];
        let networking_store = LocalNetworkingStore::from_host_ids(&identities);
        let alice = networking_store.get_local_network("alice".into());
        let bob = networking_store.get_local_network("bob".into());

        for i in 0..4u8 {
            alice.send(vec![i], &"bob".into(), &SessionId(0)).await.unwrap();
        }
        for i in 0..4u8 {
            assert_eq!(bob.receive(&"alice".into(), &SessionId(0)).await.unwrap(), vec![i]);
        }
        assert!(alice.send(vec![0], &"alice".into(), &SessionId(0)).await.is_err());
    }
}
