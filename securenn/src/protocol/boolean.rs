//! Boolean algebra on 0/1 values embedded in a ring.

use crate::{
    error::Error,
    execution::session::{Session, SessionHandles},
    protocol::sharing,
    shares::tensor::{PublicTensor, Tensor},
};
use eyre::Result;
use tracing::instrument;

fn check_bit_operand(x: &Tensor) -> Result<(), Error> {
    if x.is_scaled() {
        return Err(Error::ScaledBitOperand);
    }
    Ok(())
}

/// `1 - x`, local.
pub fn not(session: &Session, x: &Tensor) -> Result<Tensor> {
    check_bit_operand(x)?;
    let one = Tensor::Public(PublicTensor::constant(x.ring(), x.len(), 1));
    Ok(one.sub(x, session.own_role())?)
}

/// `x * y`; one Beaver round when both operands are secret.
#[instrument(level = "trace", target = "securenn::boolean", skip_all, fields(role = %session.own_role()))]
pub async fn and(session: &mut Session, x: &Tensor, y: &Tensor) -> Result<Tensor> {
    check_bit_operand(x)?;
    check_bit_operand(y)?;
    sharing::mul(session, x, y).await
}

/// `x + y - x * y`
#[instrument(level = "trace", target = "securenn::boolean", skip_all, fields(role = %session.own_role()))]
pub async fn or(session: &mut Session, x: &Tensor, y: &Tensor) -> Result<Tensor> {
    let both = and(session, x, y).await?;
    let role = session.own_role();
    Ok(x.add(y, role)?.sub(&both, role)?)
}

/// `x + y - 2 * x * y`
#[instrument(level = "trace", target = "securenn::boolean", skip_all, fields(role = %session.own_role()))]
pub async fn xor(session: &mut Session, x: &Tensor, y: &Tensor) -> Result<Tensor> {
    let both = and(session, x, y).await?;
    let role = session.own_role();
    Ok(x.add(y, role)?.sub(&both.scale(2), role)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        execution::{local::LocalRuntime, player::Role},
        protocol::sharing::{reveal, share},
        shares::{
            ring::{Ring, RingVec},
            tensor::PrivateTensor,
        },
    };
    use rstest::rstest;

    #[derive(Clone, Copy, Debug)]
    enum Kind {
        Public,
        Private,
        Masked,
    }

    async fn bit_tensor(session: &mut Session, ring: Ring, bits: &[u64], kind: Kind) -> Result<Tensor> {
        let owned = (session.own_role() == Role::Server0).then_some(bits);
        Ok(match kind {
            Kind::Public => PublicTensor::new(RingVec::new(ring, bits.to_vec()), false).into(),
            Kind::Private => share(session, Role::Server0, ring, bits.len(), owned, false)
                .await?
                .into(),
            Kind::Masked => {
                let x = share(session, Role::Server0, ring, bits.len(), owned, false).await?;
                sharing::mask(session, &x).await?.into()
            }
        })
    }

    async fn open(session: &mut Session, x: Tensor) -> Result<Vec<u64>> {
        Ok(match x {
            Tensor::Public(p) => p.values().to_vec(),
            other => {
                let x = PrivateTensor::try_from(other)?;
                reveal(session, &x).await?.values().to_vec()
            }
        })
    }

    #[rstest]
    #[tokio::test]
    async fn test_truth_tables(
        #[values(Kind::Public, Kind::Private, Kind::Masked)] left: Kind,
        #[values(Kind::Public, Kind::Private, Kind::Masked)] right: Kind,
        #[values(Ring::PowerOfTwo { bits: 32 }, Ring::Odd { bits: 32 }, Ring::Prime { modulus: 37 })]
        ring: Ring,
    ) -> Result<()> {
        let outputs = LocalRuntime::mock_setup()
            .await?
            .run(move |mut session| async move {
                let x = bit_tensor(&mut session, ring, &[0, 0, 1, 1], left).await?;
                let y = bit_tensor(&mut session, ring, &[0, 1, 0, 1], right).await?;
                let not_x = not(&session, &x)?;
                let and_xy = and(&mut session, &x, &y).await?;
                let or_xy = or(&mut session, &x, &y).await?;
                let xor_xy = xor(&mut session, &x, &y).await?;
                Ok([
                    open(&mut session, not_x).await?,
                    open(&mut session, and_xy).await?,
                    open(&mut session, or_xy).await?,
                    open(&mut session, xor_xy).await?,
                ])
            })
            .await?;

        let [not_x, and_xy, or_xy, xor_xy] = &outputs[0];
        assert_eq!(not_x, &vec![1, 1, 0, 0]);
        assert_eq!(and_xy, &vec![0, 0, 0, 1]);
        assert_eq!(or_xy, &vec![0, 1, 1, 1]);
        assert_eq!(xor_xy, &vec![0, 1, 1, 0]);
        assert_eq!(outputs[0], outputs[1]);
        Ok(())
    }

    #[tokio::test]
    async fn test_scaled_operand_is_rejected() -> Result<()> {
        let runtime = LocalRuntime::mock_setup().await?;
        let session = &runtime.sessions[0];
        let scaled = PublicTensor::new(RingVec::new(session.config().base_ring, vec![1]), true);
        let err = not(session, &scaled.into()).unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::ScaledBitOperand));
        Ok(())
    }
}
