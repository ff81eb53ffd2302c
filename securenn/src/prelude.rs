pub use super::{
    error::Error,
    execution::{
        local::LocalRuntime,
        player::{Identity, Role},
        session::{Session, SessionHandles},
    },
    protocol::{
        comparison::{
            greater, greater_equal, less, less_equal, negative, non_negative, relu, select_share,
            Comparator,
        },
        config::ProtocolConfig,
        sharing::{reveal, share, share_fixed},
    },
    shares::{FixedPoint, PrivateTensor, PublicTensor, Ring, RingVec, Tensor},
};
