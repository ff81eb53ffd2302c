pub mod fingerprint;
pub mod fixed_point;
pub mod ring;
pub mod tensor;

pub use fixed_point::FixedPoint;
pub use ring::{Ring, RingVec};
pub use tensor::{MaskedTensor, PrivateTensor, PublicTensor, Tensor};
