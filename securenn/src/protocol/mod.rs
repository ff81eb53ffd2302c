pub mod boolean;
pub mod comparison;
pub mod config;
pub mod prf;
pub mod private_compare;
pub mod secure_random;
pub mod share_convert;
pub mod sharing;
