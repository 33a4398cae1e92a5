//! Wire and domain types shared between the round controller and its hosts.

pub mod domain;
pub mod error;
pub mod money;
pub mod protocol;
