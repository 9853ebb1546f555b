//! Host-facing contract, command channel and stdio bridge for the player shell.

pub mod channel;
pub mod contract;
pub mod stdio;
