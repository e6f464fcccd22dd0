//! Session state
//!
//! Room membership, role and capability flags of the local participant.

pub mod state;

pub use state::{Capabilities, Membership, Role, Session};
