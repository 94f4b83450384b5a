//! Domain model shared across the MedSecure authorization crates.

pub mod actor;
pub mod decision;
pub mod resource;

pub use actor::{Actor, Role};
pub use decision::{Decision, DecisionReason};
pub use resource::{Action, Attributes, ResourceRef, ResourceType};
