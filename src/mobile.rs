//! Bridge exposed to the mobile host application.

pub mod identity;
pub mod mobile_node;

pub use identity::{ConfiguredIdentitySelector, Identity, IdentitySelector};
pub use mobile_node::MobileNode;
