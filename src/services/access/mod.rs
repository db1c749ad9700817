pub mod policy;
pub mod role;

pub use policy::{AccessPolicy, Decision, Grant, RoleRequirement};
pub use role::Role;
