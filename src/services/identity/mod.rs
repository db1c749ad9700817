pub mod factory;
pub mod firebase;
#[cfg(test)]
pub mod memory;
pub mod provider;

pub use factory::build_identity_provider;
pub use provider::{
    CustomClaims, IdentityProvider, NewUser, ProviderError, ProviderResult, UserMetadata,
    UserRecord, UserUpdate, VerifiedIdToken,
};
