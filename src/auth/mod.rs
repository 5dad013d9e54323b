//! Session ownership, identity claims and profile completion.

mod gate;
mod identity;
pub mod provider;
mod registry;
mod username;

pub use gate::{AuthError, AuthGate, OperatorPolicy, ProfileError, SignUp};
pub use identity::{Identity, Role, Session};
pub use registry::SessionRegistry;
pub use username::{UsernameRejection, validate_username};
