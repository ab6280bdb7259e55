//! Session authentication.
//!
//! Sessions are issued after the hosted backend has authenticated the user,
//! validated on every cross-app request, and invalidated on logout or when
//! superseded by a newer login.

pub mod backend;
pub mod handlers;
pub mod ip_lookup;
pub mod issuer;
pub mod token;
pub mod validator;

pub use backend::{BackendTokenVerifier, Claims};
pub use ip_lookup::IpLookup;
pub use issuer::SessionIssuer;
pub use validator::{SessionValidator, ValidatedSession};
