//! Cross-application navigation: the system registry, redirect URLs and the
//! legacy SSO credential.

pub mod credential;
pub mod redirect;
pub mod registry;

pub use credential::SsoCredential;
pub use redirect::CrossAppRedirector;
pub use registry::{SystemEntry, SystemRegistry};
