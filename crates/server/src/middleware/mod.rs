mod secret;

pub use secret::{require_secret, SecretError, SecretStore};
