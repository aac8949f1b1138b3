pub mod error;
pub mod password;
pub mod service;

pub use error::AuthError;
pub use password::PasswordKdf;
pub use service::CredentialService;
