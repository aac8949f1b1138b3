pub mod account;
pub mod credentials;
pub mod json_error;
pub mod server_config;

pub use self::account::{NewSession, Session, User};
pub use self::credentials::CredentialsPayload;
pub use self::json_error::{ErrorResponse, MessageResponse};
pub use self::server_config::{AppConfig, ConfigError};
