pub mod manager;

pub use manager::{RequestSession, SessionManager, SessionToken};
