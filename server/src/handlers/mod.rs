pub mod auth;
pub mod pages;
pub mod routes;
pub mod utils;
pub mod views;

pub use routes::{Router, build_router};
