pub mod login;
pub mod logout;
pub mod register;

pub use login::{handle_login, handle_login_form, handle_login_page};
pub use logout::handle_logout;
pub use register::handle_register;
