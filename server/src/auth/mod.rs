pub mod password;
pub mod permissions;
pub mod session;

pub use permissions::{authorize, Permission};
pub use session::{CurrentUser, SESSION_COOKIE};
