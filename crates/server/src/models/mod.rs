//! Domain models for the Auth and Product collaborators.

pub mod product;
pub mod session;
pub mod user;

pub use product::{NewProduct, Product, ProductPatch};
pub use session::{SESSION_COOKIE_NAME, SessionToken, removal_cookie, session_cookie};
pub use user::{PublicUser, User};
