pub mod auth;

pub use auth::{authenticate, expired_cookie, extract_token, session_cookie, ACCESS_TOKEN_COOKIE};
