pub mod password;
pub mod token;

pub use password::PasswordHasher;
pub use token::{JwtMaker, Payload, TokenError, TokenMaker, MIN_SECRET_KEY_SIZE};
