//! Accounts and bearer authentication.

mod extract;
mod password;
mod token;
mod users;

pub use extract::{require_bearer, AuthUser};
pub use password::PasswordHasher;
pub use token::{Claims, TokenIssuer};
pub use users::{login, register, LoginRequest, LoginResponse, LoginUser, RegisterResponse, UserRecord, MIN_PASSWORD_LENGTH};
