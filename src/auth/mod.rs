pub mod password;
pub mod session;
pub mod token;

pub use password::{PasswordError, PasswordHasher};
pub use session::{authenticate, require_bearer, AuthenticatedAuthor};
pub use token::{TokenIssuer, TokenRejected};
