/// Authentication module
///
/// Token issuing and validation, password hashing, refresh token
/// records and the flows that tie them together.

mod claims;
mod issuer;
mod password;
mod refresh_token;
mod service;
mod validator;

pub use claims::{Claims, TokenType};
pub use issuer::{token_digest, IssuedRefreshToken, TokenIssuer};
pub use password::{BcryptHasher, PasswordError, PasswordHasher, MAX_PASSWORD_BYTES};
pub use refresh_token::{RefreshTokenRecord, RevocationStore};
pub use service::{AuthService, LoginTokens, RefreshedTokens};
pub use validator::TokenValidator;
