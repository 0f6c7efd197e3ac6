pub mod jwt;
pub mod password;
pub mod rbac;
pub mod refresh;
pub mod service;

pub use jwt::{Claims, NewToken, TokenData, TokenIssuer, TokenType};
pub use password::{HashedSecret, PasswordHasher};
pub use refresh::RefreshTokenSet;
pub use service::{AuthService, LoginOutcome, LogoutOutcome, Rejection};
