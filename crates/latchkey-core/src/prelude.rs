//! latchkey prelude: import everything you need with one line.
//!
//! ```rust,ignore
//! use latchkey_core::prelude::*;
//! ```

// ── Core types ─────────────────────────────────────────────────
pub use crate::AuthError;
pub use crate::Config;
pub use crate::{AuthSettings, Clock, ManualClock, SystemClock};

// ── Operations ─────────────────────────────────────────────────
pub use crate::api::{
    ApiError, AuthApi, LoginRequest, LogoutRequest, RegisterRequest, TokenDataDto,
    TokenRefreshRequest, TokenResponse, UserResponse,
};
pub use crate::auth::{AuthService, Claims, LoginOutcome, LogoutOutcome, Rejection};
pub use crate::users::{RegisterOutcome, UserService};

// ── Storage ────────────────────────────────────────────────────
pub use crate::domain::{User, UserRole};
pub use crate::store::{Database, MemoryStore, UnitOfWork, UnitOfWorkFactory};
