pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod logging;
pub mod migrations;
pub mod models;
pub mod prelude;
pub mod store;
pub mod testing;
pub mod users;

pub use api::{ApiError, AuthApi};
pub use auth::AuthService;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthSettings, Config};
pub use error::AuthError;
pub use testing::TestHarness;
