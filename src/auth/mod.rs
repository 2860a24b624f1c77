//! Users, sessions and request credentials

pub mod session;
pub mod users;

pub use session::{SessionStore, SESSION_COOKIE};
pub use users::{Role, User, UserStore};

/// The authenticated caller of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInUser {
    pub user_id: i64,
    pub org_id: i64,
    pub login: String,
    pub role: Role,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no credentials supplied")]
    MissingCredentials,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("session expired or unknown")]
    InvalidSession,
}
