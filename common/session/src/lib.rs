pub mod claims;
pub mod config;
pub mod context;
pub mod error;
pub mod extract;
pub mod guard;
pub mod keyset;
pub mod project;
pub mod tokens;
pub mod verifier;

pub use claims::Claims;
pub use config::{CookieSameSite, GuardConfig, UsernameClaim};
pub use context::{identity_headers, run_tags};
pub use error::{AuthError, AuthResult};
pub use extract::{ensure_admin, ensure_permission, ensure_role, AuthContext, GuardError};
pub use guard::{session_guard, Outcome, SessionGuard};
pub use keyset::{KeyCache, KeySetClient};
pub use project::{project, PermissionLevel, UserContext};
pub use tokens::{TokenPair, TokenStore, Transport};
pub use verifier::{IdentityVerifier, RemoteVerifier, RemoteVerifierBuilder, Verification};
