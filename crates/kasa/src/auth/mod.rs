//! Authentication types and session management.
//!
//! Everything that touches credentials lives here: the token types, the
//! identity carried inside an access token, single-flight renewal, and
//! the [`Session`] that ties them to a [`CredentialStore`](crate::store::CredentialStore).

pub mod claims;
mod credentials;
mod refresh;
mod session;
mod tokens;

pub use claims::{Claims, Identity, SubjectId};
pub use credentials::{LoginCredentials, Registration};
pub use refresh::{RefreshCoordinator, Renewer, SessionObserver};
pub use session::{Session, SessionState};
pub use tokens::{AccessToken, CredentialPair, RefreshToken};
