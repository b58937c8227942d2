pub mod claims;
pub mod credentials;
pub mod session;
pub mod storage;

pub use claims::{AccessClaims, Role};
pub use credentials::CredentialStore;
pub use session::{LoginRequest, LoginResponse, SessionManager};
pub use storage::{JsonFileTokenStore, StoredCredentials, TokenStore};
