//! Client configuration.

use std::time::Duration;

/// Default number of connections the pool may hold.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1;
/// Default timeout applied when establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Options accepted by [`LogHubClient::connect`](crate::LogHubClient::connect).
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// Maximum number of connections the client may keep open at once.
    pub max_connections: usize,
    /// Negotiate TLS after the TCP connect.
    pub use_tls: bool,
    /// Accept any peer certificate chain. Only for trusted private networks.
    pub skip_cert_validation: bool,
    /// Account name sent in every message header.
    pub user: String,
    /// Password sent in every message header.
    pub password: String,
    /// Timeout for establishing a single connection.
    pub connect_timeout: Duration,
}

/// Defaults favour local development: one plaintext connection as the
/// anonymous user.
impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            use_tls: false,
            skip_cert_validation: false,
            user: users::ANONYMOUS.to_owned(),
            password: String::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Account names predefined by the LogHub service.
pub mod users {
    /// Default administrator account.
    pub const DEFAULT_ADMIN: &str = "admin";
    /// Anonymous account.
    pub const ANONYMOUS: &str = "all";
}
