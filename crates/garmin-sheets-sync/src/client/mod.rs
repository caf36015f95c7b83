pub mod api;
pub mod oauth1;
pub mod session;
pub mod source;
pub mod sso;
pub mod tokens;

pub use api::GarminClient;
pub use oauth1::{OAuth1Signer, OAuthConsumer};
pub use session::{authenticate, AuthSources, Session};
pub use source::{ConnectSource, TelemetrySource};
pub use sso::{SsoClient, SsoEndpoints, DEFAULT_DOMAIN};
pub use tokens::{OAuth1Token, OAuth2Token, SessionTokens};
