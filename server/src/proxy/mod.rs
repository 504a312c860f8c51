pub mod credentials;
pub mod registry;
pub mod state;
pub mod transport;

pub use credentials::AccessToken;
pub use registry::{AnonymousTransport, RegisteredSession, SessionRegistry};
pub use state::{ProxyState, ResolvedTransport};
pub use transport::OutboundSettings;
