//! REST access to the UniTeam backend: the authenticated gateway, credential renewal,
//! the auth endpoints and the resource collections.

mod pending;
mod pipeline;
mod renewal;
mod gateway;
mod auth;
mod resources;

pub use pending::{PendingRequest, MAX_RETRIES};
pub use pipeline::{BearerCredential, JsonHeaders, Middleware, Outgoing, Pipeline, RequestContext, TraceLayer};
pub use renewal::{TokenRenewal, REFRESH_PATH};
pub use gateway::ApiGateway;
pub use auth::{AuthService, LOGIN_PATH, ME_PATH, REGISTER_PATH};
pub use resources::{normalize_list, ResourceClient, ResourceKind};
