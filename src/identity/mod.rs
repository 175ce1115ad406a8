//! Client-side identity: who is logged in and which routes they may see.
//! Keep the public surface thin and split implementation across sub-modules.

mod profile;
mod session;
mod authorizer;
mod router;
mod navigator;

pub use profile::{Role, UserProfile};
pub use session::{Session, SessionStore, SessionUpdate};
pub use authorizer::{evaluate, evaluate_public, Decision, PublicDecision, RouteGuard};
pub use router::default_route_for;
pub use navigator::{Navigator, RecordingNavigator};
