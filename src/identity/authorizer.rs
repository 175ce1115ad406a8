use std::collections::HashSet;

use tracing::debug;

use super::profile::Role;
use super::router::default_route_for;
use super::session::Session;
use crate::config::LOGIN_ROUTE;

/// Per-route access declaration. An empty role set admits any authenticated user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteGuard {
    pub allowed_roles: HashSet<Role>,
}

impl RouteGuard {
    /// Any authenticated user.
    pub fn authenticated() -> Self { Self::default() }

    pub fn roles<I: IntoIterator<Item = Role>>(roles: I) -> Self {
        Self { allowed_roles: roles.into_iter().collect() }
    }

    pub fn admits(&self, role: &Role) -> bool {
        self.allowed_roles.is_empty() || self.allowed_roles.contains(role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Render,
    RedirectLogin,
    RedirectHome,
}

impl Decision {
    /// Where a redirect decision sends the user. `None` for `Render`.
    pub fn target(&self, session: &Session) -> Option<&'static str> {
        match self {
            Decision::Render => None,
            Decision::RedirectLogin => Some(LOGIN_ROUTE),
            Decision::RedirectHome => Some(default_route_for(session.role())),
        }
    }
}

/// Gate for protected routes. Rules apply in order: no user, then role mismatch.
pub fn evaluate(session: &Session, guard: &RouteGuard) -> Decision {
    let Some(user) = session.user.as_ref() else {
        return Decision::RedirectLogin;
    };
    if !guard.admits(&user.role) {
        debug!(target: "uniteam::gate", "role {} not in {:?}", user.role, guard.allowed_roles);
        return Decision::RedirectHome;
    }
    Decision::Render
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicDecision {
    Render,
    Redirect(&'static str),
}

/// Gate for login/signup pages: an authenticated user is sent to their own landing route.
pub fn evaluate_public(session: &Session) -> PublicDecision {
    match session.user.as_ref() {
        Some(user) => PublicDecision::Redirect(default_route_for(Some(&user.role))),
        None => PublicDecision::Render,
    }
}
