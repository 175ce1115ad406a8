use super::profile::Role;
use crate::config::LOGIN_ROUTE;

/// Landing route for a role. Total and pure: anything that is not one of the three known
/// roles, including no user at all, lands on the login route.
pub fn default_route_for(role: Option<&Role>) -> &'static str {
    match role {
        Some(Role::Student) => "/student/dashboard",
        Some(Role::Lecturer) => "/lecturer/dashboard",
        Some(Role::Admin) => "/admin/dashboard",
        Some(Role::Unknown(_)) | None => LOGIN_ROUTE,
    }
}
