//! Declarative route table and navigation decisions.
//!
//! Every page route is declared once with its access rule; `navigate` resolves a path,
//! runs the matching gate and reports what the front end should do.

use crate::identity::{default_route_for, evaluate, evaluate_public, Decision, PublicDecision, Role, RouteGuard, Session};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAccess {
    /// Login and signup: authenticated users are sent to their dashboard.
    Public,
    Protected(RouteGuard),
}

#[derive(Debug, Clone)]
pub struct RouteEntry {
    /// Segment pattern; `:name` matches exactly one non-empty segment.
    pub pattern: &'static str,
    pub access: RouteAccess,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    Render(&'static str),
    Redirect(String),
    NotFound,
}

pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self { Self { entries: Vec::new() } }

    pub fn public(mut self, pattern: &'static str) -> Self {
        self.entries.push(RouteEntry { pattern, access: RouteAccess::Public });
        self
    }

    pub fn protected(mut self, pattern: &'static str, guard: RouteGuard) -> Self {
        self.entries.push(RouteEntry { pattern, access: RouteAccess::Protected(guard) });
        self
    }

    /// Area with a layout route and its child pages, all sharing one guard.
    pub fn area(mut self, prefix: &'static str, children: &[&'static str], guard: RouteGuard) -> Self {
        self = self.protected(prefix, guard.clone());
        for child in children {
            self = self.protected(child, guard.clone());
        }
        self
    }

    /// The application's routes.
    pub fn standard() -> Self {
        RouteTable::new()
            .public("/login")
            .public("/signup")
            .protected("/", RouteGuard::authenticated())
            .area(
                "/student",
                &["/student/dashboard", "/student/projects", "/student/invitations", "/student/profile"],
                RouteGuard::roles([Role::Student]),
            )
            .area(
                "/lecturer",
                &["/lecturer/dashboard", "/lecturer/projects", "/lecturer/templates", "/lecturer/profile"],
                RouteGuard::roles([Role::Lecturer]),
            )
            .area(
                "/admin",
                &["/admin/dashboard", "/admin/users", "/admin/lecturers/pending", "/admin/profile"],
                RouteGuard::roles([Role::Admin]),
            )
            .protected("/projects/:id", RouteGuard::authenticated())
    }

    pub fn entries(&self) -> &[RouteEntry] { &self.entries }

    pub fn resolve(&self, path: &str) -> Option<&RouteEntry> {
        let path = normalize_path(path);
        self.entries.iter().find(|e| pattern_matches(e.pattern, &path))
    }

    pub fn navigate(&self, session: &Session, path: &str) -> NavOutcome {
        let Some(entry) = self.resolve(path) else {
            return NavOutcome::NotFound;
        };
        match &entry.access {
            RouteAccess::Public => match evaluate_public(session) {
                PublicDecision::Render => NavOutcome::Render(entry.pattern),
                PublicDecision::Redirect(to) => NavOutcome::Redirect(to.to_string()),
            },
            RouteAccess::Protected(guard) => match evaluate(session, guard) {
                // the root only dispatches to the role's dashboard
                Decision::Render if entry.pattern == "/" => NavOutcome::Redirect(default_route_for(session.role()).to_string()),
                Decision::Render => NavOutcome::Render(entry.pattern),
                redirect => NavOutcome::Redirect(redirect.target(session).unwrap_or(default_route_for(None)).to_string()),
            },
        }
    }
}

impl Default for RouteTable {
    fn default() -> Self { Self::standard() }
}

fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or("");
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/".to_string() } else if trimmed.starts_with('/') { trimmed.to_string() } else { format!("/{}", trimmed) }
}

fn pattern_matches(pattern: &str, path: &str) -> bool {
    let pat: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    pat.len() == segs.len()
        && pat.iter().zip(segs.iter()).all(|(p, s)| p.starts_with(':') || p == s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::UserProfile;

    fn signed_in(role: Role) -> Session {
        Session {
            access_token: Some("t1".into()),
            refresh_token: Some("r1".into()),
            user: Some(UserProfile::new(1, "u", role)),
        }
    }

    #[test]
    fn anonymous_users_see_only_public_pages() {
        let t = RouteTable::standard();
        let anon = Session::default();
        assert_eq!(t.navigate(&anon, "/login"), NavOutcome::Render("/login"));
        assert_eq!(t.navigate(&anon, "/signup/"), NavOutcome::Render("/signup"));
        for p in ["/", "/student/dashboard", "/admin/users", "/projects/42"] {
            assert_eq!(t.navigate(&anon, p), NavOutcome::Redirect("/login".into()), "{}", p);
        }
    }

    #[test]
    fn root_and_public_pages_dispatch_to_role_dashboard() {
        let t = RouteTable::standard();
        let lecturer = signed_in(Role::Lecturer);
        assert_eq!(t.navigate(&lecturer, "/"), NavOutcome::Redirect("/lecturer/dashboard".into()));
        assert_eq!(t.navigate(&lecturer, "/login"), NavOutcome::Redirect("/lecturer/dashboard".into()));
    }

    #[test]
    fn wrong_area_redirects_home() {
        let t = RouteTable::standard();
        let student = signed_in(Role::Student);
        assert_eq!(t.navigate(&student, "/student/invitations"), NavOutcome::Render("/student/invitations"));
        assert_eq!(t.navigate(&student, "/lecturer/templates"), NavOutcome::Redirect("/student/dashboard".into()));
        assert_eq!(t.navigate(&student, "/admin/lecturers/pending?page=2"), NavOutcome::Redirect("/student/dashboard".into()));
        assert_eq!(t.navigate(&student, "/projects/7"), NavOutcome::Render("/projects/:id"));
    }

    #[test]
    fn unknown_paths_are_not_found() {
        let t = RouteTable::standard();
        let admin = signed_in(Role::Admin);
        assert_eq!(t.navigate(&admin, "/admin/settings"), NavOutcome::NotFound);
        assert_eq!(t.navigate(&admin, "/projects"), NavOutcome::NotFound);
        assert_eq!(t.navigate(&Session::default(), "/nowhere"), NavOutcome::NotFound);
    }
}
