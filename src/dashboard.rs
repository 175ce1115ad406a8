//! Per-role dashboard summaries built from normalized resource lists.

use serde::Serialize;
use serde_json::Value;

use crate::api::{ResourceClient, ResourceKind};
use crate::error::{AppError, AppResult};
use crate::identity::Role;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DashboardSummary {
    Student { projects: usize, pending_invitations: usize },
    Lecturer { projects: usize, templates: usize },
    Admin { total_users: usize, students: usize, lecturers: usize, pending_lecturers: usize },
}

fn field_str<'a>(v: &'a Value, key: &str) -> Option<&'a str> { v.get(key).and_then(|x| x.as_str()) }

fn is_lecturer(u: &Value) -> bool { field_str(u, "role") == Some("LECTURER") }

fn is_approved(u: &Value) -> bool { u.get("is_approved").and_then(|x| x.as_bool()).unwrap_or(false) }

pub fn pending_invitations(invitations: &[Value]) -> Vec<Value> {
    invitations.iter().filter(|i| field_str(i, "status") == Some("PENDING")).cloned().collect()
}

/// Lecturer accounts still waiting for admin approval.
pub fn pending_lecturers(users: &[Value]) -> Vec<Value> {
    users.iter().filter(|u| is_lecturer(u) && !is_approved(u)).cloned().collect()
}

pub fn student_summary(projects: &[Value], invitations: &[Value]) -> DashboardSummary {
    DashboardSummary::Student { projects: projects.len(), pending_invitations: pending_invitations(invitations).len() }
}

pub fn lecturer_summary(projects: &[Value], templates: &[Value]) -> DashboardSummary {
    DashboardSummary::Lecturer { projects: projects.len(), templates: templates.len() }
}

pub fn admin_summary(users: &[Value]) -> DashboardSummary {
    DashboardSummary::Admin {
        total_users: users.len(),
        students: users.iter().filter(|u| field_str(u, "role") == Some("STUDENT")).count(),
        lecturers: users.iter().filter(|u| is_lecturer(u) && is_approved(u)).count(),
        pending_lecturers: pending_lecturers(users).len(),
    }
}

/// Fetch what the role's dashboard shows. Lists are fetched concurrently; the first
/// failure is returned.
pub async fn load_dashboard(resources: &ResourceClient, role: &Role) -> AppResult<DashboardSummary> {
    match role {
        Role::Student => {
            let (projects, invitations) = tokio::try_join!(
                resources.list(ResourceKind::Projects),
                resources.list(ResourceKind::Invitations)
            )?;
            Ok(student_summary(&projects, &invitations))
        }
        Role::Lecturer => {
            let (projects, templates) = tokio::try_join!(
                resources.list(ResourceKind::Projects),
                resources.list(ResourceKind::ProjectTemplates)
            )?;
            Ok(lecturer_summary(&projects, &templates))
        }
        Role::Admin => {
            let users = resources.list(ResourceKind::Users).await?;
            Ok(admin_summary(&users))
        }
        Role::Unknown(r) => Err(AppError::Forbidden { code: "no_dashboard".into(), message: format!("no dashboard for role '{}'", r) }),
    }
}
