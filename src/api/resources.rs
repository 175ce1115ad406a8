use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::{AppError, AppResult};

use super::gateway::ApiGateway;

/// Backend collections reachable through the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Projects,
    Milestones,
    Invitations,
    TeamMemberships,
    ProjectTemplates,
    Users,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Projects,
        ResourceKind::Milestones,
        ResourceKind::Invitations,
        ResourceKind::TeamMemberships,
        ResourceKind::ProjectTemplates,
        ResourceKind::Users,
    ];

    /// Collection path, with trailing slash.
    pub fn path(&self) -> &'static str {
        match self {
            ResourceKind::Projects => "/api/projects/",
            ResourceKind::Milestones => "/api/milestones/",
            ResourceKind::Invitations => "/api/invitations/",
            ResourceKind::TeamMemberships => "/api/team-memberships/",
            ResourceKind::ProjectTemplates => "/api/project-templates/",
            ResourceKind::Users => "/api/auth/users/",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::Projects => "projects",
            ResourceKind::Milestones => "milestones",
            ResourceKind::Invitations => "invitations",
            ResourceKind::TeamMemberships => "team-memberships",
            ResourceKind::ProjectTemplates => "project-templates",
            ResourceKind::Users => "users",
        }
    }

    pub fn item_path(&self, id: u64) -> String { format!("{}{}/", self.path(), id) }

    pub fn action_path(&self, id: u64, action: &str) -> String { format!("{}{}/{}/", self.path(), id, action) }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.name()) }
}

impl FromStr for ResourceKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('_', "-");
        ResourceKind::ALL
            .into_iter()
            .find(|k| k.name() == key)
            .ok_or_else(|| AppError::Config { code: "unknown_resource".into(), message: format!("unknown resource '{}'", s) })
    }
}

/// List endpoints answer either with a bare array or with a page wrapper
/// `{"results": [...]}`. Both become a plain vector; an object without `results` and a
/// `null` body are empty lists.
pub fn normalize_list(body: Value) -> AppResult<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(AppError::Decode {
                code: "bad_list".into(),
                message: format!("'results' is not a list: {}", other),
            }),
        },
        Value::Null => Ok(Vec::new()),
        other => Err(AppError::Decode { code: "bad_list".into(), message: format!("expected a list, got {}", other) }),
    }
}

/// CRUD and named actions for the backend collections.
#[derive(Clone)]
pub struct ResourceClient {
    gateway: Arc<ApiGateway>,
}

impl ResourceClient {
    pub fn new(gateway: Arc<ApiGateway>) -> Self { Self { gateway } }

    pub async fn list(&self, kind: ResourceKind) -> AppResult<Vec<Value>> {
        normalize_list(self.gateway.get(kind.path()).await?)
    }

    pub async fn get(&self, kind: ResourceKind, id: u64) -> AppResult<Value> {
        self.gateway.get(&kind.item_path(id)).await
    }

    pub async fn create(&self, kind: ResourceKind, body: Value) -> AppResult<Value> {
        self.gateway.post(kind.path(), Some(body)).await
    }

    pub async fn update(&self, kind: ResourceKind, id: u64, body: Value) -> AppResult<Value> {
        self.gateway.put(&kind.item_path(id), body).await
    }

    pub async fn delete(&self, kind: ResourceKind, id: u64) -> AppResult<Value> {
        self.gateway.delete(&kind.item_path(id)).await
    }

    pub async fn project_team(&self, project_id: u64) -> AppResult<Vec<Value>> {
        normalize_list(self.gateway.get(&ResourceKind::Projects.action_path(project_id, "team")).await?)
    }

    pub async fn project_milestones(&self, project_id: u64) -> AppResult<Vec<Value>> {
        normalize_list(self.gateway.get(&ResourceKind::Projects.action_path(project_id, "milestones")).await?)
    }

    pub async fn accept_invitation(&self, id: u64) -> AppResult<Value> {
        self.gateway.post(&ResourceKind::Invitations.action_path(id, "accept"), None).await
    }

    pub async fn decline_invitation(&self, id: u64) -> AppResult<Value> {
        self.gateway.post(&ResourceKind::Invitations.action_path(id, "decline"), None).await
    }

    pub async fn change_membership_role(&self, membership_id: u64, role: &str) -> AppResult<Value> {
        let path = ResourceKind::TeamMemberships.action_path(membership_id, "change_role");
        self.gateway.post(&path, Some(json!({ "role": role }))).await
    }

    /// Admin only; the backend answers 403 for everyone else.
    pub async fn approve_lecturer(&self, user_id: u64) -> AppResult<Value> {
        self.gateway.post(&ResourceKind::Users.action_path(user_id, "approve_lecturer"), None).await
    }
}
