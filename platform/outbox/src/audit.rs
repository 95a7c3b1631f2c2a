use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Who created / last modified an entity, and when
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditInfo {
    pub created_by: Option<String>,
    pub created_on: Option<DateTime<Utc>>,
    pub modified_by: Option<String>,
    pub modified_on: Option<DateTime<Utc>>,
}

impl AuditInfo {
    pub(crate) fn stamp_created(&mut self, user: &str, at: DateTime<Utc>) {
        self.created_by = Some(user.to_string());
        self.created_on = Some(at);
    }

    pub(crate) fn stamp_modified(&mut self, user: &str, at: DateTime<Utc>) {
        self.modified_by = Some(user.to_string());
        self.modified_on = Some(at);
    }
}

/// Identity of the caller on whose behalf a commit runs
pub trait CurrentUser: Send + Sync {
    fn username(&self) -> String;
}

/// Fixed identity, used by background jobs and tests
#[derive(Debug, Clone)]
pub struct SystemUser(pub String);

impl Default for SystemUser {
    fn default() -> Self {
        Self("system".to_string())
    }
}

impl CurrentUser for SystemUser {
    fn username(&self) -> String {
        self.0.clone()
    }
}

impl<T: CurrentUser + ?Sized> CurrentUser for Arc<T> {
    fn username(&self) -> String {
        (**self).username()
    }
}
