//! Auditability and role-based access
//!
//! An entity's policy may require roles per [`AccessScope`]. No configured
//! roles means unconditional access; otherwise the caller must hold at least
//! one of them, as reported by the [`IdentityProvider`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use trail_common::AccessScope;

use crate::error::{AuditError, AuditResult};

/// Answers which entities are audited and which roles guard them
pub trait AccessPolicy: Send + Sync {
    fn is_auditable(&self, entity: &str) -> bool;

    /// Roles guarding `scope` on `entity`; `None` grants unconditionally
    fn configured_roles(&self, entity: &str, scope: AccessScope) -> Option<BTreeSet<String>>;
}

/// Identity of the acting user, used for blame and access checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditUser {
    pub id: String,
    pub username: String,
}

/// Who is calling, and what they hold
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<AuditUser>;

    fn is_granted(&self, role: &str) -> bool;
}

/// Fixed identity, for CLIs, jobs and tests
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    user: Option<AuditUser>,
    roles: BTreeSet<String>,
}

impl StaticIdentity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            user: Some(AuditUser {
                id: id.into(),
                username: username.into(),
            }),
            roles: BTreeSet::new(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<AuditUser> {
        self.user.clone()
    }

    fn is_granted(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Fail with `NotAuditable` unless `entity` is audited
pub fn ensure_auditable(policy: &dyn AccessPolicy, entity: &str) -> AuditResult<()> {
    if policy.is_auditable(entity) {
        Ok(())
    } else {
        Err(AuditError::not_auditable(entity))
    }
}

/// Fail with `AccessDenied` unless the caller satisfies `scope` on `entity`
///
/// Without an identity provider, any configured role requirement denies.
pub fn ensure_granted(
    policy: &dyn AccessPolicy,
    identity: Option<&dyn IdentityProvider>,
    entity: &str,
    scope: AccessScope,
) -> AuditResult<()> {
    let Some(roles) = policy.configured_roles(entity, scope) else {
        return Ok(());
    };

    let granted = identity.is_some_and(|id| roles.iter().any(|role| id.is_granted(role)));
    if granted {
        Ok(())
    } else {
        tracing::debug!(entity, scope = %scope, required = ?roles, "Audit access denied");
        Err(AuditError::access_denied(entity, scope))
    }
}
