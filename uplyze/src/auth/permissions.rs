//! Role checks used by handlers.

use crate::{
    api::models::users::{CurrentUser, Role},
    errors::{Error, Result},
    types::{Operation, Permission, Resource},
};

/// Require the admin grant, rejecting with 403 otherwise.
pub fn require_admin(user: &CurrentUser, resource: Resource, action: Operation) -> Result<()> {
    if user.is_admin || user.roles.contains(&Role::Admin) {
        return Ok(());
    }
    Err(Error::InsufficientPermissions {
        required: Permission::Allow(resource, action),
        action,
        resource: resource.to_string(),
    })
}

/// Allow admins, or the user operating on their own resources.
pub fn require_self_or_admin(user: &CurrentUser, owner: crate::types::UserId, resource: Resource, action: Operation) -> Result<()> {
    if user.id == owner {
        return Ok(());
    }
    require_admin(user, resource, action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(is_admin: bool, roles: Vec<Role>) -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            username: "u".to_string(),
            email: "u@example.com".to_string(),
            is_admin,
            roles,
            display_name: None,
            avatar_url: None,
        }
    }

    #[test]
    fn test_require_admin() {
        let admin = user(true, vec![Role::Admin]);
        assert!(require_admin(&admin, Resource::Users, Operation::ReadAll).is_ok());

        // Role grant alone is enough
        let granted = user(false, vec![Role::Admin]);
        assert!(require_admin(&granted, Resource::Users, Operation::ReadAll).is_ok());

        let customer = user(false, vec![Role::Customer]);
        let err = require_admin(&customer, Resource::Users, Operation::ReadAll).unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_require_self_or_admin() {
        let customer = user(false, vec![Role::Customer]);
        assert!(require_self_or_admin(&customer, customer.id, Resource::ApiKeys, Operation::ReadOwn).is_ok());
        assert!(require_self_or_admin(&customer, Uuid::new_v4(), Resource::ApiKeys, Operation::ReadAll).is_err());
    }
}
