//! Ownership/admin policy applied to every user-owned resource.
//!
//! An identity may act on a row iff it is an admin or owns the row. Listings
//! are scoped the same way: admins see everything, everyone else sees their
//! own rows.

use crate::error::AppError;
use crate::gate::{Denial, Identity};

/// Row visibility for a listing query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Only rows owned by this user id
    Owner(i64),
    /// Every row
    All,
}

impl Scope {
    /// Owner id to filter on, `None` for unrestricted
    pub fn owner_filter(self) -> Option<i64> {
        match self {
            Scope::Owner(user_id) => Some(user_id),
            Scope::All => None,
        }
    }
}

/// Listing scope for an identity
pub fn scope_for(identity: &Identity) -> Scope {
    if identity.is_admin {
        Scope::All
    } else {
        Scope::Owner(identity.user_id)
    }
}

/// Permit iff `identity` is admin or owns the resource
pub fn authorize_owner(identity: &Identity, owner_id: i64) -> Result<(), Denial> {
    if identity.is_admin || identity.user_id == owner_id {
        Ok(())
    } else {
        Err(Denial::NotOwner)
    }
}

/// Ownership check for resources whose existence must not leak:
/// a foreign row is reported exactly like a missing one.
pub fn authorize_owner_or<E>(identity: &Identity, owner_id: i64, not_found: E) -> Result<(), E>
where
    E: Into<AppError>,
{
    authorize_owner(identity, owner_id).map_err(|_| not_found)
}
