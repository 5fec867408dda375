//! Company (tenant) record, as seen by the billing subsystem.
//!
//! The wider application owns the rest of the company profile; billing only
//! reads ownership for authorization and writes the entitlement projection.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CompanyId, UserId};

use super::entitlement::CompanyEntitlement;

/// The slice of a company record the billing subsystem works with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    /// Account owner; every user-initiated billing mutation verifies this.
    pub owner_user_id: UserId,
    /// Contact address for transactional email.
    pub contact_email: Option<String>,
    pub entitlement: CompanyEntitlement,
}

impl Company {
    /// True when `user_id` owns this company.
    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.owner_user_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_check_matches_owner() {
        let owner = UserId::new("user-1").unwrap();
        let company = Company {
            id: CompanyId::new(),
            name: "Escuela San Martín".to_string(),
            owner_user_id: owner.clone(),
            contact_email: Some("admin@sanmartin.edu.ar".to_string()),
            entitlement: CompanyEntitlement::none(),
        };

        assert!(company.is_owned_by(&owner));
        assert!(!company.is_owned_by(&UserId::new("user-2").unwrap()));
    }
}
