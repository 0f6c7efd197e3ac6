//! Role hierarchy claims.
//!
//! Roles form a strict hierarchy: an Admin may do everything a User can, and a
//! User everything a Guest can. Rather than teaching every consumer about the
//! ordering, an access token carries the full claim set implied by its role:
//!
//! ```text
//! Guest  → ["Guest"]
//! User   → ["Guest", "User"]
//! Admin  → ["Guest", "User", "Admin"]
//! ```
//!
//! so a policy check is a plain membership test on the token's `roles` claim.

use crate::domain::UserRole;
use crate::error::AuthError;

const GUEST: &[UserRole] = &[UserRole::Guest];
const USER: &[UserRole] = &[UserRole::Guest, UserRole::User];
const ADMIN: &[UserRole] = &[UserRole::Guest, UserRole::User, UserRole::Admin];

/// Every role implied by `role`, lowest first.
pub fn implied_roles(role: UserRole) -> &'static [UserRole] {
    match role {
        UserRole::Guest => GUEST,
        UserRole::User => USER,
        UserRole::Admin => ADMIN,
    }
}

/// The `roles` claim values written into an access token for `role`.
pub fn role_claims(role: UserRole) -> Vec<String> {
    implied_roles(role)
        .iter()
        .map(|r| r.as_str().to_string())
        .collect()
}

/// Whether a claim set satisfies a check for `required`.
pub fn satisfies(claims: &[String], required: UserRole) -> bool {
    claims.iter().any(|c| c == required.as_str())
}

/// Check a claim set or return an error naming the missing role.
pub fn check_role(claims: &[String], required: UserRole) -> Result<(), AuthError> {
    if satisfies(claims, required) {
        Ok(())
    } else {
        Err(AuthError::InvalidToken(format!(
            "Role '{}' required",
            required
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_sets_are_nested() {
        for pair in UserRole::ALL.windows(2) {
            let lower = role_claims(pair[0]);
            let higher = role_claims(pair[1]);
            assert!(lower.iter().all(|c| higher.contains(c)));
            assert_eq!(higher.len(), lower.len() + 1);
        }
    }

    #[test]
    fn test_claims_match_ordering() {
        for held in UserRole::ALL {
            let claims = role_claims(held);
            for required in UserRole::ALL {
                assert_eq!(satisfies(&claims, required), required <= held);
            }
        }
    }

    #[test]
    fn test_check_role_error() {
        let claims = role_claims(UserRole::Guest);
        assert!(check_role(&claims, UserRole::Guest).is_ok());
        assert!(matches!(
            check_role(&claims, UserRole::Admin),
            Err(AuthError::InvalidToken(_))
        ));
    }
}
