//! Role-based column restrictions.

use crate::config::ColumnPolicy;

/// Restriction entry that denies every column of a table to a role.
pub const WILDCARD: &str = "*";

/// Whether `role` may read all of `columns` from `table`.
///
/// Tables or roles absent from the policy are unrestricted.
pub fn validate_column_access<S: AsRef<str>>(
    policy: &ColumnPolicy,
    table: &str,
    columns: &[S],
    role: &str,
) -> bool {
    let Some(restricted) = policy.get(table).and_then(|roles| roles.get(role)) else {
        return true;
    };

    if restricted.iter().any(|c| c == WILDCARD) {
        return false;
    }

    !columns
        .iter()
        .any(|requested| restricted.iter().any(|c| c == requested.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;

    #[test]
    fn test_restricted_column_denied() {
        let policy = SecurityConfig::default().column_policy;
        assert!(!validate_column_access(&policy, "users", &["name", "salary"], "student"));
        assert!(validate_column_access(&policy, "users", &["name", "email"], "student"));
    }

    #[test]
    fn test_wildcard_denies_everything() {
        let policy = SecurityConfig::default().column_policy;
        assert!(!validate_column_access(&policy, "users", &["name"], "alumni"));
        assert!(!validate_column_access::<&str>(&policy, "users", &[], "alumni"));
    }

    #[test]
    fn test_unknown_table_or_role_allowed() {
        let policy = SecurityConfig::default().column_policy;
        assert!(validate_column_access(&policy, "courses", &["name"], "student"));
        assert!(validate_column_access(&policy, "users", &["salary"], "admin"));
    }
}
