//! Scope matching
//!
//! Scopes are case-insensitive capability tags. A held scope ending in `:*`
//! covers every required scope sharing its prefix: `admin:*` covers
//! `admin:keys:read` but not `reporting:read`.

/// Check whether a single held scope covers a required scope
///
/// Both sides are compared lowercased; inputs are used as-is otherwise.
pub fn scope_covers(held: &str, required: &str) -> bool {
    let held = held.to_lowercase();
    let required = required.to_lowercase();

    if held == required {
        return true;
    }

    if let Some(prefix) = held.strip_suffix('*') {
        if held.ends_with(":*") {
            return required.starts_with(prefix);
        }
    }

    false
}

/// Check whether every required scope is covered by some held scope
pub fn scopes_satisfy(held: &[String], required: &[String]) -> bool {
    required
        .iter()
        .all(|req| held.iter().any(|h| scope_covers(h, req)))
}

/// Required scopes with no covering held scope, in request order
pub fn missing_scopes(held: &[String], required: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|req| !held.iter().any(|h| scope_covers(h, req)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn held(scopes: &[&str]) -> Vec<String> {
        scopes.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_match() {
        assert!(scope_covers("read:data", "read:data"));
        assert!(!scope_covers("read:data", "write:data"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(scope_covers("read:data", "READ:DATA"));
        assert!(scope_covers("READ:DATA", "read:data"));
    }

    #[test]
    fn test_wildcard_suffix() {
        assert!(scope_covers("admin:*", "admin:keys:read"));
        assert!(scope_covers("admin:*", "admin:anything"));
        assert!(!scope_covers("admin:*", "reporting:read"));
    }

    #[test]
    fn test_bare_star_is_not_a_wildcard() {
        // Only the `:*` suffix form is a wildcard
        assert!(!scope_covers("*", "read:data"));
        assert!(!scope_covers("admin*", "admin:keys"));
    }

    #[test]
    fn test_scopes_satisfy() {
        let held = held(&["admin:*", "read:data"]);

        assert!(scopes_satisfy(&held, &["admin:keys:read".to_string()]));
        assert!(scopes_satisfy(
            &held,
            &["read:data".to_string(), "admin:users".to_string()]
        ));
        assert!(!scopes_satisfy(&held, &["write:data".to_string()]));
        // Empty requirement is trivially satisfied
        assert!(scopes_satisfy(&held, &[]));
    }

    #[test]
    fn test_read_only_does_not_cover_admin() {
        let held = held(&["read:data"]);
        assert!(!scopes_satisfy(&held, &["admin:keys:read".to_string()]));
    }

    #[test]
    fn test_missing_scopes() {
        let held = held(&["read:data"]);
        let required = vec!["read:data".to_string(), "write:data".to_string()];

        assert_eq!(missing_scopes(&held, &required), vec!["write:data"]);
        assert!(missing_scopes(&held, &["READ:data".to_string()]).is_empty());
    }
}
