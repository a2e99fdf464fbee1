//! Role tokens.
//!
//! A user's `Roles` column is a space-separated list of role names. Only the
//! names below are built in; anything else is a custom assignment.

pub const SYSTEM_USER_ROLE: &str = "system_user";
pub const SYSTEM_ADMIN_ROLE: &str = "system_admin";
pub const SYSTEM_GUEST_ROLE: &str = "system_guest";

/// Every built-in role name.
pub const BUILT_IN_ROLES: &[&str] = &[
    SYSTEM_USER_ROLE,
    SYSTEM_ADMIN_ROLE,
    SYSTEM_GUEST_ROLE,
    "system_post_all",
    "system_post_all_public",
    "system_user_access_token",
    "system_user_manager",
    "system_read_only_admin",
    "system_manager",
    "team_user",
    "team_admin",
    "team_guest",
    "team_post_all",
    "team_post_all_public",
    "channel_user",
    "channel_admin",
    "channel_guest",
];

pub fn is_built_in_role(name: &str) -> bool {
    BUILT_IN_ROLES.contains(&name)
}

/// Replace `system_guest` with `system_user`, keeping every other token.
pub fn promote_guest_roles(roles: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for token in roles.split_whitespace() {
        let token = if token == SYSTEM_GUEST_ROLE {
            SYSTEM_USER_ROLE
        } else {
            token
        };
        if !out.contains(&token) {
            out.push(token);
        }
    }
    if !out.contains(&SYSTEM_USER_ROLE) {
        out.insert(0, SYSTEM_USER_ROLE);
    }
    out.join(" ")
}

/// Replace `system_user` with `system_guest` and drop `system_admin`,
/// keeping every other token.
pub fn demote_user_roles(roles: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for token in roles.split_whitespace() {
        let token = match token {
            SYSTEM_ADMIN_ROLE => continue,
            SYSTEM_USER_ROLE => SYSTEM_GUEST_ROLE,
            other => other,
        };
        if !out.contains(&token) {
            out.push(token);
        }
    }
    if !out.contains(&SYSTEM_GUEST_ROLE) {
        out.insert(0, SYSTEM_GUEST_ROLE);
    }
    out.join(" ")
}

/// Keep only built-in tokens. Returns `None` when nothing changes.
pub fn strip_custom_roles(roles: &str) -> Option<String> {
    let kept: Vec<&str> = roles
        .split_whitespace()
        .filter(|token| is_built_in_role(token))
        .collect();
    let cleaned = kept.join(" ");
    if cleaned == roles {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("system_guest", "system_user")]
    #[test_case("system_guest custom_role", "system_user custom_role")]
    #[test_case("", "system_user")]
    #[test_case("system_user system_guest", "system_user")]
    fn test_promote(input: &str, expected: &str) {
        assert_eq!(promote_guest_roles(input), expected);
    }

    #[test_case("system_user", "system_guest")]
    #[test_case("system_user system_admin", "system_guest")]
    #[test_case("system_admin system_user custom", "system_guest custom")]
    #[test_case("custom", "system_guest custom")]
    fn test_demote(input: &str, expected: &str) {
        assert_eq!(demote_user_roles(input), expected);
    }

    #[test]
    fn test_strip_custom_roles() {
        assert_eq!(
            strip_custom_roles("system_user custom_role"),
            Some("system_user".to_string())
        );
        assert_eq!(strip_custom_roles("system_user system_admin"), None);
        assert_eq!(strip_custom_roles("only_custom"), Some(String::new()));
    }

    #[test]
    fn test_strip_normalizes_spacing() {
        assert_eq!(
            strip_custom_roles("system_user  team_user"),
            Some("system_user team_user".to_string())
        );
    }
}
