//! Who may run record commands.
//!
//! The original bot answered anyone, so an empty `allow_users` list keeps that
//! behaviour. Once the list has entries, a caller must match one of them.

/// Identity of the sender of a Telegram message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    /// Username without `@`; empty for accounts without one.
    pub username: String,
    pub user_id: String,
}

impl Caller {
    pub fn new(username: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            user_id: user_id.into(),
        }
    }

    fn matches(&self, entry: &str) -> bool {
        match entry.trim().trim_start_matches('@') {
            "" => false,
            "*" => true,
            name => name == self.username || name == self.user_id,
        }
    }
}

/// Entries are usernames (with or without `@`), numeric user IDs or `"*"`.
/// Usernames compare case-sensitively.
pub fn is_allowed(allow_users: &[String], caller: &Caller) -> bool {
    allow_users.is_empty() || allow_users.iter().any(|entry| caller.matches(entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn open_when_unconfigured() {
        assert!(is_allowed(&[], &Caller::new("reception", "42")));
        assert!(is_allowed(&[], &Caller::default()));
    }

    #[test]
    fn star_entry_opens_the_gate() {
        let allow = list(&["manager", "*"]);
        assert!(is_allowed(&allow, &Caller::new("", "7")));
    }

    #[test]
    fn username_with_or_without_at() {
        for entry in ["reception", "@reception"] {
            let allow = list(&[entry]);
            assert!(is_allowed(&allow, &Caller::new("reception", "42")));
            assert!(!is_allowed(&allow, &Caller::new("guest", "43")));
        }
    }

    #[test]
    fn numeric_id_matches_accounts_without_username() {
        let allow = list(&["42"]);
        assert!(is_allowed(&allow, &Caller::new("", "42")));
        assert!(!is_allowed(&allow, &Caller::new("", "43")));
    }

    #[test]
    fn blank_entries_never_match() {
        let allow = list(&["@", "   "]);
        assert!(!is_allowed(&allow, &Caller::default()));
    }

    #[test]
    fn usernames_are_case_sensitive() {
        let allow = list(&["Reception"]);
        assert!(!is_allowed(&allow, &Caller::new("reception", "42")));
    }
}
