//! Typed projections of provider identity payloads.
//!
//! Each projection walks one known response shape and returns either the
//! extracted value or a [`MissingField`] naming the first step that was
//! absent. Empty strings count as absent.

use serde_json::Value;

/// A field expected by a projection was not present in the payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("field absent: {path}")]
pub struct MissingField {
    /// Dotted path of the missing field
    pub path: &'static str,
}

impl MissingField {
    fn at(path: &'static str) -> Self {
        Self { path }
    }
}

/// Who the provider says the user is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectProfile {
    /// Provider subject identifier
    pub subject: String,
    /// Human-readable name, if the provider shared one
    pub display_name: Option<String>,
    /// Email address, if the provider shared one
    pub email: Option<String>,
}

/// A non-empty string field of `payload`. Other types count as absent.
fn string_field(payload: &Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

/// Project a userinfo payload onto a [`SubjectProfile`].
///
/// `name` is preferred for the display name, then `nickname`, then
/// `given_name`. Fields are read independently, so a mistyped display
/// field never hides a usable `sub`.
pub fn userinfo_profile(payload: &Value) -> Result<SubjectProfile, MissingField> {
    let subject = string_field(payload, "sub").ok_or(MissingField::at("sub"))?;
    let display_name = ["name", "nickname", "given_name"]
        .into_iter()
        .find_map(|key| string_field(payload, key));

    Ok(SubjectProfile {
        subject,
        display_name,
        email: string_field(payload, "email"),
    })
}

/// Project the application-scoped "current user" payload onto its guid.
///
/// Expected shape:
///
/// ```text
/// { "fantasy_content": { "users": { "0": { "user": [ { "guid": "..." }, ... ] } } } }
/// ```
///
/// The `user` array mixes objects of different kinds; the first entry
/// carrying a non-empty `guid` wins.
pub fn app_user_guid(payload: &Value) -> Result<String, MissingField> {
    let content = payload
        .get("fantasy_content")
        .ok_or(MissingField::at("fantasy_content"))?;
    let users = content
        .get("users")
        .ok_or(MissingField::at("fantasy_content.users"))?;
    let first = users
        .get("0")
        .ok_or(MissingField::at("fantasy_content.users.0"))?;
    let entries = first
        .get("user")
        .and_then(Value::as_array)
        .ok_or(MissingField::at("fantasy_content.users.0.user"))?;

    entries
        .iter()
        .filter_map(|entry| entry.get("guid").and_then(Value::as_str))
        .find(|guid| !guid.trim().is_empty())
        .map(str::to_string)
        .ok_or(MissingField::at("fantasy_content.users.0.user[].guid"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_userinfo_full() {
        let payload = json!({
            "sub": "ABCDEF",
            "name": "Alice Example",
            "email": "alice@example.com",
            "email_verified": true
        });
        let profile = userinfo_profile(&payload).unwrap();
        assert_eq!(profile.subject, "ABCDEF");
        assert_eq!(profile.display_name.as_deref(), Some("Alice Example"));
        assert_eq!(profile.email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn test_userinfo_nickname_fallback() {
        let payload = json!({ "sub": "X", "name": "", "nickname": "ally" });
        let profile = userinfo_profile(&payload).unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("ally"));
        assert!(profile.email.is_none());
    }

    #[test]
    fn test_userinfo_missing_sub() {
        let payload = json!({ "name": "Alice" });
        assert_eq!(userinfo_profile(&payload).unwrap_err().path, "sub");
    }

    #[test]
    fn test_userinfo_mistyped_field_keeps_the_rest() {
        let payload = json!({ "sub": "ABC", "name": "Alice", "nickname": 7, "email": false });
        let profile = userinfo_profile(&payload).unwrap();
        assert_eq!(profile.subject, "ABC");
        assert_eq!(profile.display_name.as_deref(), Some("Alice"));
        assert!(profile.email.is_none());

        let payload = json!({ "sub": "ABC", "name": ["A"], "nickname": "ally" });
        assert_eq!(
            userinfo_profile(&payload).unwrap().display_name.as_deref(),
            Some("ally")
        );

        let payload = json!({ "sub": 42, "name": "Alice" });
        assert_eq!(userinfo_profile(&payload).unwrap_err().path, "sub");
    }

    #[test]
    fn test_userinfo_wrong_shape() {
        let payload = json!(["not", "an", "object"]);
        assert_eq!(userinfo_profile(&payload).unwrap_err().path, "sub");
    }

    #[test]
    fn test_app_user_guid() {
        let payload = json!({
            "fantasy_content": {
                "users": {
                    "0": { "user": [ { "guid": "GUID123" }, { "games": {} } ] },
                    "count": 1
                }
            }
        });
        assert_eq!(app_user_guid(&payload).unwrap(), "GUID123");
    }

    #[test]
    fn test_app_user_guid_reports_missing_step() {
        let payload = json!({ "fantasy_content": { "users": { "count": 0 } } });
        assert_eq!(
            app_user_guid(&payload).unwrap_err().path,
            "fantasy_content.users.0"
        );

        let payload = json!({ "fantasy_content": { "users": { "0": { "user": [ {} ] } } } });
        assert_eq!(
            app_user_guid(&payload).unwrap_err().path,
            "fantasy_content.users.0.user[].guid"
        );
    }
}
