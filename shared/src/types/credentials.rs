use std::fmt;

use serde::Deserialize;

// ---------------------------------------------------------------------------
// Credential wire type (registration and both login variants)
// ---------------------------------------------------------------------------

/// Username + password as submitted by a client.
///
/// The password may arrive under three keys: `contraseña`, `contrasena` or
/// `password`. They are synonyms; the first non-empty one wins in that order.
#[derive(Default, Deserialize)]
pub struct CredentialsPayload {
    #[serde(rename = "usuario", alias = "username", default)]
    username: Option<String>,
    #[serde(rename = "contraseña", default)]
    password_accented: Option<String>,
    #[serde(rename = "contrasena", default)]
    password_plain: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

impl CredentialsPayload {
    #[cfg(test)]
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            ..Self::default()
        }
    }

    /// Parse a JSON body. Anything that is not a JSON object with string
    /// fields is treated as an empty submission rather than an error.
    pub fn from_json(body: &[u8]) -> Self {
        serde_json::from_slice(body).unwrap_or_default()
    }

    /// Parse an `application/x-www-form-urlencoded` body. Repeated keys keep
    /// their first value.
    pub fn from_form(body: &[u8]) -> Self {
        let mut payload = Self::default();

        for (key, value) in form_urlencoded::parse(body) {
            let slot = match key.as_ref() {
                "usuario" | "username" => &mut payload.username,
                "contraseña" => &mut payload.password_accented,
                "contrasena" => &mut payload.password_plain,
                "password" => &mut payload.password,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        payload
    }

    /// The submitted username, untrimmed. Empty when absent.
    pub fn username(&self) -> &str {
        self.username.as_deref().unwrap_or("")
    }

    /// The submitted password, resolved across its aliases. Empty when absent.
    pub fn password(&self) -> &str {
        [
            &self.password_accented,
            &self.password_plain,
            &self.password,
        ]
        .into_iter()
        .filter_map(|p| p.as_deref())
        .find(|p| !p.is_empty())
        .unwrap_or("")
    }
}

impl fmt::Debug for CredentialsPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsPayload")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accented_key_wins_over_other_aliases() {
        let p = CredentialsPayload::from_json(
            r#"{"usuario":"alice","password":"c","contrasena":"b","contraseña":"a"}"#.as_bytes(),
        );
        assert_eq!(p.password(), "a");
    }

    #[test]
    fn empty_alias_falls_through_to_next() {
        let p = CredentialsPayload::from_json(
            r#"{"usuario":"alice","contraseña":"","password":"fallback"}"#.as_bytes(),
        );
        assert_eq!(p.password(), "fallback");
    }

    #[test]
    fn form_repeated_key_keeps_first_value() {
        let p = CredentialsPayload::from_form(b"usuario=alice&usuario=mallory&password=x");
        assert_eq!(p.username(), "alice");
    }

    #[test]
    fn debug_output_hides_password() {
        let p = CredentialsPayload::new("alice", "hunter2");
        let out = format!("{:?}", p);
        assert!(out.contains("alice"));
        assert!(!out.contains("hunter2"));
    }
}
