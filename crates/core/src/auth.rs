use std::fmt::{Debug, Formatter};

use crate::{AppResult, NonEmptyString};

/// Username and master password used to log in to or unlock the vault.
#[derive(Clone, PartialEq, Eq)]
pub struct VaultCredentials {
    username: NonEmptyString,
    password: NonEmptyString,
}

impl VaultCredentials {
    /// Creates validated credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> AppResult<Self> {
        Ok(Self {
            username: NonEmptyString::new(username)?,
            password: NonEmptyString::new(password)?,
        })
    }

    /// Returns the account name.
    #[must_use]
    pub fn username(&self) -> &str {
        self.username.as_str()
    }

    /// Returns the master password.
    #[must_use]
    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl Debug for VaultCredentials {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("VaultCredentials")
            .field("username", &self.username.as_str())
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Personal API key used for `bw login --apikey`, plus the master password
/// that unlocks the vault afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKeyCredentials {
    client_id: NonEmptyString,
    client_secret: NonEmptyString,
    master_password: NonEmptyString,
}

impl ApiKeyCredentials {
    /// Creates validated API key credentials.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        master_password: impl Into<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            client_id: NonEmptyString::new(client_id)?,
            client_secret: NonEmptyString::new(client_secret)?,
            master_password: NonEmptyString::new(master_password)?,
        })
    }

    /// Returns the API client id, e.g. `user.xxxx`.
    #[must_use]
    pub fn client_id(&self) -> &str {
        self.client_id.as_str()
    }

    /// Returns the API client secret.
    #[must_use]
    pub fn client_secret(&self) -> &str {
        self.client_secret.as_str()
    }

    /// Returns the master password.
    #[must_use]
    pub fn master_password(&self) -> &str {
        self.master_password.as_str()
    }
}

impl Debug for ApiKeyCredentials {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ApiKeyCredentials")
            .field("client_id", &self.client_id.as_str())
            .field("client_secret", &"<redacted>")
            .field("master_password", &"<redacted>")
            .finish()
    }
}

/// How to obtain a session when the vault is not unlocked yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultLogin {
    /// Username and master password.
    Password(VaultCredentials),
    /// API key login followed by an unlock with the master password.
    ApiKey(ApiKeyCredentials),
}

impl VaultLogin {
    /// Returns the master password used to unlock the vault.
    #[must_use]
    pub fn master_password(&self) -> &str {
        match self {
            Self::Password(credentials) => credentials.password(),
            Self::ApiKey(api_key) => api_key.master_password(),
        }
    }
}

/// Session key returned by a successful login or unlock.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey(NonEmptyString);

impl SessionKey {
    /// Creates a session key from raw CLI output, trimming surrounding whitespace.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value: String = value.into();
        Ok(Self(NonEmptyString::new(value.trim())?))
    }

    /// Returns the raw session key.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl Debug for SessionKey {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("SessionKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiKeyCredentials, SessionKey, VaultCredentials, VaultLogin};

    #[test]
    fn credentials_debug_hides_password() {
        let credentials = VaultCredentials::new("admin@example.org", "hunter2");
        assert!(credentials.is_ok());
        let rendered = format!("{:?}", credentials.unwrap_or_else(|_| unreachable!()));
        assert!(rendered.contains("admin@example.org"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn api_key_debug_hides_secrets() {
        let api_key = ApiKeyCredentials::new("user.1234", "s3cret", "hunter2");
        assert!(api_key.is_ok());
        let login = VaultLogin::ApiKey(api_key.unwrap_or_else(|_| unreachable!()));

        let rendered = format!("{login:?}");
        assert!(rendered.contains("user.1234"));
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("hunter2"));
        assert_eq!(login.master_password(), "hunter2");
    }

    #[test]
    fn api_key_rejects_blank_parts() {
        assert!(ApiKeyCredentials::new("user.1234", " ", "hunter2").is_err());
    }

    #[test]
    fn session_key_is_trimmed_and_redacted() {
        let session = SessionKey::new("  abc123==\n").unwrap_or_else(|_| unreachable!());
        assert_eq!(session.expose(), "abc123==");
        assert_eq!(format!("{session:?}"), "SessionKey(<redacted>)");
    }

    #[test]
    fn session_key_rejects_blank_output() {
        assert!(SessionKey::new("\n").is_err());
    }
}
