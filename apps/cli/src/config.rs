use std::env;
use std::time::Duration;

use inheritor_core::{
    ApiKeyCredentials, AppError, AppResult, SessionKey, VaultCredentials, VaultLogin,
};

#[cfg(windows)]
const DEFAULT_BW_EXECUTABLE: &str = "bw.exe";
#[cfg(not(windows))]
const DEFAULT_BW_EXECUTABLE: &str = "bw";

/// Which `bw` surface the vault client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VaultBackend {
    Cli,
    Rest,
}

impl VaultBackend {
    fn parse(value: &str) -> AppResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cli" => Ok(Self::Cli),
            "rest" => Ok(Self::Rest),
            other => Err(AppError::Validation(format!(
                "invalid INHERITOR_VAULT_BACKEND value '{other}': expected 'cli' or 'rest'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct InheritorConfig {
    pub(crate) backend: VaultBackend,
    pub(crate) bw_executable: String,
    pub(crate) organization_id: Option<String>,
    pub(crate) server_url: Option<String>,
    pub(crate) login: Option<VaultLogin>,
    pub(crate) session: Option<SessionKey>,
    pub(crate) serve_host: String,
    pub(crate) serve_port: u16,
    pub(crate) serve_spawn: bool,
    pub(crate) command_timeout: Duration,
    pub(crate) pacing_delay: Duration,
}

impl InheritorConfig {
    pub(crate) fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = EnvReader { lookup };

        let backend = vars
            .optional("INHERITOR_VAULT_BACKEND")
            .map_or(Ok(VaultBackend::Cli), |value| VaultBackend::parse(&value))?;
        let bw_executable = vars
            .optional("BW_EXECUTABLE")
            .unwrap_or_else(|| DEFAULT_BW_EXECUTABLE.to_owned());
        let organization_id = vars.optional("BW_ORGANIZATION_ID");
        let server_url = vars.optional("BW_SERVER_URL");
        let login = read_login(&vars)?;
        let session = vars.optional("BW_SESSION").map(SessionKey::new).transpose()?;
        let serve_host = vars
            .optional("BW_SERVE_HOST")
            .unwrap_or_else(|| "localhost".to_owned());
        let serve_port = vars.parse_u16("BW_SERVE_PORT", 8087)?;
        let serve_spawn = vars.parse_bool("BW_SERVE_SPAWN", true)?;
        let command_timeout_secs = vars.parse_u64("BW_COMMAND_TIMEOUT_SECS", 120)?;
        let pacing_ms = vars.parse_u64("INHERITOR_PACING_MS", 1000)?;

        if command_timeout_secs == 0 {
            return Err(AppError::Validation(
                "BW_COMMAND_TIMEOUT_SECS must be greater than zero".to_owned(),
            ));
        }

        if serve_port == 0 {
            return Err(AppError::Validation(
                "BW_SERVE_PORT must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            backend,
            bw_executable,
            organization_id,
            server_url,
            login,
            session,
            serve_host,
            serve_port,
            serve_spawn,
            command_timeout: Duration::from_secs(command_timeout_secs),
            pacing_delay: Duration::from_millis(pacing_ms),
        })
    }

    pub(crate) fn require_organization_id(&self) -> AppResult<&str> {
        self.organization_id.as_deref().ok_or_else(|| {
            AppError::Validation("BW_ORGANIZATION_ID is required".to_owned())
        })
    }

    pub(crate) fn serve_base_url(&self) -> String {
        format!("http://{}:{}/", self.serve_host, self.serve_port)
    }
}

// An API key takes precedence over the username; both need BW_PASSWORD to
// unlock.
fn read_login<F>(vars: &EnvReader<F>) -> AppResult<Option<VaultLogin>>
where
    F: Fn(&str) -> Option<String>,
{
    let username = vars.optional("BW_USERNAME");
    let password = vars.optional("BW_PASSWORD");
    let api_key = match (vars.optional("BW_CLIENTID"), vars.optional("BW_CLIENTSECRET")) {
        (Some(client_id), Some(client_secret)) => Some((client_id, client_secret)),
        (None, None) => None,
        _ => {
            return Err(AppError::Validation(
                "BW_CLIENTID and BW_CLIENTSECRET must be set together".to_owned(),
            ));
        }
    };

    match (api_key, username, password) {
        (Some((client_id, client_secret)), _, Some(password)) => Ok(Some(VaultLogin::ApiKey(
            ApiKeyCredentials::new(client_id, client_secret, password)?,
        ))),
        (Some(_), _, None) => Err(AppError::Validation(
            "BW_PASSWORD is required to unlock the vault after an API key login".to_owned(),
        )),
        (None, Some(username), Some(password)) => Ok(Some(VaultLogin::Password(
            VaultCredentials::new(username, password)?,
        ))),
        (None, None, None) => Ok(None),
        (None, _, _) => Err(AppError::Validation(
            "BW_USERNAME and BW_PASSWORD must be set together".to_owned(),
        )),
    }
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Blank values count as unset.
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
    }

    fn parse_u16(&self, name: &str, default: u16) -> AppResult<u16> {
        match self.optional(name) {
            Some(value) => value.parse::<u16>().map_err(|error| {
                AppError::Validation(format!("invalid {name} value '{value}': {error}"))
            }),
            None => Ok(default),
        }
    }

    fn parse_u64(&self, name: &str, default: u64) -> AppResult<u64> {
        match self.optional(name) {
            Some(value) => value.parse::<u64>().map_err(|error| {
                AppError::Validation(format!("invalid {name} value '{value}': {error}"))
            }),
            None => Ok(default),
        }
    }

    fn parse_bool(&self, name: &str, default: bool) -> AppResult<bool> {
        match self.optional(name).map(|value| value.to_ascii_lowercase()) {
            Some(value) => match value.as_str() {
                "1" | "true" | "yes" => Ok(true),
                "0" | "false" | "no" => Ok(false),
                _ => Err(AppError::Validation(format!(
                    "invalid {name} value '{value}': expected true or false"
                ))),
            },
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use inheritor_core::{AppError, VaultLogin};

    use super::{DEFAULT_BW_EXECUTABLE, InheritorConfig, VaultBackend};

    fn load(pairs: &[(&str, &str)]) -> Result<InheritorConfig, AppError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        InheritorConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = load(&[]);
        assert!(config.is_ok());
        let config = config.unwrap_or_else(|_| unreachable!());

        assert_eq!(config.backend, VaultBackend::Cli);
        assert_eq!(config.bw_executable, DEFAULT_BW_EXECUTABLE);
        assert!(config.organization_id.is_none());
        assert!(config.login.is_none());
        assert!(config.session.is_none());
        assert_eq!(config.serve_base_url(), "http://localhost:8087/");
        assert!(config.serve_spawn);
        assert_eq!(config.command_timeout, Duration::from_secs(120));
        assert_eq!(config.pacing_delay, Duration::from_secs(1));
        assert!(matches!(
            config.require_organization_id(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn reads_rest_backend_settings() {
        let config = load(&[
            ("INHERITOR_VAULT_BACKEND", "REST"),
            ("BW_ORGANIZATION_ID", " org-1 "),
            ("BW_SERVE_HOST", "127.0.0.1"),
            ("BW_SERVE_PORT", "9000"),
            ("BW_SERVE_SPAWN", "false"),
            ("BW_SESSION", "abc123\n"),
            ("INHERITOR_PACING_MS", "0"),
        ]);
        assert!(config.is_ok());
        let config = config.unwrap_or_else(|_| unreachable!());

        assert_eq!(config.backend, VaultBackend::Rest);
        assert_eq!(config.require_organization_id().ok(), Some("org-1"));
        assert_eq!(config.serve_base_url(), "http://127.0.0.1:9000/");
        assert!(!config.serve_spawn);
        assert_eq!(
            config.session.as_ref().map(|session| session.expose()),
            Some("abc123")
        );
        assert_eq!(config.pacing_delay, Duration::ZERO);
    }

    #[test]
    fn credentials_need_both_halves() {
        assert!(matches!(
            load(&[("BW_USERNAME", "ops@example.com")]),
            Err(AppError::Validation(_))
        ));

        let config = load(&[("BW_USERNAME", "ops@example.com"), ("BW_PASSWORD", "pw")]);
        assert!(config.is_ok());
        let config = config.unwrap_or_else(|_| unreachable!());
        assert!(matches!(
            &config.login,
            Some(VaultLogin::Password(credentials)) if credentials.username() == "ops@example.com"
        ));
    }

    #[test]
    fn api_key_login_needs_both_halves_and_a_password() {
        assert!(matches!(
            load(&[("BW_CLIENTID", "user.1234"), ("BW_PASSWORD", "pw")]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            load(&[("BW_CLIENTID", "user.1234"), ("BW_CLIENTSECRET", "s3cret")]),
            Err(AppError::Validation(_))
        ));

        let config = load(&[
            ("BW_CLIENTID", "user.1234"),
            ("BW_CLIENTSECRET", "s3cret"),
            ("BW_USERNAME", "ops@example.com"),
            ("BW_PASSWORD", "pw"),
        ]);
        assert!(config.is_ok());
        let config = config.unwrap_or_else(|_| unreachable!());
        assert!(matches!(
            &config.login,
            Some(VaultLogin::ApiKey(api_key))
                if api_key.client_id() == "user.1234" && api_key.master_password() == "pw"
        ));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            load(&[("BW_COMMAND_TIMEOUT_SECS", "0")]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            load(&[("BW_COMMAND_TIMEOUT_SECS", "soon")]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            load(&[("INHERITOR_PACING_MS", "-5")]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            load(&[("BW_SERVE_SPAWN", "maybe")]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            load(&[("INHERITOR_VAULT_BACKEND", "grpc")]),
            Err(AppError::Validation(_))
        ));
    }
}
