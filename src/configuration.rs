use thiserror::Error;

/// Minimum byte length accepted for either HMAC secret
const MIN_SECRET_LENGTH: usize = 32;
/// Upper bounds on token lifetimes
const MAX_ACCESS_TOKEN_MINUTES: i64 = 24 * 60;
const MAX_REFRESH_TOKEN_DAYS: i64 = 365;

/// bcrypt work factor bounds
pub const MIN_HASH_COST: u32 = 4;
pub const MAX_HASH_COST: u32 = 31;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub auth: AuthSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// Token signing settings.
///
/// Access and refresh tokens are signed with different secrets so that a
/// leaked key for one class cannot mint tokens of the other.
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub issuer: String,
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
}

// Secrets stay out of Debug output so settings can be logged at startup.
impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("issuer", &self.issuer)
            .field("access_secret", &"[redacted]")
            .field("refresh_secret", &"[redacted]")
            .field("access_token_minutes", &self.access_token_minutes)
            .field("refresh_token_days", &self.refresh_token_days)
            .finish()
    }
}

/// Behaviour knobs for the authentication flows
#[derive(serde::Deserialize, Clone, Debug)]
#[serde(default)]
pub struct AuthSettings {
    pub password_hash_cost: u32,
    pub store_timeout_ms: u64,
    pub rotate_refresh_tokens: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            password_hash_cost: bcrypt::DEFAULT_COST,
            store_timeout_ms: 5_000,
            rotate_refresh_tokens: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl JwtSettings {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigurationError::Invalid("jwt.issuer is empty".into()));
        }
        for (name, secret) in [
            ("jwt.access_secret", &self.access_secret),
            ("jwt.refresh_secret", &self.refresh_secret),
        ] {
            if secret.len() < MIN_SECRET_LENGTH {
                return Err(ConfigurationError::Invalid(format!(
                    "{} must be at least {} bytes",
                    name, MIN_SECRET_LENGTH
                )));
            }
        }
        if self.access_secret == self.refresh_secret {
            return Err(ConfigurationError::Invalid(
                "jwt.access_secret and jwt.refresh_secret must differ".into(),
            ));
        }
        if !(1..=MAX_ACCESS_TOKEN_MINUTES).contains(&self.access_token_minutes) {
            return Err(ConfigurationError::Invalid(format!(
                "jwt.access_token_minutes must be within 1..={}",
                MAX_ACCESS_TOKEN_MINUTES
            )));
        }
        if !(1..=MAX_REFRESH_TOKEN_DAYS).contains(&self.refresh_token_days) {
            return Err(ConfigurationError::Invalid(format!(
                "jwt.refresh_token_days must be within 1..={}",
                MAX_REFRESH_TOKEN_DAYS
            )));
        }
        Ok(())
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.jwt.validate()?;
        if self.auth.store_timeout_ms == 0 {
            return Err(ConfigurationError::Invalid(
                "auth.store_timeout_ms must be positive".into(),
            ));
        }
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&self.auth.password_hash_cost) {
            return Err(ConfigurationError::Invalid(format!(
                "auth.password_hash_cost must be within {}..={}",
                MIN_HASH_COST, MAX_HASH_COST
            )));
        }
        Ok(())
    }
}

/// Load settings from `configuration.yaml` (optional) overlaid with
/// `APP__SECTION__KEY` environment variables, then validate them.
pub fn get_configuration() -> Result<Settings, ConfigurationError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}
