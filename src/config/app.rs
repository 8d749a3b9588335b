use anyhow::{bail, Result};
use std::env;
use std::str::FromStr;

const DEV_JWT_SECRET: &str = "vitafit-dev-secret-change-in-production";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub log_level: String,
    pub app_url: String,
    pub run_migrations: bool,
    pub seed_database: bool,
    /// Reverse proxies whose `X-Forwarded-For` entries are trusted
    pub trusted_proxy_hops: usize,
    pub auth: AuthConfig,
    pub mail: MailConfig,
}

/// Token lifetimes, hashing cost and login protection settings
#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub bcrypt_cost: u32,
    pub lockout_max_attempts: u32,
    pub lockout_duration_secs: i64,
    pub verification_code_ttl_secs: i64,
    pub reset_code_ttl_secs: i64,
    pub send_login_alerts: bool,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_refresh_secret", &"[REDACTED]")
            .field("access_token_ttl_minutes", &self.access_token_ttl_minutes)
            .field("refresh_token_ttl_days", &self.refresh_token_ttl_days)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("lockout_max_attempts", &self.lockout_max_attempts)
            .field("lockout_duration_secs", &self.lockout_duration_secs)
            .field("verification_code_ttl_secs", &self.verification_code_ttl_secs)
            .field("reset_code_ttl_secs", &self.reset_code_ttl_secs)
            .field("send_login_alerts", &self.send_login_alerts)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_refresh_secret: DEV_JWT_SECRET.to_string(),
            access_token_ttl_minutes: 60,
            refresh_token_ttl_days: 90,
            bcrypt_cost: 12,
            lockout_max_attempts: 5,
            lockout_duration_secs: 900,
            verification_code_ttl_secs: 24 * 60 * 60,
            reset_code_ttl_secs: 60 * 60,
            send_login_alerts: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTransportKind {
    Smtp,
    Log,
}

#[derive(Clone)]
pub struct MailConfig {
    pub transport: MailTransportKind,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_tls: bool,
    pub from_address: String,
}

impl std::fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailConfig")
            .field("transport", &self.transport)
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &self.smtp_password.as_ref().map(|_| "[REDACTED]"))
            .field("smtp_tls", &self.smtp_tls)
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            transport: MailTransportKind::Log,
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: None,
            smtp_password: None,
            smtp_tls: true,
            from_address: "VitaFit <noreply@vitafit.online>".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env_or("PORT", 3000);
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let app_url = env::var("APP_URL").unwrap_or_else(|_| "https://vitafit.online".to_string());

        let defaults = AuthConfig::default();
        let jwt_secret = env::var("JWT_SECRET").unwrap_or(defaults.jwt_secret);
        // Falls back to the access secret, as older deployments only set one.
        let jwt_refresh_secret =
            env::var("JWT_REFRESH_SECRET").unwrap_or_else(|_| jwt_secret.clone());

        let auth = AuthConfig {
            jwt_secret,
            jwt_refresh_secret,
            access_token_ttl_minutes: env_or("JWT_ACCESS_TTL_MINUTES", defaults.access_token_ttl_minutes),
            refresh_token_ttl_days: env_or("JWT_REFRESH_TTL_DAYS", defaults.refresh_token_ttl_days),
            bcrypt_cost: env_or("BCRYPT_COST", defaults.bcrypt_cost),
            lockout_max_attempts: env_or("LOCKOUT_MAX_ATTEMPTS", defaults.lockout_max_attempts),
            lockout_duration_secs: env_or("LOCKOUT_DURATION_SECS", defaults.lockout_duration_secs),
            verification_code_ttl_secs: env_or("VERIFICATION_CODE_TTL_SECS", defaults.verification_code_ttl_secs),
            reset_code_ttl_secs: env_or("RESET_CODE_TTL_SECS", defaults.reset_code_ttl_secs),
            send_login_alerts: env_or("SEND_LOGIN_ALERTS", false),
        };

        let mail_defaults = MailConfig::default();
        let transport = match env::var("MAIL_TRANSPORT").as_deref() {
            Ok("smtp") => MailTransportKind::Smtp,
            _ => MailTransportKind::Log,
        };
        let mail = MailConfig {
            transport,
            smtp_host: env::var("SMTP_HOST").unwrap_or(mail_defaults.smtp_host),
            smtp_port: env_or("SMTP_PORT", mail_defaults.smtp_port),
            smtp_username: env::var("SMTP_USERNAME").ok(),
            smtp_password: env::var("SMTP_PASSWORD").ok(),
            smtp_tls: env_or("SMTP_TLS", mail_defaults.smtp_tls),
            from_address: env::var("MAIL_FROM").unwrap_or(mail_defaults.from_address),
        };

        let config = AppConfig {
            host,
            port,
            environment,
            log_level,
            app_url,
            run_migrations: env_or("RUN_MIGRATIONS", true),
            seed_database: env_or("SEED_DATABASE", false),
            trusted_proxy_hops: env_or("TRUSTED_PROXY_HOPS", 1),
            auth,
            mail,
        };
        config.validate()?;

        Ok(config)
    }

    /// Reject settings that are only acceptable on a developer machine
    pub fn validate(&self) -> Result<()> {
        if self.is_production() {
            if self.auth.jwt_secret == DEV_JWT_SECRET {
                bail!("JWT_SECRET must be set in production");
            }
            if self.auth.jwt_secret.len() < 32 {
                bail!("JWT_SECRET must be at least 32 characters in production");
            }
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            bail!("BCRYPT_COST must be between 4 and 31");
        }
        if self.auth.lockout_max_attempts == 0 {
            bail!("LOCKOUT_MAX_ATTEMPTS must be positive");
        }
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Configuration used by tests and local tooling
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            log_level: "debug".to_string(),
            app_url: "http://localhost:3000".to_string(),
            run_migrations: false,
            seed_database: false,
            trusted_proxy_hops: 1,
            auth: AuthConfig {
                jwt_secret: "test_access_secret_for_testing_only".to_string(),
                jwt_refresh_secret: "test_refresh_secret_for_testing_only".to_string(),
                bcrypt_cost: 4,
                ..AuthConfig::default()
            },
            mail: MailConfig::default(),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
