use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Runs every 30 seconds (cron with a seconds field).
pub const DEFAULT_RECONCILE_SCHEDULE: &str = "*/30 * * * * *";

/// Port used when `SMTP_PORT` is unset (submission with STARTTLS).
pub const DEFAULT_SMTP_PORT: u16 = 587;

/// Outgoing mail settings. Present only when `SMTP_HOST` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender mailbox, e.g. `Event Booker <noreply@example.com>`
    pub from: String,
}

impl SmtpConfig {
    /// Build from a variable lookup; `Ok(None)` when no host is configured.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>> {
        let Some(host) = lookup("SMTP_HOST").filter(|host| !host.trim().is_empty()) else {
            return Ok(None);
        };

        let port = match lookup("SMTP_PORT") {
            Some(port) => port
                .trim()
                .parse()
                .context("SMTP_PORT must be a valid port number")?,
            None => DEFAULT_SMTP_PORT,
        };

        Ok(Some(Self {
            host: host.trim().to_string(),
            port,
            username: lookup("SMTP_USERNAME").unwrap_or_default(),
            password: lookup("SMTP_PASSWORD").unwrap_or_default(),
            from: lookup("SMTP_FROM").context("SMTP_FROM must be set when SMTP_HOST is")?,
        }))
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    /// Lifetime of tokens issued at login.
    pub jwt_ttl: chrono::Duration,
    pub reconcile_schedule: String,
    /// Upper bound for a single inventory operation. `None` leaves it to the pool.
    pub store_timeout: Option<Duration>,
    pub allowed_origins: Vec<String>,
    /// Expiry notices go to the log when this is `None`.
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a valid number")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "event-booker".to_string()),
            jwt_ttl: chrono::Duration::hours(
                env::var("JWT_TTL_HOURS")
                    .unwrap_or_else(|_| "24".to_string())
                    .parse::<i64>()
                    .ok()
                    .filter(|hours| (1..=24 * 365).contains(hours))
                    .context("JWT_TTL_HOURS must be between 1 and 8760")?,
            ),
            reconcile_schedule: env::var("RECONCILE_SCHEDULE")
                .unwrap_or_else(|_| DEFAULT_RECONCILE_SCHEDULE.to_string()),
            store_timeout: parse_timeout(env::var("STORE_TIMEOUT_SECS").ok().as_deref())?,
            allowed_origins: parse_origins(env::var("ALLOWED_ORIGINS").ok().as_deref()),
            smtp: SmtpConfig::from_lookup(|key| env::var(key).ok())?,
        })
    }
}

fn parse_timeout(raw: Option<&str>) -> Result<Option<Duration>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(secs) => {
            let secs: u64 = secs
                .parse()
                .context("STORE_TIMEOUT_SECS must be a whole number of seconds")?;
            Ok((secs > 0).then(|| Duration::from_secs(secs)))
        }
    }
}

fn parse_origins(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_absent_or_zero_is_none() {
        assert_eq!(parse_timeout(None).unwrap(), None);
        assert_eq!(parse_timeout(Some("  ")).unwrap(), None);
        assert_eq!(parse_timeout(Some("0")).unwrap(), None);
    }

    #[test]
    fn test_timeout_parses_seconds() {
        assert_eq!(
            parse_timeout(Some("5")).unwrap(),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_timeout_rejects_garbage() {
        assert!(parse_timeout(Some("five")).is_err());
    }

    #[test]
    fn test_origins_are_split_and_trimmed() {
        let origins = parse_origins(Some("http://localhost:3000, http://localhost:5173,,"));
        assert_eq!(
            origins,
            vec!["http://localhost:3000", "http://localhost:5173"]
        );
        assert!(parse_origins(None).is_empty());
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: std::collections::HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_smtp_absent_without_host() {
        assert_eq!(SmtpConfig::from_lookup(lookup(&[])).unwrap(), None);
        assert_eq!(
            SmtpConfig::from_lookup(lookup(&[("SMTP_HOST", " ")])).unwrap(),
            None
        );
    }

    #[test]
    fn test_smtp_reads_all_fields() {
        let smtp = SmtpConfig::from_lookup(lookup(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_PORT", "2525"),
            ("SMTP_USERNAME", "mailer"),
            ("SMTP_PASSWORD", "hunter2"),
            ("SMTP_FROM", "Event Booker <noreply@example.com>"),
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(smtp.host, "smtp.example.com");
        assert_eq!(smtp.port, 2525);
        assert_eq!(smtp.username, "mailer");
        assert_eq!(smtp.from, "Event Booker <noreply@example.com>");
    }

    #[test]
    fn test_smtp_defaults_port_and_requires_sender() {
        let smtp = SmtpConfig::from_lookup(lookup(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_FROM", "noreply@example.com"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(smtp.port, DEFAULT_SMTP_PORT);

        assert!(SmtpConfig::from_lookup(lookup(&[("SMTP_HOST", "smtp.example.com")])).is_err());
        assert!(SmtpConfig::from_lookup(lookup(&[
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_FROM", "noreply@example.com"),
            ("SMTP_PORT", "mail"),
        ]))
        .is_err());
    }
}
