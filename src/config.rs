use std::{env, time::Duration};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub payment_delay_min: Duration,
    pub payment_delay_max: Duration,
    pub demo_mode: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup so parsing can be exercised
    /// without mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;
        let jwt_secret =
            lookup("JWT_SECRET").ok_or_else(|| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let host = lookup("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_or(&lookup, "APP_PORT", 3000u16);
        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 10u32);

        let delay_min = parse_or(&lookup, "PAYMENT_DELAY_MIN_MS", 1000u64);
        let delay_max = parse_or(&lookup, "PAYMENT_DELAY_MAX_MS", 3000u64).max(delay_min);

        let demo_mode = lookup("DEMO_MODE")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            database_url,
            host,
            port,
            db_max_connections,
            jwt_secret,
            payment_delay_min: Duration::from_millis(delay_min),
            payment_delay_max: Duration::from_millis(delay_max),
            demo_mode,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|raw| raw.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_optional_vars_missing() {
        let config = config_from(&[("DATABASE_URL", "postgres://db"), ("JWT_SECRET", "s")])
            .expect("config");
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.payment_delay_min, Duration::from_millis(1000));
        assert_eq!(config.payment_delay_max, Duration::from_millis(3000));
        assert!(!config.demo_mode);
    }

    #[test]
    fn database_url_and_secret_are_required() {
        assert!(config_from(&[("JWT_SECRET", "s")]).is_err());
        assert!(config_from(&[("DATABASE_URL", "postgres://db")]).is_err());
    }

    #[test]
    fn zero_delay_and_demo_mode() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://db"),
            ("JWT_SECRET", "s"),
            ("PAYMENT_DELAY_MIN_MS", "0"),
            ("PAYMENT_DELAY_MAX_MS", "0"),
            ("DEMO_MODE", "TRUE"),
            ("APP_PORT", "not-a-port"),
        ])
        .expect("config");
        assert_eq!(config.payment_delay_max, Duration::ZERO);
        assert!(config.demo_mode);
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn max_delay_never_below_min() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://db"),
            ("JWT_SECRET", "s"),
            ("PAYMENT_DELAY_MIN_MS", "500"),
            ("PAYMENT_DELAY_MAX_MS", "100"),
        ])
        .expect("config");
        assert_eq!(config.payment_delay_max, Duration::from_millis(500));
    }
}
