use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub public_url: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = var("SKILLSWAP_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("SKILLSWAP_JWT_SECRET must be set to a random secret");
        }

        let host = var("SKILLSWAP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("SKILLSWAP_PORT")
            .unwrap_or_else(|| "4000".into())
            .parse()
            .context("SKILLSWAP_PORT is not a valid port")?;
        let public_url = var("SKILLSWAP_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://{}:{}", host, port))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            jwt_secret,
            db_path: var("SKILLSWAP_DB_PATH")
                .unwrap_or_else(|| "skillswap.db".into())
                .into(),
            media_dir: var("SKILLSWAP_MEDIA_DIR")
                .unwrap_or_else(|| "./media".into())
                .into(),
            host,
            port,
            public_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn defaults() {
        let config = Config::from_lookup(lookup(&[("SKILLSWAP_JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.db_path, PathBuf::from("skillswap.db"));
        assert_eq!(config.media_dir, PathBuf::from("./media"));
        assert_eq!(config.public_url, "http://0.0.0.0:4000");
    }

    #[test]
    fn public_url_loses_trailing_slash() {
        let config = Config::from_lookup(lookup(&[
            ("SKILLSWAP_JWT_SECRET", "s3cret"),
            ("SKILLSWAP_PUBLIC_URL", "https://skills.example.com/"),
        ]))
        .unwrap();
        assert_eq!(config.public_url, "https://skills.example.com");
    }

    #[test]
    fn rejects_missing_or_placeholder_secret() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("SKILLSWAP_JWT_SECRET", "dev-secret-change-me")])).is_err());
    }

    #[test]
    fn rejects_bad_port() {
        let result = Config::from_lookup(lookup(&[
            ("SKILLSWAP_JWT_SECRET", "s3cret"),
            ("SKILLSWAP_PORT", "http"),
        ]));
        assert!(result.is_err());
    }
}
