// src/config/mod.rs
//! Process configuration: `.env` + environment variables, with search facets
//! optionally coming from a TOML/JSON file (see `search`).

pub mod search;

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::model::SearchFacets;
use crate::notify::email::EmailConfig;
use crate::source::adzuna::{AdzunaConfig, DEFAULT_BASE_URL};
use crate::store::StoreConfig;
use search::{validate_facets, SearchFile};

const REQUIRED: [&str; 5] = [
    "EMAIL_SENDER",
    "EMAIL_PASSWORD",
    "EMAIL_RECIPIENT",
    "ADZUNA_APP_ID",
    "ADZUNA_API_KEY",
];

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub facets: SearchFacets,
    pub store: StoreConfig,
    pub email: EmailConfig,
    pub adzuna: AdzunaConfig,
}

impl AppConfig {
    /// Load `.env` (if present), an optional search file, then the environment.
    pub fn from_env() -> Result<Self> {
        // no-op when .env is absent (CI / cron provide real env vars)
        let _ = dotenvy::dotenv();
        let file = search::load_search_default()?;
        Self::from_lookup(|k| std::env::var(k).ok(), file)
    }

    /// Build and validate from any key lookup. Reports every missing credential at once.
    pub fn from_lookup<F>(lookup: F, file: Option<SearchFile>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let or = |k: &str, default: &str| get(k).unwrap_or_else(|| default.to_string());

        let missing: Vec<&str> = REQUIRED.iter().copied().filter(|k| get(*k).is_none()).collect();
        if !missing.is_empty() {
            bail!(
                "missing required environment variables: {} (set them or create a .env file)",
                missing.join(", ")
            );
        }
        let required = |k: &str| get(k).unwrap_or_default();

        let file = file.unwrap_or_default();
        let keywords = file
            .keywords
            .unwrap_or_else(|| or("SEARCH_KEYWORDS", "software engineer intern"));
        let locations = file.locations.unwrap_or_else(|| {
            or("SEARCH_LOCATIONS", "United States")
                .split(',')
                .map(str::to_string)
                .collect()
        });
        let max_days_old = match file.max_days_old {
            Some(v) => v,
            None => parse_num(&or("MAX_DAYS_OLD", "7"), "MAX_DAYS_OLD")?,
        };
        let facets = validate_facets(&keywords, locations, max_days_old)?;

        let store = match or("DB_TYPE", "sqlite").to_ascii_lowercase().as_str() {
            "sqlite" => StoreConfig::Sqlite {
                path: PathBuf::from(or("DB_PATH", "jobs.db")),
            },
            "dynamodb" => StoreConfig::DynamoDb {
                table: or("DYNAMODB_TABLE", "job-tracker"),
                region: or("AWS_REGION", "us-east-1"),
            },
            other => bail!("unknown DB_TYPE `{other}` (expected sqlite or dynamodb)"),
        };

        let email = EmailConfig {
            smtp_host: or("SMTP_HOST", "smtp.gmail.com"),
            sender: required("EMAIL_SENDER"),
            password: required("EMAIL_PASSWORD"),
            recipient: required("EMAIL_RECIPIENT"),
            timeout: secs(&or("SMTP_TIMEOUT_SECS", "20"), "SMTP_TIMEOUT_SECS")?,
        };

        let adzuna = AdzunaConfig {
            app_id: required("ADZUNA_APP_ID"),
            api_key: required("ADZUNA_API_KEY"),
            country: or("ADZUNA_COUNTRY", "us").to_ascii_lowercase(),
            base_url: or("ADZUNA_BASE_URL", DEFAULT_BASE_URL),
            timeout: secs(&or("HTTP_TIMEOUT_SECS", "10"), "HTTP_TIMEOUT_SECS")?,
        };

        Ok(Self {
            facets,
            store,
            email,
            adzuna,
        })
    }
}

fn parse_num(v: &str, key: &str) -> Result<u32> {
    v.parse()
        .with_context(|| format!("{key} must be a non-negative integer, got `{v}`"))
}

/// Timeouts are mandatory and bounded: 1..=300 seconds.
fn secs(v: &str, key: &str) -> Result<Duration> {
    let n = parse_num(v, key)?;
    if !(1..=300).contains(&n) {
        bail!("{key} must be between 1 and 300 seconds, got {n}");
    }
    Ok(Duration::from_secs(u64::from(n)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        let mut m: HashMap<String, String> = [
            ("EMAIL_SENDER", "tracker@example.test"),
            ("EMAIL_PASSWORD", "pw"),
            ("EMAIL_RECIPIENT", "me@example.test"),
            ("ADZUNA_APP_ID", "app"),
            ("ADZUNA_API_KEY", "key"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in pairs {
            m.insert(k.to_string(), v.to_string());
        }
        m
    }

    fn load(m: &HashMap<String, String>, file: Option<SearchFile>) -> Result<AppConfig> {
        AppConfig::from_lookup(|k| m.get(k).cloned(), file)
    }

    #[test]
    fn defaults_apply() {
        let cfg = load(&env(&[]), None).unwrap();
        assert_eq!(cfg.facets.keywords, "software engineer intern");
        assert_eq!(cfg.facets.locations, vec!["United States"]);
        assert_eq!(cfg.facets.max_days_old, 7);
        assert_eq!(
            cfg.store,
            StoreConfig::Sqlite {
                path: "jobs.db".into()
            }
        );
        assert_eq!(cfg.email.smtp_host, "smtp.gmail.com");
        assert_eq!(cfg.adzuna.timeout, Duration::from_secs(10));
    }

    #[test]
    fn every_missing_credential_is_reported() {
        let mut m = env(&[]);
        m.remove("EMAIL_PASSWORD");
        m.insert("ADZUNA_API_KEY".into(), "   ".into());
        let err = load(&m, None).unwrap_err().to_string();
        assert!(err.contains("EMAIL_PASSWORD"));
        assert!(err.contains("ADZUNA_API_KEY"));
        assert!(!err.contains("EMAIL_SENDER"));
    }

    #[test]
    fn locations_split_and_cleaned() {
        let cfg = load(&env(&[("SEARCH_LOCATIONS", "Remote, Austin ,,remote")]), None).unwrap();
        assert_eq!(cfg.facets.locations, vec!["Remote", "Austin"]);
    }

    #[test]
    fn dynamodb_selector() {
        let vars = env(&[
            ("DB_TYPE", "DynamoDB"),
            ("DYNAMODB_TABLE", "jobs"),
            ("AWS_REGION", "eu-west-1"),
        ]);
        let cfg = load(&vars, None).unwrap();
        assert_eq!(
            cfg.store,
            StoreConfig::DynamoDb {
                table: "jobs".into(),
                region: "eu-west-1".into()
            }
        );
        assert!(load(&env(&[("DB_TYPE", "postgres")]), None).is_err());
    }

    #[test]
    fn file_facets_override_env() {
        let file = SearchFile {
            keywords: Some("rust".into()),
            locations: None,
            max_days_old: Some(2),
        };
        let vars = env(&[("SEARCH_KEYWORDS", "java"), ("SEARCH_LOCATIONS", "Remote")]);
        let cfg = load(&vars, Some(file)).unwrap();
        assert_eq!(cfg.facets.keywords, "rust");
        assert_eq!(cfg.facets.locations, vec!["Remote"]);
        assert_eq!(cfg.facets.max_days_old, 2);
    }

    #[test]
    fn bad_numbers_are_config_errors() {
        assert!(load(&env(&[("MAX_DAYS_OLD", "seven")]), None).is_err());
        assert!(load(&env(&[("MAX_DAYS_OLD", "0")]), None).is_err());
        assert!(load(&env(&[("HTTP_TIMEOUT_SECS", "0")]), None).is_err());
        assert!(load(&env(&[("SMTP_TIMEOUT_SECS", "9999")]), None).is_err());
    }
}
