use std::{env, fmt::Display, str::FromStr};

use tracing::info;

use crate::domain::email_service::EmailConfig;

/// Runtime configuration, loaded from the environment with logged defaults.
///
/// All collaborator handles (database, cache, mail relay, text generation)
/// are constructed from these values in `main` and injected into services;
/// nothing reads the environment after startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub frontend_origin: String,
    pub jwt_secret: String,
    pub jwt_expiry_seconds: u64,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub email: EmailConfig,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("PORT", "5000"),
            database_url: try_load("DATABASE_URL", "sqlite:finance_advisor.db"),
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1:6379"),
            frontend_origin: try_load("FRONTEND_ORIGIN", "http://localhost:8080"),
            jwt_secret: try_load(
                "JWT_SECRET",
                // Development default; override in any real deployment.
                "insecure-development-secret-0123456789abcdef",
            ),
            jwt_expiry_seconds: try_load("JWT_EXPIRES_IN_SECONDS", "604800"),
            gemini_api_key: try_load("GEMINI_API_KEY", ""),
            gemini_model: try_load("GEMINI_MODEL", "gemini-2.0-flash"),
            email: EmailConfig {
                smtp_server: try_load("EMAIL_HOST", "smtp.gmail.com"),
                smtp_port: try_load("EMAIL_PORT", "587"),
                username: try_load("EMAIL_USER", ""),
                password: try_load("EMAIL_PASS", ""),
                from_email: try_load("EMAIL_FROM", ""),
            },
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default:?}");
        default.to_string()
    });
    raw.parse()
        .unwrap_or_else(|e| panic!("invalid {key} value {raw:?}: {e}"))
}
