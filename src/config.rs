use anyhow::Context;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL")?;

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "quillpost".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "quillpost-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 7),
        };

        let username = std::env::var("SMTP_USERNAME").context("SMTP_USERNAME")?;
        let smtp = SmtpConfig {
            host: std::env::var("SMTP_HOST").context("SMTP_HOST")?,
            from: std::env::var("SMTP_FROM").unwrap_or_else(|_| username.clone()),
            password: std::env::var("SMTP_PASSWORD").context("SMTP_PASSWORD")?,
            username,
        };

        let storage = StorageConfig {
            endpoint: std::env::var("S3_ENDPOINT").context("S3_ENDPOINT")?,
            bucket: std::env::var("S3_BUCKET").context("S3_BUCKET")?,
            access_key: std::env::var("S3_ACCESS_KEY").context("S3_ACCESS_KEY")?,
            secret_key: std::env::var("S3_SECRET_KEY").context("S3_SECRET_KEY")?,
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };

        Ok(Self {
            database_url,
            jwt,
            smtp,
            storage,
        })
    }
}
