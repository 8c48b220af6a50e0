use std::{fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

/// Where uploaded images end up.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Plain directory, served back under `/uploads`.
    Local { upload_dir: PathBuf },
    /// S3-compatible bucket (MinIO in development).
    S3 {
        endpoint: String,
        bucket: String,
        access_key: String,
        secret_key: String,
        region: String,
        presign_ttl_secs: u64,
    },
}

/// Longest token lifetime accepted from `JWT_TTL_MINUTES` (one year).
pub const MAX_JWT_TTL_MINUTES: i64 = 60 * 24 * 365;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub public_base_url: String,
    pub jwt: JwtConfig,
    pub classifier: ClassifierConfig,
    pub storage: StorageConfig,
}

type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: Lookup<'_>) -> anyhow::Result<Self> {
        let host = get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parsed(get, "APP_PORT", 8080)?;
        let listen_addr = format!("{}:{port}", host.trim())
            .parse::<SocketAddr>()
            .with_context(|| format!("APP_HOST={host:?} is not an IP address"))?;

        let database_url = required(get, "DATABASE_URL")?;

        let jwt = JwtConfig {
            secret: required(get, "JWT_SECRET")?,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "catascan".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "catascan-users".into()),
            ttl_minutes: parsed(get, "JWT_TTL_MINUTES", 60)?,
        };
        anyhow::ensure!(
            (1..=MAX_JWT_TTL_MINUTES).contains(&jwt.ttl_minutes),
            "JWT_TTL_MINUTES must be between 1 and {MAX_JWT_TTL_MINUTES}"
        );

        let classifier = ClassifierConfig {
            base_url: required(get, "CLASSIFIER_URL")?
                .trim_end_matches('/')
                .to_string(),
            timeout_secs: parsed(get, "CLASSIFIER_TIMEOUT_SECS", 30)?,
        };

        let storage = match get("STORAGE_BACKEND").as_deref().unwrap_or("local") {
            "local" => StorageConfig::Local {
                upload_dir: get("UPLOAD_DIR")
                    .unwrap_or_else(|| "uploads".into())
                    .into(),
            },
            "s3" => StorageConfig::S3 {
                endpoint: required(get, "MINIO_ENDPOINT")?,
                bucket: required(get, "MINIO_BUCKET")?,
                access_key: required(get, "MINIO_ACCESS_KEY")?,
                secret_key: required(get, "MINIO_SECRET_KEY")?,
                region: get("MINIO_REGION").unwrap_or_else(|| "us-east-1".into()),
                presign_ttl_secs: parsed(get, "PRESIGN_TTL_SECS", 30 * 60)?,
            },
            other => anyhow::bail!("unknown STORAGE_BACKEND {other:?} (expected local or s3)"),
        };

        let public_base_url = get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| "http://localhost:8080".into())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            listen_addr,
            database_url,
            public_base_url,
            jwt,
            classifier,
            storage,
        })
    }
}

fn required(get: Lookup<'_>, key: &str) -> anyhow::Result<String> {
    get(key)
        .filter(|v| !v.trim().is_empty())
        .with_context(|| format!("{key} must be set"))
}

fn parsed<T>(get: Lookup<'_>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{key}={raw:?} is invalid: {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(&|key| map.get(key).cloned())
    }

    const BASE: &[(&str, &str)] = &[
        ("DATABASE_URL", "postgres://localhost/catascan"),
        ("JWT_SECRET", "s3cret"),
        ("CLASSIFIER_URL", "http://localhost:5000/"),
    ];

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let cfg = load(BASE).expect("config");
        assert_eq!(cfg.jwt.issuer, "catascan");
        assert_eq!(cfg.jwt.audience, "catascan-users");
        assert_eq!(cfg.jwt.ttl_minutes, 60);
        assert_eq!(cfg.classifier.base_url, "http://localhost:5000");
        assert_eq!(cfg.classifier.timeout_secs, 30);
        assert_eq!(cfg.public_base_url, "http://localhost:8080");
        assert_eq!(cfg.listen_addr, SocketAddr::from(([0, 0, 0, 0], 8080)));
        match cfg.storage {
            StorageConfig::Local { upload_dir } => assert_eq!(upload_dir, PathBuf::from("uploads")),
            other => panic!("expected local storage, got {other:?}"),
        }
    }

    #[test]
    fn missing_secret_is_an_error() {
        let vars: Vec<_> = BASE.iter().copied().filter(|(k, _)| *k != "JWT_SECRET").collect();
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn missing_classifier_url_is_an_error() {
        let vars: Vec<_> = BASE
            .iter()
            .copied()
            .filter(|(k, _)| *k != "CLASSIFIER_URL")
            .collect();
        assert!(load(&vars).is_err());
    }

    #[test]
    fn malformed_number_is_rejected() {
        let mut vars = BASE.to_vec();
        vars.push(("JWT_TTL_MINUTES", "soon"));
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("JWT_TTL_MINUTES"));
    }

    #[test]
    fn token_lifetime_is_bounded() {
        for bad in ["0", "-5", "525601", "9223372036854775807"] {
            let mut vars = BASE.to_vec();
            vars.push(("JWT_TTL_MINUTES", bad));
            let err = load(&vars).unwrap_err();
            assert!(err.to_string().contains("JWT_TTL_MINUTES"), "{bad}");
        }

        let mut vars = BASE.to_vec();
        vars.push(("JWT_TTL_MINUTES", "525600"));
        assert_eq!(load(&vars).expect("config").jwt.ttl_minutes, MAX_JWT_TTL_MINUTES);
    }

    #[test]
    fn listen_address_comes_from_host_and_port() {
        let mut vars = BASE.to_vec();
        vars.extend_from_slice(&[("APP_HOST", "127.0.0.1"), ("APP_PORT", "9090")]);
        let cfg = load(&vars).expect("config");
        assert_eq!(cfg.listen_addr, SocketAddr::from(([127, 0, 0, 1], 9090)));

        let mut vars = BASE.to_vec();
        vars.push(("APP_PORT", "70000"));
        assert!(load(&vars).unwrap_err().to_string().contains("APP_PORT"));

        let mut vars = BASE.to_vec();
        vars.push(("APP_HOST", "not a host"));
        assert!(load(&vars).unwrap_err().to_string().contains("APP_HOST"));
    }

    #[test]
    fn s3_backend_requires_minio_settings() {
        let mut vars = BASE.to_vec();
        vars.push(("STORAGE_BACKEND", "s3"));
        assert!(load(&vars).is_err());

        vars.extend_from_slice(&[
            ("MINIO_ENDPOINT", "http://minio:9000"),
            ("MINIO_BUCKET", "catascan"),
            ("MINIO_ACCESS_KEY", "minio"),
            ("MINIO_SECRET_KEY", "minio123"),
        ]);
        let cfg = load(&vars).expect("config");
        match cfg.storage {
            StorageConfig::S3 { region, presign_ttl_secs, .. } => {
                assert_eq!(region, "us-east-1");
                assert_eq!(presign_ttl_secs, 1800);
            }
            other => panic!("expected s3 storage, got {other:?}"),
        }
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut vars = BASE.to_vec();
        vars.push(("STORAGE_BACKEND", "ftp"));
        assert!(load(&vars).is_err());
    }
}
