//! Thumbnail handler configuration, assembled once at process start

use crate::processor::{
    ThumbnailConfig, DEFAULT_QUALITY, DEFAULT_TARGET_HEIGHT, DEFAULT_TARGET_WIDTH,
};
use image_store::DbConfig;
use pipeline_core::config::{non_blank, parse_or_default};
use pipeline_core::{codes, defer, Deferred, DerivedPrefix, PipelineError, Result};
use s3_utils::S3Config;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct ThumbnailEnv {
    derived_prefix: Option<String>,
    derived_bucket: Option<String>,
    target_width: Option<String>,
    target_height: Option<String>,
    thumbnail_quality: Option<String>,
    run_migrations: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ThumbnailServiceConfig {
    pub derived_prefix: DerivedPrefix,
    /// Bucket receiving thumbnails; the source bucket when unset
    pub derived_bucket: Option<String>,
    pub thumbnail: ThumbnailConfig,
    /// Apply schema migrations before handling the event
    pub run_migrations: bool,
}

impl ThumbnailServiceConfig {
    fn from_env_vars(env: ThumbnailEnv) -> Result<Self> {
        let derived_prefix = match env.derived_prefix {
            Some(raw) => DerivedPrefix::new(&raw)?,
            None => DerivedPrefix::default(),
        };

        let positive = |v: &u32| *v > 0;
        let thumbnail = ThumbnailConfig {
            target_width: parse_or_default(
                "TARGET_WIDTH",
                env.target_width.as_deref(),
                DEFAULT_TARGET_WIDTH,
                positive,
            ),
            target_height: parse_or_default(
                "TARGET_HEIGHT",
                env.target_height.as_deref(),
                DEFAULT_TARGET_HEIGHT,
                positive,
            ),
            quality: parse_or_default(
                "THUMBNAIL_QUALITY",
                env.thumbnail_quality.as_deref(),
                DEFAULT_QUALITY,
                |q: &u8| (1..=100).contains(q),
            ),
        };

        Ok(Self {
            derived_prefix,
            derived_bucket: non_blank(env.derived_bucket),
            thumbnail,
            run_migrations: parse_or_default(
                "RUN_MIGRATIONS",
                env.run_migrations.as_deref(),
                false,
                |_| true,
            ),
        })
    }
}

/// Everything the thumbnail handler needs.
///
/// Only the service settings are fatal. Storage settings that fail to load
/// are kept as faults and surface when an event actually needs them.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub service: ThumbnailServiceConfig,
    pub s3: Deferred<S3Config>,
    pub db: Deferred<DbConfig>,
}

impl HandlerConfig {
    pub fn from_env() -> Result<Self> {
        let env = envy::from_env::<ThumbnailEnv>().map_err(invalid_config)?;
        Ok(Self {
            service: ThumbnailServiceConfig::from_env_vars(env)?,
            s3: defer(S3Config::from_env()),
            db: defer(DbConfig::from_env()),
        })
    }

    pub fn from_vars(vars: &[(String, String)]) -> Result<Self> {
        let env = envy::from_iter::<_, ThumbnailEnv>(vars.iter().cloned())
            .map_err(invalid_config)?;
        Ok(Self {
            service: ThumbnailServiceConfig::from_env_vars(env)?,
            s3: defer(S3Config::from_vars(vars.iter().cloned())),
            db: defer(DbConfig::from_vars(vars.iter().cloned())),
        })
    }
}

fn invalid_config(e: envy::Error) -> PipelineError {
    PipelineError::configuration(
        codes::INVALID_CONFIG,
        format!("Invalid configuration: {e}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut all = vec![(
            "DATABASE_URL".to_string(),
            "postgres://u:p@localhost/images".to_string(),
        )];
        all.extend(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        all
    }

    #[test]
    fn test_defaults() {
        let config = HandlerConfig::from_vars(&vars(&[])).unwrap();
        assert_eq!(config.service.derived_prefix.as_str(), "thumbnails/");
        assert_eq!(config.service.derived_bucket, None);
        assert_eq!(config.service.thumbnail, ThumbnailConfig::default());
        assert!(!config.service.run_migrations);
        assert!(config.s3.is_ok());
        assert!(config.db.is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = HandlerConfig::from_vars(&vars(&[
            ("DERIVED_PREFIX", "thumbs"),
            ("DERIVED_BUCKET", "derived"),
            ("TARGET_WIDTH", "256"),
            ("TARGET_HEIGHT", "64"),
            ("THUMBNAIL_QUALITY", "70"),
            ("RUN_MIGRATIONS", "true"),
        ]))
        .unwrap();

        assert_eq!(config.service.derived_prefix.as_str(), "thumbs");
        assert_eq!(config.service.derived_bucket.as_deref(), Some("derived"));
        assert_eq!(config.service.thumbnail.target_width, 256);
        assert_eq!(config.service.thumbnail.target_height, 64);
        assert_eq!(config.service.thumbnail.quality, 70);
        assert!(config.service.run_migrations);
    }

    #[test]
    fn test_invalid_dimensions_fall_back() {
        let config = HandlerConfig::from_vars(&vars(&[
            ("TARGET_WIDTH", "wide"),
            ("TARGET_HEIGHT", "0"),
            ("THUMBNAIL_QUALITY", "101"),
        ]))
        .unwrap();

        assert_eq!(config.service.thumbnail, ThumbnailConfig::default());
    }

    #[test]
    fn test_missing_database_config_is_deferred() {
        let config = HandlerConfig::from_vars(&[]).unwrap();
        assert_eq!(config.service.derived_prefix.as_str(), "thumbnails/");
        assert_eq!(config.db.unwrap_err().code(), codes::DB_CONFIG_MISSING);
    }

    #[test]
    fn test_empty_prefix_rejected() {
        for prefix in ["", "/"] {
            let err = HandlerConfig::from_vars(&vars(&[("DERIVED_PREFIX", prefix)]))
                .unwrap_err();
            assert_eq!(err.code(), codes::INVALID_CONFIG);
        }
    }
}
