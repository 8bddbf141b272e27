//! Configuration management

use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub reference: ReferenceConfig,
    pub geo: GeoConfig,
    #[serde(default)]
    pub links: LinkConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite log store. Opened read-only.
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceConfig {
    /// CSV with `Alpha-2 code`, `Alpha-3 code` and a display-name column
    pub countries_path: String,
    #[serde(default = "default_name_column")]
    pub name_column: String,
}

fn default_name_column() -> String {
    "Country".to_string()
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            countries_path: String::new(),
            name_column: default_name_column(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoConfig {
    /// GeoJSON FeatureCollection of country polygons
    pub world_path: String,
    #[serde(default = "default_key_property")]
    pub key_property: String,
}

fn default_key_property() -> String {
    "iso_a3".to_string()
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            world_path: String::new(),
            key_property: default_key_property(),
        }
    }
}

/// Base URLs used for hyperlink-annotated scheme and NAAN labels
#[derive(Debug, Clone, Deserialize)]
pub struct LinkConfig {
    #[serde(default = "default_scheme_base")]
    pub scheme_base: String,
    #[serde(default = "default_naan_base")]
    pub naan_base: String,
}

fn default_scheme_base() -> String {
    "https://n2t.net/".to_string()
}

fn default_naan_base() -> String {
    "https://n2t.net/ark:/".to_string()
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            scheme_base: default_scheme_base(),
            naan_base: default_naan_base(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn load(config_path: &str) -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(config_path))
            .add_source(config::Environment::with_prefix("N2T_REPORT").separator("__"));

        let settings = builder.build()?;
        let config: Config = settings.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }
        if self.reference.countries_path.is_empty() {
            anyhow::bail!("Country reference path cannot be empty");
        }
        if self.reference.name_column.trim().is_empty() {
            anyhow::bail!("Country reference name column cannot be empty");
        }
        if self.geo.world_path.is_empty() {
            anyhow::bail!("World geometry path cannot be empty");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid logging level '{}'. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            database: DatabaseConfig {
                url: "analysis/logs.sqlite3".to_string(),
            },
            reference: ReferenceConfig {
                countries_path: "geo/countries_codes_and_coordinates.csv".to_string(),
                ..Default::default()
            },
            geo: GeoConfig {
                world_path: "geo/world.geojson".to_string(),
                ..Default::default()
            },
            links: LinkConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    #[test]
    fn accepts_complete_config() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn rejects_empty_database_url() {
        let mut config = sample();
        config.database.url.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = sample();
        config.logging.level = "loud".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("loud"));
    }

    #[test]
    fn loads_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.toml");
        std::fs::write(
            &path,
            r#"
[database]
url = "logs.sqlite3"

[reference]
countries_path = "countries.csv"

[geo]
world_path = "world.geojson"

[logging]
level = "debug"
"#,
        )
        .unwrap();

        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.database.url, "logs.sqlite3");
        assert_eq!(config.reference.name_column, "Country");
        assert_eq!(config.geo.key_property, "iso_a3");
        assert_eq!(config.links.naan_base, "https://n2t.net/ark:/");
    }
}
