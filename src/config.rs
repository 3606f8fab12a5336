//! Configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. User config: `~/.config/content-collection-rw/config.toml` (XDG) or platform config dir
//! 2. Project config: `.content-collection-rw.toml`
//! 3. Environment variables: `CCRW_*`, nested with `__` (e.g. `CCRW_NEO4J__URI`)
//! 4. An explicit file passed with `--config`
//!
//! # Example
//!
//! ```toml
//! [app]
//! system_code = "upp-content-collection-rw-neo4j"
//!
//! [neo4j]
//! uri = "bolt://localhost:7687"
//! user = "neo4j"
//! password = "secret"
//!
//! [[collections]]
//! name = "content-collection/story-package"
//! labels = ["Curation", "StoryPackage"]
//! relation = "SELECTS"
//! extra_relation_for_delete = "IS_CURATED_FOR"
//! ```
//!
//! When no `[[collections]]` are given, the story-package and
//! content-package kinds are served.

use std::ops::Deref;
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "content-collection-rw";
const PROJECT_FILE: &str = ".content-collection-rw.toml";
const ENV_PREFIX: &str = "CCRW_";

/// Boxed wrapper for figment::Error to reduce Result size on the stack.
#[derive(Debug)]
pub struct ConfigError(Box<figment::Error>);

impl Deref for ConfigError {
    type Target = figment::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub neo4j: Neo4jConfig,
    /// Collection kinds to serve. Empty means the standard kinds.
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,
}

/// Process identity, reported by health checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub system_code: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "content-collection-rw-neo4j".to_string(),
            system_code: "upp-content-collection-rw-neo4j".to_string(),
        }
    }
}

/// Neo4j connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Neo4jConfig {
    /// Bolt URI, e.g. `bolt://localhost:7687`.
    pub uri: String,
    pub user: String,
    pub password: Option<String>,
    /// Upper bound of the driver's connection pool.
    pub max_connections: usize,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: None,
            max_connections: 16,
        }
    }
}

/// One collection kind: its type labels and edge types.
///
/// Labels and relation names are validated when the kind is built
/// ([`crate::models::CollectionKind::from_config`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Name the kind is addressed by, e.g. `content-collection/story-package`.
    pub name: String,
    /// Type labels, added on top of the base `ContentCollection` label.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Membership edge type.
    pub relation: String,
    /// Second edge type removed on delete.
    #[serde(default)]
    pub extra_relation_for_delete: Option<String>,
}

impl CollectionConfig {
    /// Story packages: curated selections, also linked by `IS_CURATED_FOR`.
    pub fn story_package() -> Self {
        Self {
            name: "content-collection/story-package".to_string(),
            labels: vec!["Curation".to_string(), "StoryPackage".to_string()],
            relation: "SELECTS".to_string(),
            extra_relation_for_delete: Some("IS_CURATED_FOR".to_string()),
        }
    }

    /// Content packages: plain collections with no type labels.
    pub fn content_package() -> Self {
        Self {
            name: "content-collection/content-package".to_string(),
            labels: Vec::new(),
            relation: "CONTAINS".to_string(),
            extra_relation_for_delete: None,
        }
    }
}

impl Config {
    /// Load config with layered resolution (user → project → env → explicit file).
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()))
            // Layer 1: User config (lowest priority)
            .merge(Toml::file(Self::user_config_path()))
            // Layer 2: Project config
            .merge(Toml::file(PROJECT_FILE))
            // Layer 3: Environment variables
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        // Layer 4: Explicit file (highest priority)
        if let Some(path) = explicit {
            figment = figment.merge(Toml::file(path));
        }

        Self::from_figment(figment)
    }

    /// Extracts the config from a prepared figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        figment.extract().map_err(ConfigError::from)
    }

    /// Configured collection kinds, or the standard ones when none are set.
    pub fn effective_collections(&self) -> Vec<CollectionConfig> {
        if self.collections.is_empty() {
            vec![
                CollectionConfig::story_package(),
                CollectionConfig::content_package(),
            ]
        } else {
            self.collections.clone()
        }
    }

    /// User config path: ~/.config/content-collection-rw/config.toml (XDG) or platform config dir.
    fn user_config_path() -> PathBuf {
        // Prefer XDG config location (~/.config) on all platforms
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home.join(".config").join(APP_DIR).join("config.toml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }
        dirs::config_dir()
            .map(|p| p.join(APP_DIR).join("config.toml"))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Result<Config, ConfigError> {
        Config::from_figment(
            Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(toml)),
        )
    }

    #[test]
    fn test_defaults_apply_without_files() {
        let config = parse("").unwrap();

        assert_eq!(config.neo4j.uri, "bolt://localhost:7687");
        assert_eq!(config.app.system_code, "upp-content-collection-rw-neo4j");
        assert!(config.collections.is_empty());

        let kinds: Vec<String> = config
            .effective_collections()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(
            kinds,
            vec![
                "content-collection/story-package",
                "content-collection/content-package"
            ]
        );
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = parse(
            r#"
            [neo4j]
            uri = "bolt://graph:7687"
            password = "secret"
            "#,
        )
        .unwrap();

        assert_eq!(config.neo4j.uri, "bolt://graph:7687");
        assert_eq!(config.neo4j.password.as_deref(), Some("secret"));
        assert_eq!(config.neo4j.user, "neo4j");
        assert_eq!(config.neo4j.max_connections, 16);
    }

    #[test]
    fn test_configured_collections_replace_defaults() {
        let config = parse(
            r#"
            [[collections]]
            name = "content-collection/custom"
            labels = ["Custom"]
            relation = "HOLDS"
            "#,
        )
        .unwrap();

        let kinds = config.effective_collections();
        assert_eq!(kinds.len(), 1);
        assert_eq!(kinds[0].relation, "HOLDS");
        assert_eq!(kinds[0].extra_relation_for_delete, None);
    }

    #[test]
    fn test_collection_without_relation_is_rejected() {
        let result = parse(
            r#"
            [[collections]]
            name = "content-collection/broken"
            "#,
        );
        assert!(result.is_err());
    }
}
