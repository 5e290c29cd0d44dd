//! Channel capacities for the pipeline stages.

use camino::Utf8Path;
use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_IMAGE_CAPACITY: usize = 100_000;
const DEFAULT_TAG_CAPACITY: usize = 300_000;

/// Largest buffer a tokio channel accepts.
const MAX_CAPACITY: usize = tokio::sync::Semaphore::MAX_PERMITS;

/// Buffer sizes for the channels between pipeline stages.
///
/// A full channel blocks its producers until the consumer catches up, so
/// these bound memory use on large registries. Any value large enough to
/// avoid constant stalls behaves the same.
///
/// ```toml
/// project-capacity = 64
/// image-capacity = 100000
/// tag-capacity = 300000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PipelineConfig {
    /// Capacity of the project channel. `None` sizes it to the number of projects listed.
    pub project_capacity: Option<usize>,

    /// Capacity of the image channel.
    pub image_capacity: usize,

    /// Capacity of every tag channel: enumerated, replayed from file, broken and deleted.
    pub tag_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            project_capacity: None,
            image_capacity: DEFAULT_IMAGE_CAPACITY,
            tag_capacity: DEFAULT_TAG_CAPACITY,
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from TOML.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml_edit::de::from_str(text)?)
    }

    /// Read a configuration from a TOML file.
    #[tracing::instrument]
    pub async fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_owned(),
                source,
            })?;
        Self::from_toml(&text)
    }

    pub(crate) fn project_capacity(&self, projects: usize) -> usize {
        self.project_capacity.unwrap_or(projects).clamp(1, MAX_CAPACITY)
    }

    pub(crate) fn image_capacity(&self) -> usize {
        self.image_capacity.clamp(1, MAX_CAPACITY)
    }

    pub(crate) fn tag_capacity(&self) -> usize {
        self.tag_capacity.clamp(1, MAX_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.project_capacity, None);
        assert_eq!(config.image_capacity, 100_000);
        assert_eq!(config.tag_capacity, 300_000);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml("tag-capacity = 10\n").unwrap();
        assert_eq!(config.tag_capacity, 10);
        assert_eq!(config.image_capacity, 100_000);
        assert_eq!(config.project_capacity, None);
    }

    #[test]
    fn capacities_are_at_least_one() {
        let config = PipelineConfig::from_toml(indoc::indoc! {"
            project-capacity = 0
            image-capacity = 0
            tag-capacity = 0
        "})
        .unwrap();
        assert_eq!(config.project_capacity(5), 1);
        assert_eq!(config.image_capacity(), 1);
        assert_eq!(config.tag_capacity(), 1);
    }

    #[test]
    fn capacities_are_capped_at_channel_limit() {
        let config = PipelineConfig::from_toml(indoc::indoc! {"
            project-capacity = 9000000000000000000
            image-capacity = 9000000000000000000
            tag-capacity = 9000000000000000000
        "})
        .unwrap();
        assert_eq!(config.tag_capacity, 9_000_000_000_000_000_000);
        assert_eq!(config.project_capacity(5), MAX_CAPACITY);
        assert_eq!(config.image_capacity(), MAX_CAPACITY);
        assert_eq!(config.tag_capacity(), MAX_CAPACITY);
    }

    #[test]
    fn project_capacity_follows_project_count() {
        let config = PipelineConfig::default();
        assert_eq!(config.project_capacity(7), 7);
        assert_eq!(config.project_capacity(0), 1);
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(PipelineConfig::from_toml("tag-capacity = \"lots\"\n").is_err());
    }

    #[tokio::test]
    async fn from_file_reports_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = camino::Utf8PathBuf::from_path_buf(dir.path().join("missing.toml")).unwrap();
        let error = PipelineConfig::from_file(&path).await.unwrap_err();
        assert!(matches!(error, ConfigError::Io { .. }));
    }
}
