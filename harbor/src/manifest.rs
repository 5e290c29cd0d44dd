//! The result manifest: a YAML record of broken tags that drives later
//! replayed checks and bulk deletes.

use camino::Utf8Path;
use harbor_driver::Tag;
use serde::{Deserialize, Serialize};

use crate::error::{HarborError, HarborResult};
use crate::pool::StageReceiver;

/// A persisted list of tags with a declared count.
///
/// ```yaml
/// artifacts:
///   - name: latest
///     project_name: library
///     repository_name: nginx
///     digest: sha256:4c0f...
/// count: 1
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityCheckFile {
    /// The recorded tags.
    #[serde(default)]
    pub artifacts: Vec<Tag>,

    /// How many tags the writer recorded.
    #[serde(default)]
    pub count: usize,
}

impl IntegrityCheckFile {
    /// A manifest for `tags`, with `count` set to match.
    pub fn from_tags(tags: Vec<Tag>) -> Self {
        let count = tags.len();
        Self {
            artifacts: tags,
            count,
        }
    }

    /// Drain a tag channel into a manifest.
    ///
    /// Tags are sorted by `(project, repository, name)` so that two runs
    /// over the same registry state produce identical files.
    pub async fn collect(mut tags: StageReceiver<Tag>) -> Self {
        let mut collected = Vec::new();
        while let Some(tag) = tags.recv().await {
            collected.push(tag);
        }
        collected.sort();
        Self::from_tags(collected)
    }

    /// Whether the declared count matches the number of recorded tags.
    pub fn is_consistent(&self) -> bool {
        self.count == self.artifacts.len()
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> HarborResult<String> {
        serde_yaml_ng::to_string(self).map_err(HarborError::SerializeManifest)
    }

    /// Read and parse a manifest file.
    #[tracing::instrument]
    pub async fn read(path: &Utf8Path) -> HarborResult<Self> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| HarborError::ReadManifest {
                path: path.to_owned(),
                source,
            })?;

        let file: Self =
            serde_yaml_ng::from_str(&text).map_err(|source| HarborError::ParseManifest {
                path: path.to_owned(),
                source,
            })?;

        if !file.is_consistent() {
            tracing::warn!(
                %path,
                count = file.count,
                artifacts = file.artifacts.len(),
                "declared count does not match the recorded artifacts"
            );
        }
        tracing::debug!(%path, count = file.count, "read integrity check file");

        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use camino::Utf8PathBuf;
    use indoc::indoc;

    use super::*;

    fn tag(project: &str, repository: &str, name: &str) -> Tag {
        Tag {
            name: name.into(),
            project_name: project.into(),
            repository_name: repository.into(),
            digest: "sha256:abc".into(),
        }
    }

    fn write_temp(contents: &str) -> (tempfile::NamedTempFile, Utf8PathBuf) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let path = Utf8PathBuf::from_path_buf(file.path().to_path_buf()).unwrap();
        (file, path)
    }

    #[tokio::test]
    async fn reads_artifacts_and_count() {
        let (_file, path) = write_temp(indoc! {"
            artifacts:
              - name: latest
                project_name: p1
                repository_name: img
                digest: sha256:abc
              - name: sha256:abc
                project_name: p1
                repository_name: img
                digest: sha256:abc
            count: 2
        "});

        let file = IntegrityCheckFile::read(&path).await.unwrap();
        assert_eq!(file.count, 2);
        assert_eq!(file.artifacts.len(), 2);
        assert_eq!(file.artifacts[0].key(), ("p1", "img", "latest"));
        assert!(file.is_consistent());
    }

    #[tokio::test]
    async fn declared_count_is_kept_when_inconsistent() {
        let (_file, path) = write_temp(indoc! {"
            artifacts:
              - name: latest
                project_name: p1
                repository_name: img
            count: 5
        "});

        let file = IntegrityCheckFile::read(&path).await.unwrap();
        assert_eq!(file.count, 5);
        assert!(!file.is_consistent());
    }

    #[tokio::test]
    async fn missing_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("absent.yaml")).unwrap();

        let error = IntegrityCheckFile::read(&path).await.unwrap_err();
        assert!(matches!(error, HarborError::ReadManifest { .. }));
    }

    #[tokio::test]
    async fn malformed_file_is_a_parse_error() {
        let (_file, path) = write_temp("artifacts: [not, tags\ncount: nope\n");

        let error = IntegrityCheckFile::read(&path).await.unwrap_err();
        assert!(matches!(error, HarborError::ParseManifest { .. }));
    }

    #[tokio::test]
    async fn collect_sorts_and_counts() {
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tx.send(tag("p2", "img", "latest")).await.unwrap();
        tx.send(tag("p1", "img", "v1")).await.unwrap();
        tx.send(tag("p1", "img", "latest")).await.unwrap();
        drop(tx);

        let file = IntegrityCheckFile::collect(rx).await;
        assert_eq!(file.count, 3);
        let keys: Vec<_> = file.artifacts.iter().map(Tag::key).collect();
        assert_eq!(
            keys,
            [("p1", "img", "latest"), ("p1", "img", "v1"), ("p2", "img", "latest")]
        );
    }

    #[tokio::test]
    async fn written_yaml_reads_back() {
        let original = IntegrityCheckFile::from_tags(vec![tag("p1", "img", "latest")]);
        let (_file, path) = write_temp(&original.to_yaml().unwrap());

        let file = IntegrityCheckFile::read(&path).await.unwrap();
        assert_eq!(file, original);
        assert_eq!(file.artifacts[0].digest, "sha256:abc");
    }
}
