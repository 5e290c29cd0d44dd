use std::collections::{BTreeMap, HashSet};

use chrono::Utc;
use harbor_driver::{
    Artifact, Driver, Image, Manifest, Project, RegistryError, RegistryErrorKind,
    ReplicationPolicy, ReplicationStatus, Settings, Tag,
};
use tokio::sync::RwLock;

const ENGINE: &str = "memory";

type Repositories = BTreeMap<String, Vec<Artifact>>;

#[derive(Debug, Default)]
struct Inner {
    projects: BTreeMap<String, Repositories>,
    broken: HashSet<(String, String, String)>,
    failing_projects: HashSet<String>,
    failing_repositories: HashSet<(String, String)>,
    undeletable: HashSet<(String, String, String)>,
    policies: Vec<ReplicationPolicy>,
    triggered: Vec<i64>,
    deleted: Vec<Tag>,
    delete_calls: usize,
    manifest_calls: usize,
    settings: Option<Settings>,
}

fn coordinates(project: &str, repository: &str, reference: &str) -> (String, String, String) {
    (project.to_owned(), repository.to_owned(), reference.to_owned())
}

/// Registry driver that keeps projects, repositories and artifacts in memory.
///
/// Failures can be injected per project, repository or reference, and every
/// mutating call is recorded so tests can assert on what the pipeline did.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    inner: RwLock<Inner>,
}

impl MemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the given, empty, projects.
    pub fn with_projects(projects: &[&str]) -> Self {
        let mut inner = Inner::default();
        for project in projects {
            inner.projects.insert(project.to_string(), BTreeMap::new());
        }

        Self {
            inner: RwLock::new(inner),
        }
    }

    /// Create a project.
    pub async fn create_project(&self, project: &str) {
        let mut inner = self.inner.write().await;
        inner.projects.entry(project.to_owned()).or_default();
    }

    /// Push an artifact into `project/repository`, creating both as needed.
    pub async fn push(&self, project: &str, repository: &str, artifact: Artifact) {
        let mut inner = self.inner.write().await;
        inner
            .projects
            .entry(project.to_owned())
            .or_default()
            .entry(repository.to_owned())
            .or_default()
            .push(artifact);
    }

    /// Make manifest fetches for `project/repository:reference` fail.
    pub async fn break_manifest(&self, project: &str, repository: &str, reference: &str) {
        let mut inner = self.inner.write().await;
        inner
            .broken
            .insert(coordinates(project, repository, reference));
    }

    /// Make image listing for `project` fail.
    pub async fn fail_images(&self, project: &str) {
        let mut inner = self.inner.write().await;
        inner.failing_projects.insert(project.to_owned());
    }

    /// Make artifact listing for `project/repository` fail.
    pub async fn fail_artifacts(&self, project: &str, repository: &str) {
        let mut inner = self.inner.write().await;
        inner
            .failing_repositories
            .insert((project.to_owned(), repository.to_owned()));
    }

    /// Make deleting `project/repository:reference` fail.
    pub async fn fail_delete(&self, project: &str, repository: &str, reference: &str) {
        let mut inner = self.inner.write().await;
        inner
            .undeletable
            .insert(coordinates(project, repository, reference));
    }

    /// Register a replication policy.
    pub async fn add_replication_policy(&self, id: i64, name: &str) {
        let mut inner = self.inner.write().await;
        inner.policies.push(ReplicationPolicy {
            id,
            name: name.to_owned(),
        });
    }

    /// Tags removed by successful delete calls, in call order.
    pub async fn deleted(&self) -> Vec<Tag> {
        self.inner.read().await.deleted.clone()
    }

    /// Number of delete calls, successful or not.
    pub async fn delete_calls(&self) -> usize {
        self.inner.read().await.delete_calls
    }

    /// Number of manifest fetches, successful or not.
    pub async fn manifest_calls(&self) -> usize {
        self.inner.read().await.manifest_calls
    }

    /// Replication policy ids triggered, in call order.
    pub async fn triggered(&self) -> Vec<i64> {
        self.inner.read().await.triggered.clone()
    }

    /// The settings most recently applied.
    pub async fn settings(&self) -> Option<Settings> {
        self.inner.read().await.settings.clone()
    }
}

fn not_found(what: &'static str) -> RegistryError {
    RegistryError::new(ENGINE, RegistryErrorKind::NotFound, what)
}

fn resolves(artifacts: &[Artifact], reference: &str) -> bool {
    artifacts
        .iter()
        .any(|a| a.digest == reference || a.tags.iter().any(|t| t.name == reference))
}

#[async_trait::async_trait]
impl Driver for MemoryRegistry {
    fn name(&self) -> &'static str {
        ENGINE
    }

    async fn list_projects(&self) -> Result<Vec<Project>, RegistryError> {
        let inner = self.inner.read().await;
        Ok(inner.projects.keys().map(Project::new).collect())
    }

    async fn list_images(&self, project: &str) -> Result<Vec<Image>, RegistryError> {
        tracing::trace!(%project, "list memory images");

        let inner = self.inner.read().await;
        if inner.failing_projects.contains(project) {
            return Err(RegistryError::builder(
                ENGINE,
                RegistryErrorKind::ServiceUnavailable,
                "image listing unavailable",
            )
            .project(project)
            .build());
        }

        let repositories = inner.projects.get(project).ok_or_else(|| {
            RegistryError::builder(ENGINE, RegistryErrorKind::NotFound, "project not found")
                .project(project)
                .build()
        })?;

        Ok(repositories
            .keys()
            .map(|repository| Image::new(format!("{project}/{repository}")))
            .collect())
    }

    async fn list_artifacts(
        &self,
        project: &str,
        repository: &str,
    ) -> Result<Vec<Artifact>, RegistryError> {
        let inner = self.inner.read().await;
        if inner
            .failing_repositories
            .contains(&(project.to_owned(), repository.to_owned()))
        {
            return Err(RegistryError::builder(
                ENGINE,
                RegistryErrorKind::ServiceUnavailable,
                "artifact listing unavailable",
            )
            .project(project)
            .repository(repository)
            .build());
        }

        inner
            .projects
            .get(project)
            .and_then(|repositories| repositories.get(repository))
            .cloned()
            .ok_or_else(|| {
                RegistryError::builder(ENGINE, RegistryErrorKind::NotFound, "repository not found")
                    .project(project)
                    .repository(repository)
                    .build()
            })
    }

    async fn get_manifest(
        &self,
        project: &str,
        repository: &str,
        reference: &str,
    ) -> Result<Manifest, RegistryError> {
        let mut inner = self.inner.write().await;
        inner.manifest_calls += 1;

        let error = |kind, message: &'static str| {
            RegistryError::builder(ENGINE, kind, message)
                .project(project)
                .repository(repository)
                .reference(reference)
                .build()
        };

        if inner
            .broken
            .contains(&coordinates(project, repository, reference))
        {
            return Err(error(RegistryErrorKind::Other, "manifest blob unknown"));
        }

        let artifacts = inner
            .projects
            .get(project)
            .and_then(|repositories| repositories.get(repository))
            .ok_or_else(|| error(RegistryErrorKind::NotFound, "repository not found"))?;

        if !resolves(artifacts, reference) {
            return Err(error(RegistryErrorKind::NotFound, "manifest unknown"));
        }

        Ok(Manifest {
            media_type: "application/vnd.oci.image.manifest.v1+json".to_owned(),
            content: serde_json::json!({
                "schemaVersion": 2,
                "layers": [],
            }),
        })
    }

    async fn delete_tag(&self, tag: &Tag) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().await;
        inner.delete_calls += 1;

        let (project, repository, reference) = tag.key();
        if inner
            .undeletable
            .contains(&coordinates(project, repository, reference))
        {
            return Err(RegistryError::builder(
                ENGINE,
                RegistryErrorKind::PermissionDenied,
                "tag is immutable",
            )
            .project(project)
            .repository(repository)
            .reference(reference)
            .build());
        }

        let artifacts = inner
            .projects
            .get_mut(project)
            .and_then(|repositories| repositories.get_mut(repository))
            .ok_or_else(|| not_found("repository not found"))?;

        let before = artifacts.len();
        artifacts.retain(|a| a.digest != reference);
        let mut removed = artifacts.len() != before;
        for artifact in artifacts.iter_mut() {
            let tags = artifact.tags.len();
            artifact.tags.retain(|t| t.name != reference);
            removed |= artifact.tags.len() != tags;
        }

        if !removed {
            return Err(RegistryError::builder(
                ENGINE,
                RegistryErrorKind::NotFound,
                "tag not found",
            )
            .project(project)
            .repository(repository)
            .reference(reference)
            .build());
        }

        inner.deleted.push(tag.clone());
        Ok(())
    }

    async fn list_replication_policies(&self) -> Result<Vec<ReplicationPolicy>, RegistryError> {
        Ok(self.inner.read().await.policies.clone())
    }

    async fn trigger_replication(&self, id: i64) -> Result<ReplicationStatus, RegistryError> {
        let mut inner = self.inner.write().await;
        if !inner.policies.iter().any(|p| p.id == id) {
            return Err(not_found("replication policy not found"));
        }
        inner.triggered.push(id);

        Ok(ReplicationStatus {
            start_time: Utc::now(),
            status: "InProgress".to_owned(),
            status_text: String::new(),
            in_progress: 0,
            succeed: 0,
            failed: 0,
        })
    }

    async fn update_settings(&self, settings: &Settings) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().await;
        inner.settings = Some(settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn images_carry_project_prefix() {
        let registry = MemoryRegistry::new();
        registry
            .push("p1", "img", Artifact::new("sha256:abc", ["latest"]))
            .await;

        let images = registry.list_images("p1").await.unwrap();
        assert_eq!(images, vec![Image::new("p1/img")]);
    }

    #[tokio::test]
    async fn seeded_and_created_projects_are_listed() {
        let registry = MemoryRegistry::with_projects(&["alpha"]);
        registry.create_project("beta").await;
        registry.create_project("alpha").await;

        let projects = registry.list_projects().await.unwrap();
        assert_eq!(projects, vec![Project::new("alpha"), Project::new("beta")]);
        assert!(registry.list_images("beta").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn manifest_resolves_digest_and_tag() {
        let registry = MemoryRegistry::new();
        registry
            .push("p1", "img", Artifact::new("sha256:abc", ["latest"]))
            .await;

        assert!(registry.get_manifest("p1", "img", "latest").await.is_ok());
        assert!(registry.get_manifest("p1", "img", "sha256:abc").await.is_ok());

        let error = registry.get_manifest("p1", "img", "v2").await.unwrap_err();
        assert_eq!(error.kind(), RegistryErrorKind::NotFound);
        assert_eq!(registry.manifest_calls().await, 3);
    }

    #[tokio::test]
    async fn broken_manifest_fails() {
        let registry = MemoryRegistry::new();
        registry
            .push("p1", "img", Artifact::new("sha256:abc", ["latest"]))
            .await;
        registry.break_manifest("p1", "img", "latest").await;

        let error = registry
            .get_manifest("p1", "img", "latest")
            .await
            .unwrap_err();
        assert_eq!(error.reference(), Some("latest"));
    }

    #[tokio::test]
    async fn delete_removes_tag_name() {
        let registry = MemoryRegistry::new();
        registry
            .push("p1", "img", Artifact::new("sha256:abc", ["latest", "v1"]))
            .await;

        let tag = Tag {
            name: "latest".into(),
            project_name: "p1".into(),
            repository_name: "img".into(),
            digest: "sha256:abc".into(),
        };
        registry.delete_tag(&tag).await.unwrap();
        assert!(registry.delete_tag(&tag).await.is_err());

        let artifacts = registry.list_artifacts("p1", "img").await.unwrap();
        assert_eq!(artifacts, vec![Artifact::new("sha256:abc", ["v1"])]);
        assert_eq!(registry.delete_calls().await, 2);
        assert_eq!(registry.deleted().await, vec![tag]);
    }

    #[tokio::test]
    async fn unknown_policy_cannot_be_triggered() {
        let registry = MemoryRegistry::new();
        registry.add_replication_policy(1, "mirror").await;

        assert!(registry.trigger_replication(1).await.is_ok());
        assert!(registry.trigger_replication(2).await.is_err());
        assert_eq!(registry.triggered().await, vec![1]);
    }
}
