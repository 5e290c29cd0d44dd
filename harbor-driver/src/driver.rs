use std::fmt;

use crate::error::RegistryError;
use crate::model::{
    Artifact, Image, Manifest, Project, ReplicationPolicy, ReplicationStatus, Settings, Tag,
};

/// A registry driver, which provides the ability to interact with a container registry.
///
/// Every call is independent; the pipeline invokes drivers concurrently from
/// many workers, so implementations must be safe to share.
#[async_trait::async_trait]
pub trait Driver: fmt::Debug {
    /// The name of the driver.
    fn name(&self) -> &'static str;

    /// List every project visible to this driver.
    async fn list_projects(&self) -> Result<Vec<Project>, RegistryError>;

    /// List the repositories in a project.
    ///
    /// Image names are returned as the registry reports them, including
    /// the `<project>/` prefix.
    async fn list_images(&self, project: &str) -> Result<Vec<Image>, RegistryError>;

    /// List the artifacts in a repository, with their tags.
    async fn list_artifacts(
        &self,
        project: &str,
        repository: &str,
    ) -> Result<Vec<Artifact>, RegistryError>;

    /// Fetch a manifest by tag name or digest.
    async fn get_manifest(
        &self,
        project: &str,
        repository: &str,
        reference: &str,
    ) -> Result<Manifest, RegistryError>;

    /// Delete a tag.
    async fn delete_tag(&self, tag: &Tag) -> Result<(), RegistryError>;

    /// List the configured replication policies.
    async fn list_replication_policies(&self) -> Result<Vec<ReplicationPolicy>, RegistryError>;

    /// Start an execution of a replication policy.
    async fn trigger_replication(&self, id: i64) -> Result<ReplicationStatus, RegistryError>;

    /// Apply registry-wide settings.
    async fn update_settings(&self, settings: &Settings) -> Result<(), RegistryError>;
}
