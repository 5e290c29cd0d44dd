//! # Registry crawl pipeline
//!
//! Crawls a container registry (projects → images → artifacts → tags),
//! verifies that every tag's manifest can be fetched, and deletes tags in
//! bulk from an auditable result manifest.
//!
//! Each stage is a fixed-size pool of workers draining a bounded channel
//! and feeding the next one, so downstream stages start consuming before
//! upstream stages finish. Failures of individual items are logged and
//! skipped (or, for integrity checks, reported as broken tags); only setup
//! failures abort an operation.
//!
//! ## Example
//!
//! ```no_run
//! use camino::Utf8Path;
//! use harbor::{Crawler, Harbor, IntegrityCheckFile, MemoryRegistry, PipelineConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let crawler = Crawler::new(Harbor::new(MemoryRegistry::new()), PipelineConfig::default());
//!
//! let broken = crawler.integrity_check(8).await?;
//! let manifest = IntegrityCheckFile::collect(broken).await;
//! std::fs::write("broken.yaml", manifest.to_yaml()?)?;
//!
//! let report = crawler
//!     .bulk_delete(8, Utf8Path::new("broken.yaml"), manifest.count)
//!     .await?;
//! println!("deleted {} tags", report.deleted);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

mod config;
mod crawler;
mod delete;
mod enumerate;
mod error;
mod integrity;
mod manifest;
pub(crate) mod memory;
mod pool;
mod replication;

pub use config::PipelineConfig;
pub use crawler::Crawler;
pub use delete::DeleteReport;
pub use error::{ConfigError, HarborError, HarborResult};
pub use integrity::ImageRef;
pub use manifest::IntegrityCheckFile;
#[doc(inline)]
pub use memory::MemoryRegistry;
pub use pool::StageReceiver;

#[doc(inline)]
pub use harbor_driver::{
    Artifact, ArtifactTag, Driver, Image, Manifest, Project, RegistryError, RegistryErrorKind,
    ReplicationPolicy, ReplicationStatus, Settings, Tag,
};

pub(crate) type ArcDriver = Arc<dyn Driver + Send + Sync>;

/// A shareable handle to a registry driver.
#[derive(Debug, Clone)]
pub struct Harbor {
    driver: ArcDriver,
}

impl<D> From<D> for Harbor
where
    D: Driver + Send + Sync + 'static,
{
    fn from(value: D) -> Self {
        Harbor::new(value)
    }
}

impl Harbor {
    /// Wrap a driver.
    pub fn new<D: Driver + Send + Sync + 'static>(driver: D) -> Self {
        Self {
            driver: Arc::new(driver),
        }
    }

    /// Wrap a driver the caller keeps a reference to.
    pub fn shared<D: Driver + Send + Sync + 'static>(driver: Arc<D>) -> Self {
        Self { driver }
    }

    /// The driver name.
    pub fn name(&self) -> &str {
        self.driver.name()
    }

    #[tracing::instrument(skip(self), fields(driver=self.driver.name()))]
    pub(crate) async fn list_projects(&self) -> Result<Vec<Project>, RegistryError> {
        self.driver.list_projects().await
    }

    #[tracing::instrument(level = "trace", skip(self), fields(driver=self.driver.name()))]
    pub(crate) async fn list_images(&self, project: &str) -> Result<Vec<Image>, RegistryError> {
        self.driver.list_images(project).await
    }

    #[tracing::instrument(level = "trace", skip(self), fields(driver=self.driver.name()))]
    pub(crate) async fn list_artifacts(
        &self,
        project: &str,
        repository: &str,
    ) -> Result<Vec<Artifact>, RegistryError> {
        self.driver.list_artifacts(project, repository).await
    }

    #[tracing::instrument(level = "trace", skip(self), fields(driver=self.driver.name()))]
    pub(crate) async fn get_manifest(
        &self,
        project: &str,
        repository: &str,
        reference: &str,
    ) -> Result<Manifest, RegistryError> {
        self.driver.get_manifest(project, repository, reference).await
    }

    #[tracing::instrument(level = "trace", skip_all, fields(driver=self.driver.name(), %tag))]
    pub(crate) async fn delete_tag(&self, tag: &Tag) -> Result<(), RegistryError> {
        self.driver.delete_tag(tag).await
    }

    #[tracing::instrument(skip(self), fields(driver=self.driver.name()))]
    pub(crate) async fn list_replication_policies(
        &self,
    ) -> Result<Vec<ReplicationPolicy>, RegistryError> {
        self.driver.list_replication_policies().await
    }

    #[tracing::instrument(skip(self), fields(driver=self.driver.name()))]
    pub(crate) async fn trigger_replication(
        &self,
        id: i64,
    ) -> Result<ReplicationStatus, RegistryError> {
        self.driver.trigger_replication(id).await
    }

    #[tracing::instrument(skip_all, fields(driver=self.driver.name()))]
    pub(crate) async fn update_settings(&self, settings: &Settings) -> Result<(), RegistryError> {
        self.driver.update_settings(settings).await
    }
}
