//! Project, image and tag enumeration stages.

use harbor_driver::{Image, Project, Tag};

use crate::error::{HarborError, HarborResult};
use crate::pool::{feed, StageReceiver, WorkerPool};
use crate::Crawler;

impl Crawler {
    /// List every project in the registry.
    pub async fn list_projects(&self) -> HarborResult<Vec<Project>> {
        self.harbor
            .list_projects()
            .await
            .map_err(HarborError::registry("failed to list projects"))
    }

    /// Stream every image in the registry.
    ///
    /// Projects are listed once up front; `concurrency` workers then list
    /// the images of one project at a time. Image names arrive with the
    /// project prefix removed. A project whose images cannot be listed is
    /// logged and contributes nothing.
    #[tracing::instrument(skip(self))]
    pub async fn list_images(&self, concurrency: usize) -> HarborResult<StageReceiver<Image>> {
        let projects = self.list_projects().await?;
        tracing::debug!(projects = projects.len(), "listed projects");

        let capacity = self.config.project_capacity(projects.len());
        let names = feed(
            "projects",
            projects.into_iter().map(|project| project.name),
            capacity,
        );

        let harbor = self.harbor.clone();
        let images = WorkerPool::new("images", concurrency).spawn(
            names,
            self.config.image_capacity(),
            move |project: String, emitter| {
                let harbor = harbor.clone();
                async move {
                    let images = match harbor.list_images(&project).await {
                        Ok(images) => images,
                        Err(error) => {
                            tracing::error!(%project, %error, "failed to list images in project");
                            return;
                        }
                    };

                    for image in images {
                        if !emitter.emit(image.normalize(&project)).await {
                            break;
                        }
                    }
                }
            },
        );

        Ok(images)
    }

    /// Stream every tag in the registry.
    ///
    /// Each artifact yields one tag named by its digest followed by one tag
    /// per symbolic name, all carrying the artifact's digest. An image whose
    /// artifacts cannot be listed is logged and contributes nothing.
    #[tracing::instrument(skip(self))]
    pub async fn list_images_with_tags(
        &self,
        concurrency: usize,
    ) -> HarborResult<StageReceiver<Tag>> {
        let images = self.list_images(concurrency).await?;
        Ok(self.expand_tags(images, concurrency))
    }

    fn expand_tags(&self, images: StageReceiver<Image>, concurrency: usize) -> StageReceiver<Tag> {
        let harbor = self.harbor.clone();
        WorkerPool::new("artifacts", concurrency).spawn(
            images,
            self.config.tag_capacity(),
            move |image: Image, emitter| {
                let harbor = harbor.clone();
                async move {
                    let artifacts = match harbor
                        .list_artifacts(&image.project_name, &image.name)
                        .await
                    {
                        Ok(artifacts) => artifacts,
                        Err(error) => {
                            tracing::error!(
                                project = %image.project_name,
                                repository = %image.name,
                                %error,
                                "failed to list artifacts for image"
                            );
                            return;
                        }
                    };
                    tracing::trace!(
                        project = %image.project_name,
                        repository = %image.name,
                        artifacts = artifacts.len(),
                        "listed artifacts"
                    );

                    for artifact in artifacts {
                        for tag in artifact.into_tags(&image) {
                            if !emitter.emit(tag).await {
                                return;
                            }
                        }
                    }
                }
            },
        )
    }
}
