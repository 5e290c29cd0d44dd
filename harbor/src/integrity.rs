//! Manifest verification.

use std::fmt;
use std::str::FromStr;

use camino::Utf8Path;
use harbor_driver::Tag;

use crate::error::{HarborError, HarborResult};
use crate::manifest::IntegrityCheckFile;
use crate::pool::{feed, StageReceiver, WorkerPool};
use crate::Crawler;

/// A `project/repository:tag` image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Project name, everything before the first `/`.
    pub project: String,
    /// Repository name, which may itself contain `/`.
    pub repository: String,
    /// Tag name, everything after the first `:` following the project.
    pub tag: String,
}

impl FromStr for ImageRef {
    type Err = HarborError;

    fn from_str(image: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| HarborError::InvalidImageRef {
            image: image.to_owned(),
            reason,
        };

        let (project, rest) = image
            .split_once('/')
            .ok_or_else(|| invalid("expected a project and image name"))?;
        let (repository, tag) = rest
            .split_once(':')
            .ok_or_else(|| invalid("expected a tag"))?;

        Ok(ImageRef {
            project: project.to_owned(),
            repository: repository.to_owned(),
            tag: tag.to_owned(),
        })
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.project, self.repository, self.tag)
    }
}

impl Crawler {
    /// Verify every tag in the registry.
    ///
    /// The returned channel carries the tags whose manifest could not be
    /// fetched; verified tags are dropped.
    #[tracing::instrument(skip(self))]
    pub async fn integrity_check(&self, concurrency: usize) -> HarborResult<StageReceiver<Tag>> {
        let tags = self.list_images_with_tags(concurrency).await?;
        Ok(self.verify(tags, concurrency))
    }

    /// Verify the tags recorded in a result manifest instead of crawling.
    #[tracing::instrument(skip(self))]
    pub async fn integrity_check_from_file(
        &self,
        concurrency: usize,
        path: &Utf8Path,
    ) -> HarborResult<StageReceiver<Tag>> {
        let file = IntegrityCheckFile::read(path).await?;
        let tags = feed("manifest", file.artifacts, self.config.tag_capacity());
        Ok(self.verify(tags, concurrency))
    }

    /// Fetch the manifest of a single `project/repository:tag` image.
    #[tracing::instrument(skip(self))]
    pub async fn check_manifest(&self, image: &str) -> HarborResult<()> {
        let reference: ImageRef = image.parse()?;

        self.harbor
            .get_manifest(&reference.project, &reference.repository, &reference.tag)
            .await
            .map_err(|source| HarborError::Manifest {
                image: image.to_owned(),
                source,
            })?;

        tracing::debug!(%reference, "manifest ok");
        Ok(())
    }

    fn verify(&self, tags: StageReceiver<Tag>, concurrency: usize) -> StageReceiver<Tag> {
        let harbor = self.harbor.clone();
        WorkerPool::new("verify", concurrency).spawn(
            tags,
            self.config.tag_capacity(),
            move |tag: Tag, broken| {
                let harbor = harbor.clone();
                async move {
                    if broken.is_closed() {
                        tracing::trace!(%tag, "broken tags dropped, skipping check");
                        return;
                    }
                    tracing::debug!(%tag, "checking manifest");

                    let result = harbor
                        .get_manifest(&tag.project_name, &tag.repository_name, &tag.name)
                        .await;

                    if let Err(error) = result {
                        tracing::error!(%tag, %error, "failed to get manifest");
                        broken.emit(tag).await;
                    }
                }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_image_ref() {
        let reference: ImageRef = "library/nginx:1.25".parse().unwrap();
        assert_eq!(
            reference,
            ImageRef {
                project: "library".into(),
                repository: "nginx".into(),
                tag: "1.25".into(),
            }
        );
        assert_eq!(reference.to_string(), "library/nginx:1.25");
    }

    #[test]
    fn parse_nested_repository() {
        let reference: ImageRef = "library/tools/curl:latest".parse().unwrap();
        assert_eq!(reference.project, "library");
        assert_eq!(reference.repository, "tools/curl");
        assert_eq!(reference.tag, "latest");
    }

    #[test]
    fn parse_requires_project() {
        let error = "nginx:latest".parse::<ImageRef>().unwrap_err();
        assert!(matches!(
            error,
            HarborError::InvalidImageRef {
                reason: "expected a project and image name",
                ..
            }
        ));
    }

    #[test]
    fn parse_requires_tag() {
        let error = "library/nginx".parse::<ImageRef>().unwrap_err();
        assert!(matches!(
            error,
            HarborError::InvalidImageRef {
                reason: "expected a tag",
                ..
            }
        ));
    }
}
