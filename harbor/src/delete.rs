use camino::Utf8Path;
use harbor_driver::Tag;

use crate::error::{HarborError, HarborResult};
use crate::manifest::IntegrityCheckFile;
use crate::pool::{feed, WorkerPool};
use crate::Crawler;

/// Outcome counts of a bulk delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Tags the registry confirmed deleted.
    pub deleted: usize,
    /// Tags whose delete call failed.
    pub failed: usize,
}

impl Crawler {
    /// Delete every tag recorded in a result manifest.
    ///
    /// When `expected_count` is non-zero it must equal the manifest's
    /// declared `count`, otherwise nothing is deleted. Returns once every
    /// worker has finished.
    #[tracing::instrument(skip(self))]
    pub async fn bulk_delete(
        &self,
        concurrency: usize,
        path: &Utf8Path,
        expected_count: usize,
    ) -> HarborResult<DeleteReport> {
        let file = IntegrityCheckFile::read(path).await?;

        if expected_count > 0 && file.count != expected_count {
            return Err(HarborError::CountMismatch {
                expected: expected_count,
                actual: file.count,
            });
        }

        let tags = feed("delete", file.artifacts, self.config.tag_capacity());
        let harbor = self.harbor.clone();
        let mut outcomes = WorkerPool::new("delete", concurrency).spawn(
            tags,
            self.config.tag_capacity(),
            move |tag: Tag, outcome| {
                let harbor = harbor.clone();
                async move {
                    let deleted = match harbor.delete_tag(&tag).await {
                        Ok(()) => {
                            tracing::info!(%tag, "Deleted tag");
                            true
                        }
                        Err(error) => {
                            tracing::error!(%tag, %error, "failed to delete tag");
                            false
                        }
                    };
                    outcome.emit(deleted).await;
                }
            },
        );

        let mut report = DeleteReport::default();
        while let Some(deleted) = outcomes.recv().await {
            if deleted {
                report.deleted += 1;
            } else {
                report.failed += 1;
            }
        }

        tracing::info!(
            deleted = report.deleted,
            failed = report.failed,
            "bulk delete finished"
        );
        Ok(report)
    }
}
