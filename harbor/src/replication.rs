use harbor_driver::{ReplicationStatus, Settings};

use crate::error::{HarborError, HarborResult};
use crate::Crawler;

impl Crawler {
    /// Trigger every replication policy, one after another.
    ///
    /// Stops at the first policy that cannot be triggered.
    pub async fn replicate_all(&self) -> HarborResult<Vec<ReplicationStatus>> {
        tracing::info!("Listing replication policies");
        let policies = self
            .harbor
            .list_replication_policies()
            .await
            .map_err(HarborError::registry("failed to list replication policies"))?;

        let mut statuses = Vec::with_capacity(policies.len());
        for policy in policies {
            tracing::info!(id = policy.id, "Triggering replication of {}", policy.name);
            let status = self
                .harbor
                .trigger_replication(policy.id)
                .await
                .map_err(HarborError::registry("failed to trigger replication"))?;

            tracing::info!(
                start = %status.start_time,
                pending = status.in_progress,
                success = status.succeed,
                failed = status.failed,
                "{} {}: {}",
                status.status,
                policy.name,
                status.status_text,
            );
            statuses.push(status);
        }

        Ok(statuses)
    }

    /// Apply registry-wide settings.
    pub async fn update_settings(&self, settings: &Settings) -> HarborResult<()> {
        tracing::info!(driver = self.harbor.name(), ?settings, "Updating settings");
        self.harbor
            .update_settings(settings)
            .await
            .map_err(HarborError::registry("failed to update settings"))
    }
}
