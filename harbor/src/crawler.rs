use crate::config::PipelineConfig;
use crate::Harbor;

/// Entry point for crawl, verification, deletion and replication runs
/// against one registry.
///
/// Channel-returning operations hand back the live output of the final
/// stage; the stages keep running in the background until their input is
/// exhausted, so callers must drain the returned channel.
#[derive(Debug, Clone)]
pub struct Crawler {
    pub(crate) harbor: Harbor,
    pub(crate) config: PipelineConfig,
}

impl Crawler {
    /// Create a crawler for `harbor` with the given channel capacities.
    pub fn new(harbor: Harbor, config: PipelineConfig) -> Self {
        Self { harbor, config }
    }

    /// The registry handle.
    pub fn harbor(&self) -> &Harbor {
        &self.harbor
    }

    /// The channel capacities in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}
