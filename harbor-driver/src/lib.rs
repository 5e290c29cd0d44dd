//! # Registry driver
//!
//! The capability the crawl pipeline consumes: a [`Driver`] trait covering
//! project, image, artifact and manifest access plus tag deletion,
//! replication and settings, the data model it speaks, and
//! [`RegistryError`].

mod driver;
mod error;
mod model;

pub use driver::Driver;
pub use error::{RegistryError, RegistryErrorBuilder, RegistryErrorKind};
pub use model::{
    Artifact, ArtifactTag, Image, Manifest, Project, ReplicationPolicy, ReplicationStatus,
    Settings, Tag,
};
