use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registry project, the top level of the hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Project {
    /// Project name.
    pub name: String,
}

impl Project {
    /// Create a project by name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A repository inside a project.
///
/// Drivers return `name` exactly as the registry reports it, which
/// includes the `<project>/` prefix; see [`Image::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Image {
    /// The owning project. Empty until the image is attributed to a project.
    #[serde(default)]
    pub project_name: String,

    /// The repository name.
    pub name: String,
}

impl Image {
    /// Create an image with the name as reported by the registry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            project_name: String::new(),
            name: name.into(),
        }
    }

    /// Attribute this image to `project` and strip the project component
    /// from its name.
    ///
    /// `library/nginx` in project `library` becomes `nginx`. A name that
    /// does not start with the project prefix loses everything up to its
    /// first `/`; a name without any `/` is kept unchanged.
    pub fn normalize(mut self, project: &str) -> Self {
        let name = match self.name.strip_prefix(project).and_then(|n| n.strip_prefix('/')) {
            Some(rest) => rest.to_owned(),
            None => match self.name.split_once('/') {
                Some((_, rest)) => rest.to_owned(),
                None => self.name.clone(),
            },
        };

        self.project_name = project.to_owned();
        self.name = name;
        self
    }
}

/// A symbolic tag attached to an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactTag {
    /// Tag name, e.g. `latest`.
    pub name: String,
}

/// One content-addressed object within a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Content digest. Treated as an opaque string.
    pub digest: String,

    /// Symbolic tags pointing at this digest, in registry order.
    #[serde(default)]
    pub tags: Vec<ArtifactTag>,
}

impl Artifact {
    /// Create an artifact from a digest and a list of tag names.
    pub fn new<I, S>(digest: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            digest: digest.into(),
            tags: tags
                .into_iter()
                .map(|name| ArtifactTag { name: name.into() })
                .collect(),
        }
    }

    /// Expand this artifact into the tags that identify it within `image`.
    ///
    /// The digest itself comes first, followed by one tag per symbolic
    /// name. All of them carry this artifact's digest.
    pub fn into_tags(self, image: &Image) -> impl Iterator<Item = Tag> + '_ {
        let digest = self.digest;
        let by_digest = Tag {
            name: digest.clone(),
            project_name: image.project_name.clone(),
            repository_name: image.name.clone(),
            digest: digest.clone(),
        };

        std::iter::once(by_digest).chain(self.tags.into_iter().map(move |tag| Tag {
            name: tag.name,
            project_name: image.project_name.clone(),
            repository_name: image.name.clone(),
            digest: digest.clone(),
        }))
    }
}

/// The unit of verification and deletion.
///
/// Identity is `(project_name, repository_name, name)`; the digest is
/// carried along for traceability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    /// Tag name, or the digest for digest-identified tags.
    pub name: String,

    /// Owning project.
    pub project_name: String,

    /// Repository within the project.
    pub repository_name: String,

    /// Digest of the artifact the tag points at.
    #[serde(default)]
    pub digest: String,
}

impl Tag {
    /// The `(project, repository, name)` triple identifying this tag.
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.project_name, &self.repository_name, &self.name)
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Tag {}

impl std::hash::Hash for Tag {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state)
    }
}

impl PartialOrd for Tag {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tag {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}:{}",
            self.project_name, self.repository_name, self.name
        )
    }
}

/// A fetched image manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Media type reported by the registry.
    pub media_type: String,

    /// Manifest body.
    pub content: serde_json::Value,
}

/// A replication policy configured on the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationPolicy {
    /// Policy identifier, used to trigger it.
    pub id: i64,

    /// Human readable policy name.
    pub name: String,
}

/// The state of a triggered replication execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationStatus {
    /// When the execution started.
    pub start_time: DateTime<Utc>,

    /// Execution status, e.g. `InProgress`.
    pub status: String,

    /// Free-form status detail.
    #[serde(default)]
    pub status_text: String,

    /// Tasks still running.
    pub in_progress: u64,

    /// Tasks that succeeded.
    pub succeed: u64,

    /// Tasks that failed.
    pub failed: u64,
}

/// Registry-wide configuration values.
///
/// Only the commonly managed keys are typed; anything else is carried in
/// `extra` and sent through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Authentication mode, e.g. `db_auth` or `ldap_auth`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_mode: Option<String>,

    /// Who may create projects: `everyone` or `adminonly`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_creation_restriction: Option<String>,

    /// Put the registry into read-only mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,

    /// Whether users may self-register.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_registration: Option<bool>,

    /// Token lifetime in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expiration: Option<u64>,

    /// Any other configuration keys.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}
