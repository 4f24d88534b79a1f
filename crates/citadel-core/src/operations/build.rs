//! Build: turn a repository revision into a deployable image.

use serde::Serialize;
use serde_json::{Map, Value};

use super::event::NarrationEvent;
use super::{Operation, Revision};

/// Payload of `POST /build`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildRequest {
    /// Repository address, e.g. `git@github.com:name/project.git`.
    pub repo: String,
    /// Commit to build.
    pub sha: String,
    /// URL of an extra artifact to include in the image. Empty for none.
    pub artifact: String,
    /// User id inside the image. Empty lets the server use the app's id.
    pub uid: String,
    /// Additional top-level fields passed through to the server.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BuildRequest {
    pub fn new(revision: Revision) -> Self {
        Self {
            repo: revision.repo,
            sha: revision.sha,
            artifact: String::new(),
            uid: String::new(),
            extra: Map::new(),
        }
    }

    pub fn artifact(mut self, artifact: impl Into<String>) -> Self {
        self.artifact = artifact.into();
        self
    }

    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = uid.into();
        self
    }

    pub fn extra_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

impl Operation for BuildRequest {
    type Event = NarrationEvent;
    const NAME: &'static str = "build";
    const PATH: &'static str = "/build";
}
