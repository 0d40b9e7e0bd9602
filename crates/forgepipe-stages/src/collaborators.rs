//! The two external collaborators named in §6 that stages 7 and 8 call
//! through: a repo hoster and a cloud deployer. Each is a single async call
//! returning a resource descriptor or an error; neither's wire format is
//! this crate's concern.

use async_trait::async_trait;
use forgepipe_core::ids::BuildId;

#[async_trait]
pub trait RepoHoster: Send + Sync {
    /// Publish `code` for `build_id`, returning an opaque descriptor of the
    /// created resource (e.g. a repository URL).
    async fn publish(&self, build_id: BuildId, code: &[u8]) -> Result<String, String>;
}

#[async_trait]
pub trait CloudDeployer: Send + Sync {
    /// Deploy the resource named by `repo_descriptor`, returning an opaque
    /// descriptor of the deployed resource (e.g. a live URL).
    async fn deploy(&self, build_id: BuildId, repo_descriptor: &str) -> Result<String, String>;
}

/// A collaborator that always succeeds with a fixed descriptor, for tests
/// and for local/offline runs where no real hoster or deployer is wired up.
pub struct StaticCollaborator {
    pub descriptor: String,
}

#[async_trait]
impl RepoHoster for StaticCollaborator {
    async fn publish(&self, _build_id: BuildId, _code: &[u8]) -> Result<String, String> {
        Ok(self.descriptor.clone())
    }
}

#[async_trait]
impl CloudDeployer for StaticCollaborator {
    async fn deploy(&self, _build_id: BuildId, _repo_descriptor: &str) -> Result<String, String> {
        Ok(self.descriptor.clone())
    }
}
