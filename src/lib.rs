//! forgepipe - a build-pipeline orchestrator that drives a project spec
//! through clarification, normalization, documentation, codegen, publication
//! and deployment stages, routing every model call through a cost-aware
//! router and reporting progress over a fan-out event bus.

pub use forgepipe_api::{build_router, serve, ApiConfig};
pub use forgepipe_artifacts::{ArtifactError, ArtifactStore};
pub use forgepipe_bus::{BusError, ProgressBus, Subscription};
pub use forgepipe_cache::ResponseCache;
pub use forgepipe_config::{Config, ConfigError};
pub use forgepipe_core::build::{Build, BuildStatus, ErrorLogEntry};
pub use forgepipe_core::error::{ErrorCategory, ErrorKind, UserFriendlyError};
pub use forgepipe_core::event::{Event, EventKind, PhasePayload};
pub use forgepipe_core::ids::{BuildId, CorrelationId, ProjectId, TenantId, UserId};
pub use forgepipe_core::stage::{well_known, StageDescriptor, StageKey, StageStatus};
pub use forgepipe_cost::{CostController, CostError, CostTracker};
pub use forgepipe_orchestrator::{Orchestrator, OrchestratorError};
pub use forgepipe_providers::ProviderRegistry;
pub use forgepipe_ratelimit::RateLimiter;
pub use forgepipe_router::ModelRouter;
pub use forgepipe_stages::{default_stage_table, StageEntry, StageHandler};
