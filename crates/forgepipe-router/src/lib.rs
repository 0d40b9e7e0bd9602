//! The Model Router: resolves a role or an explicit provider/model pair to a
//! live call, handling admission, caching, retry, and fallback so stage
//! handlers never talk to a provider adapter directly.

mod error;
mod health;
mod price;
mod role_map;
mod router;
mod types;

pub use error::RouterError;
pub use health::HealthTable;
pub use price::{PriceTable, Rate};
pub use role_map::{RoleMap, RoleTarget};
pub use router::ModelRouter;
pub use types::{RouteContext, RouteRequest, RouteResponse, RouteTarget};
