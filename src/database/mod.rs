pub mod context;
pub mod manager;
pub mod models;
pub mod repository;
pub mod router;
pub mod schema;

pub use context::{StoreContext, StoreTarget};
pub use manager::{PgStoreAdmin, StoreAdmin, StoreError, StoreManager};
pub use router::{EntityDomain, RoutingError, StoreRouter};
