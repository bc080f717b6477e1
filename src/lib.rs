// Asset Trail - ledger-confirmed asset instance tracking

pub mod config;
pub mod content;
pub mod error;
pub mod events;
pub mod instances;
pub mod ledger;
pub mod logging;
pub mod node;
pub mod repository;
pub mod schema;
pub mod storage;
pub mod types;

pub use config::{AssetTrailConfig, ConfigError};
pub use error::{AssetError, ErrorKind};
pub use events::{DispatchStats, EventDispatcher, EventFailure};
pub use instances::{AssetInstanceService, Reconciliation};
pub use node::AssetTrailNode;
pub use types::{AssetDefinition, AssetInstance, AssetInstanceCreated, InstanceState, LedgerEvent};
