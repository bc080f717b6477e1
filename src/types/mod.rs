//! Asset definitions, instances and ledger events

pub mod definition;
pub mod event;
pub mod instance;

pub use definition::AssetDefinition;
pub use event::{AssetInstanceCreated, LedgerEvent};
pub use instance::{AssetInstance, InstanceState};
