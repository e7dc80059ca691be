//! Common re-exports for convenient entity usage.

pub use super::address::{
    ActiveModel as AddressActiveModel, Column as AddressColumn, Entity as Address,
    Model as AddressModel,
};
pub use super::celestial::{
    ActiveModel as CelestialActiveModel, Column as CelestialColumn, Entity as Celestial,
    Model as CelestialModel,
};
pub use super::price::{
    ActiveModel as PriceActiveModel, Column as PriceColumn, Entity as Price, Model as PriceModel,
};
pub use super::sync_state::{
    ActiveModel as SyncStateActiveModel, Column as SyncStateColumn, Entity as SyncState,
    Model as SyncStateModel,
};
