//! SeaORM entity definitions for the celestine schema.
//!
//! Every table carries an auto-increment `i64` id. Ids are assigned once,
//! never reused and strictly increasing per table, which is what keyset
//! pagination in [`crate::repository::cursor`] relies on.

pub mod address;
pub mod celestial;
pub mod prelude;
pub mod price;
pub mod sync_state;
