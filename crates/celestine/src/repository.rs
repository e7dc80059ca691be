//! Storage access for every celestine table.
//!
//! [`cursor`] holds the generic keyset pagination contract that every entity
//! implements; the per-table modules add natural-key lookups on top. All
//! functions take any `ConnectionTrait`, so the same calls run against a
//! plain connection or inside a sync transaction.

pub mod address;
pub mod celestial;
pub mod cursor;
mod errors;
pub mod price;
pub mod sync_state;

pub use cursor::{
    Comparator, CursorEntity, CursorQuery, DEFAULT_LIMIT, MAX_LIMIT, NaturalKey, SortOrder,
    cursor_list, get_by_id, last_id, next_cursor, save, update, upsert_many,
};
pub use errors::{OptionalExt, RepositoryError, Result, is_no_rows};
