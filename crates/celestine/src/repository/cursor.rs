//! Generic keyset pagination and single-entity mutation.
//!
//! Every entity in the store has a monotonic `i64` id. Paginating by "last
//! seen id" instead of a row offset keeps pages stable while rows are being
//! appended: new rows only ever show up after the cursor.

use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityName, EntityTrait,
    IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Select, sea_query::OnConflict,
};
use serde::{Deserialize, Serialize};

use super::errors::{RepositoryError, Result};

/// Page size used when a caller asks for zero rows.
pub const DEFAULT_LIMIT: u64 = 10;

/// Upper bound on a single page.
pub const MAX_LIMIT: u64 = 100;

/// Direction of iteration over ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// How the cursor id is compared against row ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Keyset pagination request.
///
/// `after_id == 0` means "from the start" in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorQuery {
    /// Cursor: id of the last row the caller has seen.
    pub after_id: i64,
    /// Requested page size; normalized by [`CursorQuery::effective_limit`].
    pub limit: u64,
    /// Iteration direction.
    pub order: SortOrder,
    /// Explicit comparator; defaults to strictly-after in `order`.
    pub cmp: Option<Comparator>,
}

impl CursorQuery {
    /// Ascending page of rows with ids strictly greater than `after_id`.
    pub fn after(after_id: i64, limit: u64) -> Self {
        Self {
            after_id,
            limit,
            order: SortOrder::Asc,
            cmp: None,
        }
    }

    /// Descending page of rows with ids strictly lower than `before_id`.
    pub fn before(before_id: i64, limit: u64) -> Self {
        Self {
            after_id: before_id,
            limit,
            order: SortOrder::Desc,
            cmp: None,
        }
    }

    /// Override the comparator, e.g. `Gte` to include the cursor row.
    #[must_use]
    pub fn with_comparator(mut self, cmp: Comparator) -> Self {
        self.cmp = Some(cmp);
        self
    }

    /// The page size actually used: 0 becomes [`DEFAULT_LIMIT`], anything
    /// above [`MAX_LIMIT`] is clamped.
    pub fn effective_limit(&self) -> u64 {
        match self.limit {
            0 => DEFAULT_LIMIT,
            n => n.min(MAX_LIMIT),
        }
    }

    /// The comparator actually used.
    pub fn comparator(&self) -> Comparator {
        self.cmp.unwrap_or(match self.order {
            SortOrder::Asc => Comparator::Gt,
            SortOrder::Desc => Comparator::Lt,
        })
    }
}

/// An entity with a monotonic, never-reused `i64` id.
pub trait CursorEntity: EntityTrait {
    /// Column holding the id.
    fn id_column() -> Self::Column;

    /// Read the id of a loaded model.
    fn id_of(model: &Self::Model) -> i64;
}

/// An entity with a natural key that upserts conflict on.
pub trait NaturalKey: CursorEntity {
    /// Columns forming the unique natural key.
    fn natural_key() -> Vec<Self::Column>;

    /// Columns overwritten when a row with the same natural key exists.
    fn update_columns() -> Vec<Self::Column>;
}

/// Point lookup by id.
///
/// # Errors
/// Returns `RepositoryError::NotFound` if no row has this id.
pub async fn get_by_id<E, C>(db: &C, id: i64) -> Result<E::Model>
where
    E: CursorEntity,
    C: ConnectionTrait,
{
    E::find()
        .filter(E::id_column().eq(id))
        .one(db)
        .await?
        .ok_or_else(|| RepositoryError::not_found_by_id(E::default().table_name(), id))
}

/// Highest id assigned so far.
///
/// # Errors
/// Returns `RepositoryError::NotFound` on an empty table.
pub async fn last_id<E, C>(db: &C) -> Result<i64>
where
    E: CursorEntity,
    C: ConnectionTrait,
{
    E::find()
        .order_by_desc(E::id_column())
        .one(db)
        .await?
        .map(|model| E::id_of(&model))
        .ok_or_else(|| RepositoryError::not_found(format!("{} is empty", E::default().table_name())))
}

pub(crate) fn cursor_select<E: CursorEntity>(query: &CursorQuery) -> Select<E> {
    let id = E::id_column();
    let mut select = E::find();

    if query.after_id > 0 {
        let condition = match query.comparator() {
            Comparator::Gt => id.gt(query.after_id),
            Comparator::Gte => id.gte(query.after_id),
            Comparator::Lt => id.lt(query.after_id),
            Comparator::Lte => id.lte(query.after_id),
        };
        select = select.filter(condition);
    }

    let select = match query.order {
        SortOrder::Asc => select.order_by_asc(id),
        SortOrder::Desc => select.order_by_desc(id),
    };

    select.limit(query.effective_limit())
}

/// Keyset pagination over ids.
///
/// Returns at most `query.effective_limit()` rows ordered by id. Results are
/// deterministic for an unchanged dataset, and a query positioned at
/// [`last_id`] in ascending order is always empty.
pub async fn cursor_list<E, C>(db: &C, query: CursorQuery) -> Result<Vec<E::Model>>
where
    E: CursorEntity,
    C: ConnectionTrait,
{
    cursor_select::<E>(&query)
        .all(db)
        .await
        .map_err(RepositoryError::from)
}

/// Cursor for the page after `page`, or `None` when the page is empty.
pub fn next_cursor<E: CursorEntity>(page: &[E::Model]) -> Option<i64> {
    page.last().map(E::id_of)
}

/// Insert a single entity.
pub async fn save<A, C>(db: &C, model: A) -> Result<<A::Entity as EntityTrait>::Model>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    C: ConnectionTrait,
{
    model.insert(db).await.map_err(RepositoryError::from)
}

/// Update a single entity by primary key.
pub async fn update<A, C>(db: &C, model: A) -> Result<<A::Entity as EntityTrait>::Model>
where
    A: ActiveModelTrait + ActiveModelBehavior + Send,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    C: ConnectionTrait,
{
    model.update(db).await.map_err(RepositoryError::from)
}

pub(crate) fn natural_key_on_conflict<E: NaturalKey>() -> OnConflict {
    OnConflict::columns(E::natural_key())
        .update_columns(E::update_columns())
        .to_owned()
}

/// Insert-or-update by natural key in a single statement.
///
/// Replaying the same models leaves the table unchanged apart from the
/// updated columns being rewritten with identical values; ids of existing
/// rows are kept.
///
/// # Returns
/// Number of rows inserted or updated.
pub async fn upsert_many<A, C>(db: &C, models: Vec<A>) -> Result<u64>
where
    A: ActiveModelTrait + Send,
    A::Entity: NaturalKey,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
    C: ConnectionTrait,
{
    if models.is_empty() {
        return Ok(0);
    }

    <A::Entity as EntityTrait>::insert_many(models)
        .on_conflict(natural_key_on_conflict::<A::Entity>())
        .exec_without_returning(db)
        .await
        .map_err(RepositoryError::from)
}

#[cfg(test)]
mod tests {
    use sea_orm::{DatabaseBackend, QueryTrait};

    use super::*;
    use crate::entity::price;

    #[test]
    fn effective_limit_defaults_and_clamps() {
        assert_eq!(CursorQuery::after(0, 0).effective_limit(), DEFAULT_LIMIT);
        assert_eq!(CursorQuery::after(0, 25).effective_limit(), 25);
        assert_eq!(CursorQuery::after(0, 5_000).effective_limit(), MAX_LIMIT);
    }

    #[test]
    fn comparator_follows_order_unless_overridden() {
        assert_eq!(CursorQuery::after(3, 10).comparator(), Comparator::Gt);
        assert_eq!(CursorQuery::before(3, 10).comparator(), Comparator::Lt);
        assert_eq!(
            CursorQuery::after(3, 10)
                .with_comparator(Comparator::Gte)
                .comparator(),
            Comparator::Gte
        );
    }

    #[test]
    fn ascending_query_filters_after_cursor() {
        let sql = cursor_select::<price::Entity>(&CursorQuery::after(5, 20))
            .build(DatabaseBackend::Sqlite)
            .to_string();

        assert!(sql.contains(r#""prices"."id" > 5"#), "{sql}");
        assert!(sql.contains(r#"ORDER BY "prices"."id" ASC"#), "{sql}");
        assert!(sql.contains("LIMIT 20"), "{sql}");
    }

    #[test]
    fn descending_query_from_start_has_no_filter() {
        let sql = cursor_select::<price::Entity>(&CursorQuery::before(0, 0))
            .build(DatabaseBackend::Sqlite)
            .to_string();

        assert!(!sql.contains("WHERE"), "{sql}");
        assert!(sql.contains(r#"ORDER BY "prices"."id" DESC"#), "{sql}");
        assert!(sql.contains(&format!("LIMIT {DEFAULT_LIMIT}")), "{sql}");
    }

    #[test]
    fn upsert_conflicts_on_natural_key() {
        use sea_orm::{NotSet, Set};

        let now = chrono::Utc::now().fixed_offset();
        let model = price::ActiveModel {
            id: NotSet,
            currency: Set("TIAUSDT".to_string()),
            time: Set(now),
            open: Set(1.0),
            high: Set(2.0),
            low: Set(0.5),
            close: Set(1.5),
        };
        let sql = price::Entity::insert_many(vec![model])
            .on_conflict(natural_key_on_conflict::<price::Entity>())
            .build(DatabaseBackend::Sqlite)
            .to_string();

        assert!(sql.contains(r#"ON CONFLICT ("currency", "time") DO UPDATE"#), "{sql}");
        assert!(sql.contains(r#""close" = "excluded"."close""#), "{sql}");
    }
}
