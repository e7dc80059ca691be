use chrono::Utc;
use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::{Alias, Expr, OnConflict},
};

use crate::entity::sync_state::{ActiveModel, Column, Entity as SyncState, Model};

use super::cursor::CursorEntity;
use super::errors::{RepositoryError, Result};

impl CursorEntity for SyncState {
    fn id_column() -> Column {
        Column::Id
    }

    fn id_of(model: &Model) -> i64 {
        model.id
    }
}

fn active_model(name: &str, position: i64) -> ActiveModel {
    ActiveModel {
        id: NotSet,
        name: Set(name.to_string()),
        position: Set(position),
        updated_at: Set(Utc::now().fixed_offset()),
    }
}

/// Load the checkpoint of a job.
///
/// # Errors
/// Returns `RepositoryError::NotFound` if the job has never been checkpointed.
pub async fn load<C: ConnectionTrait>(db: &C, name: &str) -> Result<Model> {
    SyncState::find()
        .filter(Column::Name.eq(name))
        .one(db)
        .await?
        .ok_or_else(|| RepositoryError::not_found(format!("sync_state.name={name}")))
}

/// Load the checkpoint of a job, creating it at `initial` if absent.
///
/// An existing checkpoint is returned untouched, whatever `initial` is.
pub async fn load_or_init<C: ConnectionTrait>(db: &C, name: &str, initial: i64) -> Result<Model> {
    SyncState::insert(active_model(name, initial))
        .on_conflict(OnConflict::column(Column::Name).do_nothing().to_owned())
        .exec_without_returning(db)
        .await?;

    load(db, name).await
}

/// All checkpoints, ordered by job name.
pub async fn list<C: ConnectionTrait>(db: &C) -> Result<Vec<Model>> {
    SyncState::find()
        .order_by_asc(Column::Name)
        .all(db)
        .await
        .map_err(RepositoryError::from)
}

/// Build the ON CONFLICT clause used by [`advance`].
///
/// The existing row is only overwritten when the new position is not lower,
/// so rewriting the same position is accepted and moving back is a no-op.
pub(crate) fn build_advance_on_conflict() -> OnConflict {
    OnConflict::column(Column::Name)
        .update_columns([Column::Position, Column::UpdatedAt])
        .action_and_where(
            Expr::col((SyncState, Column::Position))
                .lte(Expr::col((Alias::new("excluded"), Column::Position))),
        )
        .to_owned()
}

/// Move a checkpoint forward to `position`, creating it if absent.
///
/// Run this on the same transaction as the batch it covers.
///
/// # Errors
/// Returns `RepositoryError::CheckpointRegression` if the stored position is
/// greater than `position`; the stored row is left unchanged.
pub async fn advance<C: ConnectionTrait>(db: &C, name: &str, position: i64) -> Result<()> {
    if position < 0 {
        return Err(RepositoryError::InvalidInput {
            message: format!("checkpoint '{name}' position must not be negative, got {position}"),
        });
    }

    let rows = SyncState::insert(active_model(name, position))
        .on_conflict(build_advance_on_conflict())
        .exec_without_returning(db)
        .await?;

    if rows == 0 {
        return Err(RepositoryError::CheckpointRegression {
            name: name.to_string(),
            position,
        });
    }

    tracing::debug!(checkpoint = name, position, "Checkpoint advanced");
    Ok(())
}

#[cfg(test)]
mod tests {
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, QueryTrait};

    use super::*;

    #[test]
    fn advance_only_overwrites_lower_positions() {
        let sql = SyncState::insert(active_model("price-feed", 42))
            .on_conflict(build_advance_on_conflict())
            .build(DatabaseBackend::Sqlite)
            .to_string();

        assert!(sql.contains(r#"ON CONFLICT ("name") DO UPDATE"#), "{sql}");
        assert!(
            sql.contains(r#""sync_state"."position" <= "excluded"."position""#),
            "{sql}"
        );
    }

    #[tokio::test]
    async fn advance_reports_regression_when_nothing_written() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_exec_results([MockExecResult {
                rows_affected: 0,
                last_insert_id: 0,
            }])
            .into_connection();

        let err = advance(&db, "price-feed", 7)
            .await
            .expect_err("zero rows affected should be a regression");
        assert!(matches!(
            err,
            RepositoryError::CheckpointRegression { ref name, position: 7 } if name == "price-feed"
        ));
    }

    #[tokio::test]
    async fn advance_rejects_negative_position() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let err = advance(&db, "price-feed", -1)
            .await
            .expect_err("negative position should fail");
        assert!(matches!(err, RepositoryError::InvalidInput { .. }));
    }
}
