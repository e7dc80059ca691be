//! Dump table rows as JSON lines through keyset pagination.

use clap::ValueEnum;
use sea_orm::DatabaseConnection;
use serde::Serialize;

use celestine::repository::{CursorEntity, CursorQuery, SortOrder, cursor_list, next_cursor};
use celestine::{Address, Celestial, Price};

/// Table to list.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum ListTable {
    Addresses,
    Prices,
    Celestials,
}

/// Pagination options for `celestine list`.
#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ListOptions {
    /// Start after this id (0 starts from the beginning)
    #[arg(short, long, default_value_t = 0)]
    pub after: i64,

    /// Maximum rows per page (clamped to 100)
    #[arg(short, long, default_value_t = 10)]
    pub limit: u64,

    /// Iterate from the newest id down
    #[arg(long)]
    pub desc: bool,

    /// Keep paging until the table is exhausted
    #[arg(long)]
    pub all: bool,
}

impl ListOptions {
    fn query(&self, after_id: i64) -> CursorQuery {
        CursorQuery {
            after_id,
            limit: self.limit,
            order: if self.desc {
                SortOrder::Desc
            } else {
                SortOrder::Asc
            },
            cmp: None,
        }
    }
}

pub(crate) async fn handle_list(
    db: &DatabaseConnection,
    table: ListTable,
    opts: &ListOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    match table {
        ListTable::Addresses => print_pages::<Address>(db, opts).await,
        ListTable::Prices => print_pages::<Price>(db, opts).await,
        ListTable::Celestials => print_pages::<Celestial>(db, opts).await,
    }
}

async fn print_pages<E>(
    db: &DatabaseConnection,
    opts: &ListOptions,
) -> Result<(), Box<dyn std::error::Error>>
where
    E: CursorEntity,
    E::Model: Serialize,
{
    let mut after_id = opts.after;
    let limit = opts.query(after_id).effective_limit();

    loop {
        let page = cursor_list::<E, _>(db, opts.query(after_id)).await?;
        for row in &page {
            println!("{}", serde_json::to_string(row)?);
        }

        // A short page is the last one
        match next_cursor::<E>(&page) {
            Some(next) if opts.all && page.len() as u64 == limit => after_id = next,
            _ => break,
        }
    }

    Ok(())
}
