use crate::error::StoreError;
use model::{
    core::{entity::EntityKind, identifiers::TargetId},
    records::target::{TargetAuthor, TargetBook, TargetComment, TargetGenre, TargetRecord},
};
use tokio_postgres::{Client, Row, error::SqlState};

pub const SCHEMA_SQL: &str = include_str!("sql/schema.sql");
pub const TRUNCATE_SQL: &str = include_str!("sql/truncate.sql");

const INSERT_AUTHOR_SQL: &str = include_str!("sql/insert_author.sql");
const INSERT_GENRE_SQL: &str = include_str!("sql/insert_genre.sql");
const INSERT_BOOK_SQL: &str = include_str!("sql/insert_book.sql");
const INSERT_COMMENT_SQL: &str = include_str!("sql/insert_comment.sql");

/// Inserts one row and returns the id the database assigned.
pub async fn insert(client: &Client, record: &TargetRecord) -> Result<TargetId, StoreError> {
    let row = match record {
        TargetRecord::Author(a) => client.query_one(INSERT_AUTHOR_SQL, &[&a.full_name]).await,
        TargetRecord::Genre(g) => client.query_one(INSERT_GENRE_SQL, &[&g.name]).await,
        TargetRecord::Book(b) => {
            client
                .query_one(INSERT_BOOK_SQL, &[&b.title, &b.author_id, &b.genre_id])
                .await
        }
        TargetRecord::Comment(c) => {
            client
                .query_one(INSERT_COMMENT_SQL, &[&c.text, &c.book_id])
                .await
        }
    }
    .map_err(|err| classify_insert_error(err, record))?;

    Ok(row.try_get::<_, i64>(0)?)
}

pub async fn find_by_natural_key(
    client: &Client,
    kind: EntityKind,
    key: &str,
) -> Result<Option<TargetId>, StoreError> {
    let column = natural_key_column(kind)?;
    let sql = format!("SELECT id FROM {} WHERE {column} = $1", kind.table());
    let row = client.query_opt(&sql, &[&key]).await?;
    Ok(row.map(|r| r.try_get::<_, i64>(0)).transpose()?)
}

pub async fn natural_keys(
    client: &Client,
    kind: EntityKind,
) -> Result<Vec<(String, TargetId)>, StoreError> {
    let column = natural_key_column(kind)?;
    let sql = format!("SELECT {column}, id FROM {} ORDER BY id", kind.table());
    client
        .query(&sql, &[])
        .await?
        .iter()
        .map(|row| -> Result<(String, TargetId), StoreError> {
            Ok((row.try_get(0)?, row.try_get(1)?))
        })
        .collect()
}

pub async fn count(client: &Client, kind: EntityKind) -> Result<u64, StoreError> {
    let sql = format!("SELECT COUNT(*) FROM {}", kind.table());
    let row = client.query_one(&sql, &[]).await?;
    Ok(row.try_get::<_, i64>(0)?.max(0) as u64)
}

pub async fn fetch_all(client: &Client, kind: EntityKind) -> Result<Vec<TargetRecord>, StoreError> {
    let columns = match kind {
        EntityKind::Author => "id, full_name",
        EntityKind::Genre => "id, name",
        EntityKind::Book => "id, title, author_id, genre_id",
        EntityKind::Comment => "id, text, book_id",
    };
    let sql = format!("SELECT {columns} FROM {} ORDER BY id", kind.table());

    client
        .query(&sql, &[])
        .await?
        .iter()
        .map(|row| decode_row(kind, row))
        .collect()
}

fn decode_row(kind: EntityKind, row: &Row) -> Result<TargetRecord, StoreError> {
    let id = Some(row.try_get::<_, i64>("id")?);
    Ok(match kind {
        EntityKind::Author => TargetRecord::Author(TargetAuthor {
            id,
            full_name: row.try_get("full_name")?,
        }),
        EntityKind::Genre => TargetRecord::Genre(TargetGenre {
            id,
            name: row.try_get("name")?,
        }),
        EntityKind::Book => TargetRecord::Book(TargetBook {
            id,
            title: row.try_get("title")?,
            author_id: row.try_get("author_id")?,
            genre_id: row.try_get("genre_id")?,
        }),
        EntityKind::Comment => TargetRecord::Comment(TargetComment {
            id,
            text: row.try_get("text")?,
            book_id: row.try_get("book_id")?,
        }),
    })
}

fn natural_key_column(kind: EntityKind) -> Result<&'static str, StoreError> {
    kind.natural_key_column()
        .ok_or_else(|| StoreError::Other(format!("{kind} has no natural key")))
}

fn classify_insert_error(err: tokio_postgres::Error, record: &TargetRecord) -> StoreError {
    match err.code() {
        Some(code) if *code == SqlState::UNIQUE_VIOLATION => match record.natural_key() {
            Some(key) => StoreError::DuplicateKey {
                kind: record.kind(),
                key: key.to_string(),
            },
            None => StoreError::Postgres(err),
        },
        Some(code) if *code == SqlState::FOREIGN_KEY_VIOLATION => StoreError::Constraint {
            kind: record.kind(),
            message: err.to_string(),
        },
        _ => StoreError::Postgres(err),
    }
}
