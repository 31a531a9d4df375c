//! Relational store adapter.
//!
//! The only writer of persisted entities. Single-row CRUD goes through the
//! entity API; joins and aggregates are positional-parameter statements
//! decoded with `FromQueryResult`. Multi-table writes run inside one
//! transaction and are rolled back before the error is returned.

mod movies;
mod users;
mod votes;

use std::{collections::HashMap, sync::Arc};

use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, FromQueryResult, Statement, Value,
};
use tracing::warn;

use crate::{
    clock::Clock,
    error::AppResult,
    models::{Artist, Genre, Movie, timestamp},
};

#[derive(Clone)]
pub struct Store {
    db: DatabaseConnection,
    clock: Arc<dyn Clock>,
}

impl Store {
    pub fn new(db: DatabaseConnection, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    fn now_sec(&self) -> i64 {
        self.clock.now().as_second()
    }
}

/// Columns every movie listing selects; expects `movies m` and
/// `movie_views mv` in the FROM clause.
const MOVIE_COLUMNS: &str = "m.id, m.title, m.description, m.duration, m.watch_url, \
     COALESCE(mv.view_count, 0) AS views, m.created_at, m.updated_at";

#[derive(Debug, FromQueryResult)]
struct MovieRow {
    id: String,
    title: String,
    description: String,
    duration: i32,
    watch_url: String,
    views: i64,
    created_at: i64,
    updated_at: i64,
}

#[derive(Debug, FromQueryResult)]
struct GenreLink {
    movie_id: String,
    id: i32,
    name: String,
}

#[derive(Debug, FromQueryResult)]
struct ArtistLink {
    movie_id: String,
    id: String,
    name: String,
}

fn statement<C, I>(conn: &C, sql: impl Into<String>, values: I) -> Statement
where
    C: ConnectionTrait,
    I: IntoIterator<Item = Value>,
{
    Statement::from_sql_and_values(conn.get_database_backend(), sql, values)
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Fetches genres and artists for `rows` with one query per link table and
/// returns the movies in the order given.
async fn attach_links<C: ConnectionTrait>(conn: &C, rows: Vec<MovieRow>) -> AppResult<Vec<Movie>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Value> = rows.iter().map(|r| r.id.clone().into()).collect();
    let marks = placeholders(ids.len());

    let genre_sql = format!(
        "SELECT mg.movie_id, g.id, g.name FROM movie_genres mg \
         JOIN genres g ON g.id = mg.genre_id \
         WHERE mg.movie_id IN ({marks}) ORDER BY g.name"
    );
    let genre_links =
        GenreLink::find_by_statement(statement(conn, genre_sql, ids.clone())).all(conn).await?;

    let artist_sql = format!(
        "SELECT ma.movie_id, a.id, a.name FROM movie_artists ma \
         JOIN artists a ON a.id = ma.artist_id \
         WHERE ma.movie_id IN ({marks}) ORDER BY a.name"
    );
    let artist_links =
        ArtistLink::find_by_statement(statement(conn, artist_sql, ids)).all(conn).await?;

    let mut genres: HashMap<String, Vec<Genre>> = HashMap::new();
    for link in genre_links {
        genres.entry(link.movie_id).or_default().push(Genre { id: link.id, name: link.name });
    }
    let mut artists: HashMap<String, Vec<Artist>> = HashMap::new();
    for link in artist_links {
        artists.entry(link.movie_id).or_default().push(Artist { id: link.id, name: link.name });
    }

    Ok(rows
        .into_iter()
        .map(|row| Movie {
            genres: genres.remove(&row.id).unwrap_or_default(),
            artists: artists.remove(&row.id).unwrap_or_default(),
            id: row.id,
            title: row.title,
            description: row.description,
            duration: row.duration,
            watch_url: row.watch_url,
            views: row.views,
            created_at: timestamp(row.created_at),
            updated_at: timestamp(row.updated_at),
        })
        .collect())
}

/// Commits on success; otherwise rolls back and surfaces the original error.
async fn finish(txn: DatabaseTransaction, result: AppResult<()>) -> AppResult<()> {
    match result {
        Ok(()) => {
            txn.commit().await?;
            Ok(())
        },
        Err(err) => {
            if let Err(rollback) = txn.rollback().await {
                warn!(error = %rollback, "rollback failed");
            }
            Err(err)
        },
    }
}
