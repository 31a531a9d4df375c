use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, FromQueryResult,
    QueryFilter, Set, TransactionTrait, Value, sea_query::OnConflict,
};
use tracing::debug;

use super::{MOVIE_COLUMNS, MovieRow, Store, attach_links, finish, placeholders, statement};
use crate::{
    entities::{artists, genres, movie_artists, movie_genres, movies},
    error::{AppError, AppResult, Violation, violation},
    models::{GenreViews, Movie, MovieRecord, SortOrder},
};

impl Store {
    /// Inserts the movie, resolving and linking every genre and artist, as
    /// one transaction.
    pub async fn create_movie(&self, movie: &MovieRecord) -> AppResult<()> {
        let now = self.now_sec();
        let txn = self.db.begin().await?;

        let result = async {
            let model = movies::ActiveModel {
                id: Set(movie.id.clone()),
                title: Set(movie.title.clone()),
                description: Set(movie.description.clone()),
                folded_title: Set(fold(&movie.title)),
                folded_description: Set(fold(&movie.description)),
                duration: Set(movie.duration),
                watch_url: Set(movie.watch_url.clone()),
                created_at: Set(now),
                updated_at: Set(now),
            };
            movies::Entity::insert(model).exec_without_returning(&txn).await?;
            link_genres_and_artists(&txn, movie).await
        }
        .await;

        finish(txn, result).await?;
        debug!(movie_id = %movie.id, "movie created");
        Ok(())
    }

    /// Rewrites the movie row and replaces (not merges) its genre and artist
    /// links, as one transaction.
    pub async fn update_movie(&self, movie: &MovieRecord) -> AppResult<()> {
        let now = self.now_sec();
        let txn = self.db.begin().await?;

        let result = async {
            let model = movies::ActiveModel {
                id: Set(movie.id.clone()),
                title: Set(movie.title.clone()),
                description: Set(movie.description.clone()),
                folded_title: Set(fold(&movie.title)),
                folded_description: Set(fold(&movie.description)),
                duration: Set(movie.duration),
                watch_url: Set(movie.watch_url.clone()),
                updated_at: Set(now),
                ..Default::default()
            };
            model.update(&txn).await.map_err(|err| match err {
                DbErr::RecordNotUpdated => AppError::NotFound("movie"),
                other => other.into(),
            })?;

            movie_genres::Entity::delete_many()
                .filter(movie_genres::Column::MovieId.eq(&movie.id))
                .exec(&txn)
                .await?;
            movie_artists::Entity::delete_many()
                .filter(movie_artists::Column::MovieId.eq(&movie.id))
                .exec(&txn)
                .await?;

            link_genres_and_artists(&txn, movie).await
        }
        .await;

        finish(txn, result).await?;
        debug!(movie_id = %movie.id, "movie updated");
        Ok(())
    }

    pub async fn find_movie_by_id(&self, id: &str) -> AppResult<Movie> {
        let sql = format!(
            "SELECT {MOVIE_COLUMNS} FROM movies m \
             LEFT JOIN movie_views mv ON mv.movie_id = m.id \
             WHERE m.id = ?"
        );
        let row = MovieRow::find_by_statement(statement(&self.db, sql, [id.into()]))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound("movie"))?;

        let mut movies = attach_links(&self.db, vec![row]).await?;
        movies.pop().ok_or(AppError::NotFound("movie"))
    }

    pub async fn get_movies_by_ids(&self, ids: &[String]) -> AppResult<Vec<Movie>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {MOVIE_COLUMNS} FROM movies m \
             LEFT JOIN movie_views mv ON mv.movie_id = m.id \
             WHERE m.id IN ({}) ORDER BY m.created_at, m.id",
            placeholders(ids.len())
        );
        let values = ids.iter().map(|id| Value::from(id.clone()));
        let rows = MovieRow::find_by_statement(statement(&self.db, sql, values)).all(&self.db).await?;
        attach_links(&self.db, rows).await
    }

    /// The movie with the highest view count, ties broken by id.
    pub async fn get_most_viewed_movie(&self) -> AppResult<Movie> {
        let sql = format!(
            "SELECT {MOVIE_COLUMNS} FROM movies m \
             JOIN movie_views mv ON mv.movie_id = m.id \
             ORDER BY mv.view_count DESC, m.id \
             LIMIT 1"
        );
        let row = MovieRow::find_by_statement(statement(&self.db, sql, []))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound("movie"))?;

        let mut movies = attach_links(&self.db, vec![row]).await?;
        movies.pop().ok_or(AppError::NotFound("movie"))
    }

    /// Views summed per genre across its movies, one page of the ranking.
    pub async fn get_most_viewed_genre(
        &self,
        page: u64,
        page_size: u64,
        order: SortOrder,
    ) -> AppResult<Vec<GenreViews>> {
        let (limit, offset) = page_window(page, page_size);
        let sql = format!(
            "SELECT g.name AS name, SUM(mv.view_count) AS total_views \
             FROM movie_genres mg \
             JOIN genres g ON g.id = mg.genre_id \
             JOIN movie_views mv ON mv.movie_id = mg.movie_id \
             GROUP BY g.id, g.name \
             ORDER BY total_views {}, g.name \
             LIMIT ? OFFSET ?",
            order.as_sql()
        );

        Ok(GenreViews::find_by_statement(statement(
            &self.db,
            sql,
            [limit.into(), offset.into()],
        ))
        .all(&self.db)
        .await?)
    }

    pub async fn get_all_movies(&self, limit: u64, offset: u64) -> AppResult<Vec<Movie>> {
        let sql = format!(
            "SELECT {MOVIE_COLUMNS} FROM movies m \
             LEFT JOIN movie_views mv ON mv.movie_id = m.id \
             ORDER BY m.created_at, m.id \
             LIMIT ? OFFSET ?"
        );
        let rows = MovieRow::find_by_statement(statement(
            &self.db,
            sql,
            [to_i64(limit).into(), to_i64(offset).into()],
        ))
        .all(&self.db)
        .await?;

        attach_links(&self.db, rows).await
    }

    /// Case-insensitive substring match on title, description, genre name
    /// or artist name. Each matching movie appears once. Both sides are
    /// folded with the same Unicode lowercasing, the stored side at write time.
    pub async fn search_movies(&self, query: &str, limit: u64, offset: u64) -> AppResult<Vec<Movie>> {
        let pattern = format!("%{}%", escape_like(&fold(query)));
        let sql = format!(
            r"SELECT DISTINCT {MOVIE_COLUMNS} FROM movies m
              LEFT JOIN movie_views mv ON mv.movie_id = m.id
              LEFT JOIN movie_genres mg ON mg.movie_id = m.id
              LEFT JOIN genres g ON g.id = mg.genre_id
              LEFT JOIN movie_artists ma ON ma.movie_id = m.id
              LEFT JOIN artists a ON a.id = ma.artist_id
              WHERE m.folded_title LIKE ? ESCAPE '\'
                 OR m.folded_description LIKE ? ESCAPE '\'
                 OR g.folded_name LIKE ? ESCAPE '\'
                 OR a.folded_name LIKE ? ESCAPE '\'
              ORDER BY m.created_at, m.id
              LIMIT ? OFFSET ?"
        );
        let values: [Value; 6] = [
            pattern.clone().into(),
            pattern.clone().into(),
            pattern.clone().into(),
            pattern.into(),
            to_i64(limit).into(),
            to_i64(offset).into(),
        ];
        let rows = MovieRow::find_by_statement(statement(&self.db, sql, values)).all(&self.db).await?;

        attach_links(&self.db, rows).await
    }

    /// Counts one view: inserts the counter at 1 or increments it in place,
    /// in a single statement.
    pub async fn track_movie_view(&self, movie_id: &str) -> AppResult<()> {
        let sql = "INSERT INTO movie_views (movie_id, view_count, last_viewed_at) VALUES (?, 1, ?) \
                   ON CONFLICT (movie_id) DO UPDATE SET \
                   view_count = view_count + 1, \
                   last_viewed_at = excluded.last_viewed_at";

        self.db
            .execute(statement(&self.db, sql, [movie_id.into(), self.now_sec().into()]))
            .await
            .map_err(|err| match violation(&err) {
                Some(Violation::ForeignKey) => AppError::NotFound("movie"),
                _ => err.into(),
            })?;
        Ok(())
    }
}

async fn link_genres_and_artists<C: ConnectionTrait>(conn: &C, movie: &MovieRecord) -> AppResult<()> {
    for name in &movie.genres {
        let genre_id = resolve_genre(conn, name).await?;
        let link = movie_genres::ActiveModel { movie_id: Set(movie.id.clone()), genre_id: Set(genre_id) };
        movie_genres::Entity::insert(link)
            .on_conflict(
                OnConflict::columns([movie_genres::Column::MovieId, movie_genres::Column::GenreId])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
    }

    for artist in &movie.artists {
        let artist_id = resolve_artist(conn, &artist.id, &artist.name).await?;
        let link =
            movie_artists::ActiveModel { movie_id: Set(movie.id.clone()), artist_id: Set(artist_id) };
        movie_artists::Entity::insert(link)
            .on_conflict(
                OnConflict::columns([
                    movie_artists::Column::MovieId,
                    movie_artists::Column::ArtistId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
    }

    Ok(())
}

async fn resolve_genre<C: ConnectionTrait>(conn: &C, name: &str) -> AppResult<i32> {
    if let Some(genre) =
        genres::Entity::find().filter(genres::Column::Name.eq(name)).one(conn).await?
    {
        return Ok(genre.id);
    }

    let model = genres::ActiveModel {
        name: Set(name.to_string()),
        folded_name: Set(fold(name)),
        ..Default::default()
    };
    Ok(genres::Entity::insert(model).exec(conn).await?.last_insert_id)
}

/// Reuses the artist with this name if there is one; otherwise stores the
/// artist under `id`.
async fn resolve_artist<C: ConnectionTrait>(conn: &C, id: &str, name: &str) -> AppResult<String> {
    if let Some(artist) =
        artists::Entity::find().filter(artists::Column::Name.eq(name)).one(conn).await?
    {
        return Ok(artist.id);
    }

    let model = artists::ActiveModel {
        id: Set(id.to_string()),
        name: Set(name.to_string()),
        folded_name: Set(fold(name)),
    };
    artists::Entity::insert(model).exec_without_returning(conn).await?;
    Ok(id.to_string())
}

fn page_window(page: u64, page_size: u64) -> (i64, i64) {
    let page = page.max(1);
    let page_size = page_size.max(1);
    (to_i64(page_size), to_i64((page - 1).saturating_mul(page_size)))
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Lowercasing shared by stored search columns and search queries. SQLite's
/// own `LOWER` and `LIKE` only fold ASCII.
fn fold(raw: &str) -> String {
    raw.to_lowercase()
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
