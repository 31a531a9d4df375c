use tracing::info;
use uuid::Uuid;

use crate::{
    cache::ListingCache,
    error::{AppError, AppResult},
    models::{Artist, GenreViews, Movie, MovieInput, MovieRecord, SortOrder},
    store::Store,
};

const DEFAULT_PAGE_SIZE: u64 = 10;

#[derive(Clone)]
pub struct MovieService {
    store: Store,
    listing: ListingCache,
}

impl MovieService {
    pub fn new(store: Store, listing: ListingCache) -> Self {
        Self { store, listing }
    }

    pub async fn create_movie(&self, input: MovieInput) -> AppResult<Movie> {
        let record = into_record(Uuid::new_v4().to_string(), input)?;
        self.store.create_movie(&record).await?;
        info!(movie_id = %record.id, title = %record.title, "movie created");
        self.store.find_movie_by_id(&record.id).await
    }

    /// Full replacement of the movie's fields and its genre/artist links.
    pub async fn update_movie(&self, id: &str, input: MovieInput) -> AppResult<Movie> {
        self.store.find_movie_by_id(id).await?;

        let record = into_record(id.to_string(), input)?;
        self.store.update_movie(&record).await?;
        info!(movie_id = %id, "movie updated");
        self.store.find_movie_by_id(id).await
    }

    pub async fn get_most_viewed_movie(&self) -> AppResult<Movie> {
        self.store.get_most_viewed_movie().await
    }

    pub async fn get_most_viewed_genre(
        &self,
        page: u64,
        page_size: u64,
        sort_order: &str,
    ) -> AppResult<Vec<GenreViews>> {
        self.store
            .get_most_viewed_genre(page, page_size, SortOrder::parse_or_default(sort_order))
            .await
    }

    pub async fn get_all_movies(&self, limit: u64, offset: u64) -> AppResult<Vec<Movie>> {
        self.store.get_all_movies(page_size(limit), offset).await
    }

    pub async fn get_all_movies_from_cache(&self, limit: u64, offset: u64) -> AppResult<Vec<Movie>> {
        self.listing.get_all_movies(page_size(limit), offset).await
    }

    pub async fn search_movies(&self, query: &str, limit: u64, offset: u64) -> AppResult<Vec<Movie>> {
        self.store.search_movies(query.trim(), page_size(limit), offset).await
    }

    /// Every call counts; retrying after a failure may count twice.
    pub async fn track_movie_view(&self, movie_id: &str) -> AppResult<()> {
        self.store.track_movie_view(movie_id).await
    }
}

fn page_size(limit: u64) -> u64 {
    if limit == 0 { DEFAULT_PAGE_SIZE } else { limit }
}

/// Validates the input and assigns fresh ids to its artists.
fn into_record(id: String, input: MovieInput) -> AppResult<MovieRecord> {
    if input.artists.is_empty() {
        return Err(AppError::NoArtist);
    }
    if input.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".into()));
    }
    if input.duration <= 0 {
        return Err(AppError::Validation("duration must be positive".into()));
    }
    if input.genres.is_empty() {
        return Err(AppError::Validation("at least one genre is required".into()));
    }
    if input.genres.iter().any(|g| g.trim().is_empty()) {
        return Err(AppError::Validation("genre names must not be blank".into()));
    }
    if input.artists.iter().any(|a| a.trim().is_empty()) {
        return Err(AppError::Validation("artist names must not be blank".into()));
    }

    Ok(MovieRecord {
        id,
        title: input.title.trim().to_string(),
        description: input.description,
        duration: input.duration,
        watch_url: input.watch_url,
        genres: input.genres.iter().map(|g| g.trim().to_string()).collect(),
        artists: input
            .artists
            .iter()
            .map(|name| Artist { id: Uuid::new_v4().to_string(), name: name.trim().to_string() })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use jiff::SignedDuration;

    use super::*;
    use crate::{cache::SqliteCache, clock::ManualClock, testing};

    async fn service() -> (MovieService, Store, ManualClock) {
        let (store, clock) = testing::store().await;
        let cache = SqliteCache::new(store.db().clone(), Arc::new(clock.clone()));
        let listing =
            ListingCache::new(store.clone(), Arc::new(cache), SignedDuration::from_mins(10));
        (MovieService::new(store.clone(), listing), store, clock)
    }

    fn input(title: &str, genres: &[&str], artists: &[&str]) -> MovieInput {
        MovieInput {
            title: title.to_string(),
            description: format!("About {title}"),
            duration: 148,
            watch_url: "https://watch.example/x".to_string(),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            artists: artists.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn creates_movie_with_generated_ids() {
        let (movies, _store, _clock) = service().await;
        let movie = movies
            .create_movie(input("Inception", &["Sci-Fi", "Action"], &["Leonardo DiCaprio"]))
            .await
            .unwrap();

        assert!(Uuid::parse_str(&movie.id).is_ok());
        assert_eq!(movie.views, 0);
        let genres: Vec<_> = movie.genres.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(genres, ["Action", "Sci-Fi"]);
        assert_eq!(movie.artists.len(), 1);
        assert!(Uuid::parse_str(&movie.artists[0].id).is_ok());
    }

    #[tokio::test]
    async fn movie_without_artists_is_rejected_before_any_write() {
        let (movies, store, _clock) = service().await;
        let err = movies.create_movie(input("Silent", &["Drama"], &[])).await.unwrap_err();
        assert!(matches!(err, AppError::NoArtist));
        assert!(store.get_all_movies(10, 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_fields_are_validation_errors() {
        let (movies, _store, _clock) = service().await;
        for bad in [
            input(" ", &["Drama"], &["Ann"]),
            input("Heat", &[], &["Ann"]),
            input("Heat", &["  "], &["Ann"]),
            input("Heat", &["Drama"], &[""]),
            MovieInput { duration: 0, ..input("Heat", &["Drama"], &["Ann"]) },
        ] {
            assert!(matches!(movies.create_movie(bad).await, Err(AppError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn update_requires_existing_movie() {
        let (movies, _store, _clock) = service().await;
        let err = movies.update_movie("missing", input("Heat", &["Crime"], &["Al"])).await;
        assert!(matches!(err, Err(AppError::NotFound("movie"))));
    }

    #[tokio::test]
    async fn update_replaces_fields() {
        let (movies, _store, clock) = service().await;
        let created = movies.create_movie(input("Heat", &["Crime"], &["Al"])).await.unwrap();

        clock.advance(SignedDuration::from_secs(30));
        let updated =
            movies.update_movie(&created.id, input("Heat (1995)", &["Thriller"], &["Robert"])).await.unwrap();

        assert_eq!(updated.title, "Heat (1995)");
        assert_eq!(updated.genres[0].name, "Thriller");
        assert_eq!(updated.artists[0].name, "Robert");
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
    }

    #[tokio::test]
    async fn zero_limit_uses_default_page_size() {
        let (movies, _store, _clock) = service().await;
        for i in 0..12 {
            movies.create_movie(input(&format!("Movie {i}"), &["Drama"], &["Crew"])).await.unwrap();
        }
        assert_eq!(movies.get_all_movies(0, 0).await.unwrap().len(), 10);
        assert_eq!(movies.get_all_movies_from_cache(0, 0).await.unwrap().len(), 10);
        assert_eq!(movies.get_all_movies(5, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unknown_sort_order_means_descending() {
        let (movies, store, _clock) = service().await;
        let quiet = movies.create_movie(input("Quiet", &["Drama"], &["Ann"])).await.unwrap();
        let loud = movies.create_movie(input("Loud", &["Action"], &["Bob"])).await.unwrap();
        testing::set_views(&store, &quiet.id, 3).await;
        testing::set_views(&store, &loud.id, 9).await;

        let top = movies.get_most_viewed_genre(1, 10, "sideways").await.unwrap();
        assert_eq!(top[0].name, "Action");
        let bottom = movies.get_most_viewed_genre(1, 10, "ASC").await.unwrap();
        assert_eq!(bottom[0].name, "Drama");
    }

    #[tokio::test]
    async fn views_feed_most_viewed_movie() {
        let (movies, _store, _clock) = service().await;
        let a = movies.create_movie(input("A", &["Drama"], &["Crew"])).await.unwrap();
        let b = movies.create_movie(input("B", &["Drama"], &["Crew"])).await.unwrap();

        movies.track_movie_view(&a.id).await.unwrap();
        movies.track_movie_view(&b.id).await.unwrap();
        movies.track_movie_view(&b.id).await.unwrap();

        let top = movies.get_most_viewed_movie().await.unwrap();
        assert_eq!(top.id, b.id);
        assert_eq!(top.views, 2);
    }
}
