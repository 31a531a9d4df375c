pub mod artists;
pub mod cache_entries;
pub mod genres;
pub mod movie_artists;
pub mod movie_genres;
pub mod movie_views;
pub mod movies;
pub mod users;
pub mod votes;
