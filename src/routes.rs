use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    AppState,
    auth::{AdminUser, AuthUser},
    error::{AppError, AppResult},
    models::{ApiResponse, GenreViews, Movie, MovieInput, MovieVotes, User},
    users::Session,
};

type Reply<T> = AppResult<(StatusCode, Json<ApiResponse<T>>)>;

fn reply<T: Serialize>(status: StatusCode, message: &str, data: T) -> Reply<T> {
    Ok((status, Json(ApiResponse::success(status, message, Some(data)))))
}

fn done(message: &str) -> Reply<()> {
    Ok((StatusCode::OK, Json(ApiResponse::success(StatusCode::OK, message, None))))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload.map(|Json(v)| v).map_err(|err| AppError::Validation(err.body_text()))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    params.map(|Query(v)| v).map_err(|err| AppError::Validation(err.body_text()))
}

pub fn router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    let public = Router::new()
        .route("/user/register", post(register))
        .route("/user/login", post(login))
        .route("/movies", get(list_movies))
        .route("/movies/search", get(search_movies))
        .route("/movies/{id}/view", post(track_view));

    let user = Router::new()
        .route("/user/logout", post(logout))
        .route("/user/movies/{id}/vote", post(vote))
        .route("/user/movies/{id}/unvote", post(unvote))
        .route("/user/votes", get(voted_movies));

    let admin = Router::new()
        .route("/admin/movie", post(create_movie))
        .route("/admin/movie/{id}", post(update_movie))
        .route("/admin/movies/most-viewed", get(most_viewed_movie))
        .route("/admin/movies/most-viewed-genres", get(most_viewed_genres))
        .route("/admin/movies/most-voted", get(most_voted_movie));

    let api = Router::new().nest("/api", public.merge(user).merge(admin)).with_state(state);
    with_middleware(api, request_timeout)
}

/// Requests still running after `request_timeout` are dropped and answered
/// with 408.
fn with_middleware(router: Router, request_timeout: Duration) -> Router {
    router
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Reply<User> {
    let creds = body(payload)?;
    let user = state.users.register(&creds.username, &creds.password).await?;
    reply(StatusCode::CREATED, "user registered successfully", user)
}

async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Reply<Session> {
    let creds = body(payload)?;
    let session = state.users.login(&creds.username, &creds.password).await?;
    reply(StatusCode::OK, "login successful", session)
}

async fn logout(State(state): State<Arc<AppState>>, AuthUser(claims): AuthUser) -> Reply<()> {
    state.users.logout(&claims).await?;
    done("logout successful")
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListParams {
    limit: u64,
    offset: u64,
    #[serde(rename = "use-cache")]
    use_cache: bool,
}

async fn list_movies(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Reply<Vec<Movie>> {
    let params = query(params)?;
    let movies = if params.use_cache {
        state.movies.get_all_movies_from_cache(params.limit, params.offset).await?
    } else {
        state.movies.get_all_movies(params.limit, params.offset).await?
    };
    reply(StatusCode::OK, "movies fetched successfully", movies)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchParams {
    query: String,
    limit: u64,
    offset: u64,
}

async fn search_movies(
    State(state): State<Arc<AppState>>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Reply<Vec<Movie>> {
    let params = query(params)?;
    let movies = state.movies.search_movies(&params.query, params.limit, params.offset).await?;
    reply(StatusCode::OK, "movies fetched successfully", movies)
}

async fn track_view(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Reply<()> {
    state.movies.track_movie_view(&id).await?;
    done("movie view tracked successfully")
}

async fn vote(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> Reply<()> {
    state.votes.vote(&claims.user_id, &id).await?;
    done("vote successful")
}

async fn unvote(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
    Path(id): Path<String>,
) -> Reply<()> {
    state.votes.unvote(&claims.user_id, &id).await?;
    done("unvote successful")
}

async fn voted_movies(
    State(state): State<Arc<AppState>>,
    AuthUser(claims): AuthUser,
) -> Reply<Vec<Movie>> {
    let movies = state.votes.list_voted_movies(&claims.user_id).await?;
    reply(StatusCode::OK, "voted movies fetched successfully", movies)
}

async fn create_movie(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    payload: Result<Json<MovieInput>, JsonRejection>,
) -> Reply<Movie> {
    let movie = state.movies.create_movie(body(payload)?).await?;
    reply(StatusCode::CREATED, "movie created successfully", movie)
}

async fn update_movie(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<String>,
    payload: Result<Json<MovieInput>, JsonRejection>,
) -> Reply<Movie> {
    let movie = state.movies.update_movie(&id, body(payload)?).await?;
    reply(StatusCode::OK, "movie updated successfully", movie)
}

async fn most_viewed_movie(State(state): State<Arc<AppState>>, _admin: AdminUser) -> Reply<Movie> {
    let movie = state.movies.get_most_viewed_movie().await?;
    reply(StatusCode::OK, "most viewed movie fetched successfully", movie)
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GenreParams {
    page: u64,
    page_size: u64,
    sort_order: String,
}

impl Default for GenreParams {
    fn default() -> Self {
        Self { page: 1, page_size: 10, sort_order: "DESC".to_string() }
    }
}

async fn most_viewed_genres(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    params: Result<Query<GenreParams>, QueryRejection>,
) -> Reply<Vec<GenreViews>> {
    let params = query(params)?;
    let genres = state
        .movies
        .get_most_viewed_genre(params.page, params.page_size, &params.sort_order)
        .await?;
    reply(StatusCode::OK, "most viewed genres fetched successfully", genres)
}

async fn most_voted_movie(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Reply<MovieVotes> {
    let top = state.votes.most_voted_movie().await?;
    reply(StatusCode::OK, "most voted movie fetched successfully", top)
}
