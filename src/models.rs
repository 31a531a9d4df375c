use std::{fmt, str::FromStr};

use axum::http::StatusCode;
use jiff::Timestamp;
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    pub id: String,
    pub title: String,
    pub description: String,
    pub duration: i32,
    pub watch_url: String,
    pub views: i64,
    pub genres: Vec<Genre>,
    pub artists: Vec<Artist>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i32,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
}

/// Fields an admin supplies to create or replace a movie.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MovieInput {
    pub title: String,
    pub description: String,
    pub duration: i32,
    pub watch_url: String,
    pub genres: Vec<String>,
    pub artists: Vec<String>,
}

/// A movie ready to be written, with every identifier resolved.
#[derive(Clone, Debug)]
pub struct MovieRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub duration: i32,
    pub watch_url: String,
    pub genres: Vec<String>,
    pub artists: Vec<Artist>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, FromQueryResult)]
pub struct GenreViews {
    pub name: String,
    pub total_views: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MovieVotes {
    pub movie: Movie,
    pub votes: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Vote {
    pub id: String,
    pub user_id: String,
    pub movie_id: String,
    pub created_at: Timestamp,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role {other:?}")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Anything other than exactly `ASC` or `DESC` falls back to descending.
    pub fn parse_or_default(raw: &str) -> Self {
        match raw {
            "ASC" => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(status: StatusCode, message: impl Into<String>, data: Option<T>) -> Self {
        Self { code: status.as_u16(), status: "success", message: message.into(), data }
    }

    pub fn fail(status: StatusCode, message: impl Into<String>) -> Self {
        Self { code: status.as_u16(), status: "fail", message: message.into(), data: None }
    }
}

pub(crate) fn timestamp(secs: i64) -> Timestamp {
    Timestamp::from_second(secs).unwrap_or(Timestamp::UNIX_EPOCH)
}
