use sea_orm::{
    ActiveValue::Set, ColumnTrait, EntityTrait, FromQueryResult, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use super::{Store, statement};
use crate::{
    entities::{movies, votes},
    error::{AppError, AppResult, Violation, violation},
    models::{Vote, timestamp},
};

#[derive(Debug, FromQueryResult)]
struct VoteTally {
    movie_id: String,
    votes: i64,
}

impl From<votes::Model> for Vote {
    fn from(model: votes::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            movie_id: model.movie_id,
            created_at: timestamp(model.created_at),
        }
    }
}

impl Store {
    pub async fn get_vote_by_user_and_movie(
        &self,
        user_id: &str,
        movie_id: &str,
    ) -> AppResult<Option<Vote>> {
        let vote = votes::Entity::find()
            .filter(votes::Column::UserId.eq(user_id))
            .filter(votes::Column::MovieId.eq(movie_id))
            .one(&self.db)
            .await?;
        Ok(vote.map(Vote::from))
    }

    /// The unique (user, movie) index turns a lost check-then-insert race
    /// into `AlreadyVoted` instead of a second row.
    pub async fn create_vote(&self, user_id: &str, movie_id: &str) -> AppResult<Vote> {
        let vote = Vote {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            movie_id: movie_id.to_string(),
            created_at: timestamp(self.now_sec()),
        };
        let model = votes::ActiveModel {
            id: Set(vote.id.clone()),
            user_id: Set(vote.user_id.clone()),
            movie_id: Set(vote.movie_id.clone()),
            created_at: Set(vote.created_at.as_second()),
        };

        let Err(err) = votes::Entity::insert(model).exec_without_returning(&self.db).await else {
            return Ok(vote);
        };
        match violation(&err) {
            Some(Violation::Unique) => Err(AppError::AlreadyVoted),
            Some(Violation::ForeignKey) => Err(self.missing_vote_parent(movie_id).await),
            None => Err(err.into()),
        }
    }

    /// Names the parent a vote insert failed to reference: the movie if it
    /// is gone, otherwise the user.
    async fn missing_vote_parent(&self, movie_id: &str) -> AppError {
        match movies::Entity::find_by_id(movie_id.to_string()).one(&self.db).await {
            Ok(Some(_)) => AppError::NotFound("user"),
            Ok(None) => AppError::NotFound("movie"),
            Err(err) => err.into(),
        }
    }

    pub async fn delete_vote(&self, vote_id: &str) -> AppResult<()> {
        let res = votes::Entity::delete_by_id(vote_id.to_string()).exec(&self.db).await?;
        if res.rows_affected == 0 {
            return Err(AppError::NotFound("vote"));
        }
        Ok(())
    }

    /// Movie ids the user voted for, oldest vote first.
    pub async fn get_user_voted_movie_ids(&self, user_id: &str) -> AppResult<Vec<String>> {
        Ok(votes::Entity::find()
            .select_only()
            .column(votes::Column::MovieId)
            .filter(votes::Column::UserId.eq(user_id))
            .order_by_asc(votes::Column::CreatedAt)
            .order_by_asc(votes::Column::Id)
            .into_tuple::<String>()
            .all(&self.db)
            .await?)
    }

    /// Movie id with the most votes and its total, ties broken by id.
    pub async fn get_most_voted_movie_id(&self) -> AppResult<Option<(String, i64)>> {
        let sql = "SELECT movie_id, COUNT(*) AS votes FROM votes \
                   GROUP BY movie_id ORDER BY votes DESC, movie_id LIMIT 1";
        let tally =
            VoteTally::find_by_statement(statement(&self.db, sql, [])).one(&self.db).await?;
        Ok(tally.map(|t| (t.movie_id, t.votes)))
    }
}
