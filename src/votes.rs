use tracing::debug;

use crate::{
    error::{AppError, AppResult},
    models::{Movie, MovieVotes, Vote},
    store::Store,
};

/// One vote per user per movie.
#[derive(Clone)]
pub struct VoteLedger {
    store: Store,
}

impl VoteLedger {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub async fn vote(&self, user_id: &str, movie_id: &str) -> AppResult<Vote> {
        if self.store.get_vote_by_user_and_movie(user_id, movie_id).await?.is_some() {
            return Err(AppError::AlreadyVoted);
        }
        let vote = self.store.create_vote(user_id, movie_id).await?;
        debug!(%user_id, %movie_id, "vote recorded");
        Ok(vote)
    }

    pub async fn unvote(&self, user_id: &str, movie_id: &str) -> AppResult<()> {
        let vote = self
            .store
            .get_vote_by_user_and_movie(user_id, movie_id)
            .await?
            .ok_or(AppError::NotVoted)?;
        self.store.delete_vote(&vote.id).await?;
        debug!(%user_id, %movie_id, "vote withdrawn");
        Ok(())
    }

    pub async fn list_voted_movies(&self, user_id: &str) -> AppResult<Vec<Movie>> {
        let ids = self.store.get_user_voted_movie_ids(user_id).await?;
        self.store.get_movies_by_ids(&ids).await
    }

    pub async fn most_voted_movie(&self) -> AppResult<MovieVotes> {
        let (movie_id, votes) =
            self.store.get_most_voted_movie_id().await?.ok_or(AppError::NotFound("vote"))?;
        let movie = self.store.find_movie_by_id(&movie_id).await?;
        Ok(MovieVotes { movie, votes })
    }
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;

    use super::*;
    use crate::{
        error::ErrorKind,
        testing::{self, record},
    };

    #[tokio::test]
    async fn a_user_votes_once_per_movie() {
        let (store, _clock) = testing::store().await;
        let ledger = VoteLedger::new(store.clone());
        let user = testing::user(&store, "alice").await;
        let movie = record("Inception", &["Sci-Fi"], &["Leonardo"]);
        store.create_movie(&movie).await.unwrap();

        ledger.vote(&user.id, &movie.id).await.unwrap();
        let err = ledger.vote(&user.id, &movie.id).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyVoted));
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn concurrent_votes_leave_a_single_row() {
        let (store, _clock) = testing::store().await;
        let ledger = VoteLedger::new(store.clone());
        let user = testing::user(&store, "alice").await;
        let movie = record("Inception", &["Sci-Fi"], &["Leonardo"]);
        store.create_movie(&movie).await.unwrap();

        let results = join_all((0..5).map(|_| ledger.vote(&user.id, &movie.id))).await;
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().flat_map(|r| r.as_ref().err()).all(|e| matches!(e, AppError::AlreadyVoted)));
        assert_eq!(store.get_user_voted_movie_ids(&user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unvote_then_vote_again() {
        let (store, _clock) = testing::store().await;
        let ledger = VoteLedger::new(store.clone());
        let user = testing::user(&store, "alice").await;
        let movie = record("Inception", &["Sci-Fi"], &["Leonardo"]);
        store.create_movie(&movie).await.unwrap();

        let err = ledger.unvote(&user.id, &movie.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotVoted));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        ledger.vote(&user.id, &movie.id).await.unwrap();
        ledger.unvote(&user.id, &movie.id).await.unwrap();
        assert!(ledger.list_voted_movies(&user.id).await.unwrap().is_empty());
        ledger.vote(&user.id, &movie.id).await.unwrap();
    }

    #[tokio::test]
    async fn lists_full_movies_for_user() {
        let (store, _clock) = testing::store().await;
        let ledger = VoteLedger::new(store.clone());
        let alice = testing::user(&store, "alice").await;
        let bob = testing::user(&store, "bob").await;
        let movie = record("Inception", &["Sci-Fi"], &["Leonardo"]);
        store.create_movie(&movie).await.unwrap();
        ledger.vote(&alice.id, &movie.id).await.unwrap();

        let voted = ledger.list_voted_movies(&alice.id).await.unwrap();
        assert_eq!(voted.len(), 1);
        assert_eq!(voted[0].genres[0].name, "Sci-Fi");
        assert!(ledger.list_voted_movies(&bob.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn most_voted_reports_total() {
        let (store, _clock) = testing::store().await;
        let ledger = VoteLedger::new(store.clone());
        assert!(matches!(ledger.most_voted_movie().await, Err(AppError::NotFound(_))));

        let alice = testing::user(&store, "alice").await;
        let bob = testing::user(&store, "bob").await;
        let a = record("A", &["Drama"], &["Crew"]);
        let b = record("B", &["Drama"], &["Crew"]);
        store.create_movie(&a).await.unwrap();
        store.create_movie(&b).await.unwrap();
        for user in [&alice, &bob] {
            ledger.vote(&user.id, &b.id).await.unwrap();
        }
        ledger.vote(&alice.id, &a.id).await.unwrap();

        let top = ledger.most_voted_movie().await.unwrap();
        assert_eq!(top.movie.id, b.id);
        assert_eq!(top.votes, 2);
    }
}
