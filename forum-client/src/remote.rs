use async_trait::async_trait;

use crate::error::ForumClientResult;
use crate::models::{Comment, NewComment, NewPost, Post, PostUpdate, VoteDirection, VoteReceipt};

/// Контракт бэкенда форума.
///
/// Один вызов = один запрос и один ответ. Повторов здесь нет, а учётные
/// данные прикладывает сама реализация.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// `GET /posts`
    async fn fetch_feed(&self) -> ForumClientResult<Vec<Post>>;
    /// `GET /posts/popular`
    async fn fetch_popular(&self) -> ForumClientResult<Vec<Post>>;
    /// `GET /users/{id}/posts`
    async fn fetch_user_posts(&self, user_id: i64) -> ForumClientResult<Vec<Post>>;
    /// `GET /posts/{id}`
    async fn fetch_post(&self, id: i64) -> ForumClientResult<Post>;
    /// `GET /posts/{id}/comments`
    async fn fetch_comments(&self, post_id: i64) -> ForumClientResult<Vec<Comment>>;
    /// `POST /vote`. Передаётся итоговое направление, а не дельта.
    async fn submit_vote(
        &self,
        post_id: i64,
        direction: VoteDirection,
    ) -> ForumClientResult<VoteReceipt>;
    /// `POST /posts`
    async fn create_post(&self, input: &NewPost) -> ForumClientResult<Post>;
    /// `PUT /posts/{id}`
    async fn update_post(&self, id: i64, update: &PostUpdate) -> ForumClientResult<Post>;
    /// `DELETE /posts/{id}`
    async fn delete_post(&self, id: i64) -> ForumClientResult<()>;
    /// `POST /posts/{id}/comments`
    async fn create_comment(&self, post_id: i64, input: &NewComment)
    -> ForumClientResult<Comment>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Какой список постов показывает лента.
pub enum FeedKind {
    /// Основная лента, новые сверху.
    #[default]
    Latest,
    /// Популярные посты.
    Popular,
    /// Посты одного автора (страница профиля).
    Author(i64),
}

impl FeedKind {
    pub(crate) async fn fetch<R>(self, remote: &R) -> ForumClientResult<Vec<Post>>
    where
        R: RemoteClient + ?Sized,
    {
        match self {
            Self::Latest => remote.fetch_feed().await,
            Self::Popular => remote.fetch_popular().await,
            Self::Author(user_id) => remote.fetch_user_posts(user_id).await,
        }
    }
}
