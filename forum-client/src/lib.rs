//! Клиентское ядро форума с оптимистичным голосованием.
//!
//! Крейт не знает про UI. Он хранит локальное состояние ленты и страницы
//! поста и сверяет его с сервером:
//! - [`RemoteClient`] описывает операции сервера, [`HttpRemoteClient`] реализует их по HTTP;
//! - [`VoteEngine`] показывает голос сразу и откатывает его при ошибке сервера;
//! - [`FeedStore`] держит ленту постов, [`DetailSync`] держит открытый пост с комментариями;
//! - [`SessionContext`] передаётся в каждую операцию явно.
//!
//! Компоненты не подписаны друг на друга. Изменения переносит вызывающий код:
//!
//! ```no_run
//! use forum_client::{
//!     DetailSync, FeedKind, FeedStore, HttpClientConfig, HttpRemoteClient, SessionContext,
//!     VoteDirection,
//! };
//!
//! # async fn demo(session: SessionContext) -> Result<(), forum_client::ForumClientError> {
//! let remote = HttpRemoteClient::new(HttpClientConfig::new("http://127.0.0.1:5000"))?;
//! let mut feed = FeedStore::new(FeedKind::Latest);
//! let mut detail = DetailSync::new();
//!
//! feed.load(&remote).await?;
//! detail.load(&remote, 1).await?;
//!
//! let outcome = detail.vote(&session, &remote, VoteDirection::Up).await?;
//! if let Some(score) = outcome.committed_score() {
//!     feed.patch_score(1, score);
//! }
//! # Ok(())
//! # }
//! ```
#![warn(missing_docs)]

mod detail;
mod error;
mod feed;
mod http_client;
mod models;
mod remote;
mod session;
mod vote;

#[cfg(test)]
mod test_support;

pub use detail::{DetailLoadTicket, DetailSync, DetailVoteTicket, PostDetail};
pub use error::{ForumClientError, ForumClientResult};
pub use feed::{FeedEntry, FeedStore, FeedVoteTicket};
pub use http_client::{HttpClientConfig, HttpRemoteClient};
pub use models::{
    Comment, NewComment, NewPost, Post, PostPatch, PostUpdate, VoteDirection, VoteReceipt,
};
pub use remote::{FeedKind, RemoteClient};
pub use session::{SessionContext, SessionCredential, SessionUser};
pub use vote::{VoteEngine, VoteOutcome, VotePhase, VoteState, VoteTicket};
