//! Страница одного поста: сам пост, его голос и комментарии.
//!
//! Голос здесь независим от голоса в ленте. Новый счёт после голосования
//! вызывающий код сам переносит в ленту через `FeedStore::patch_score`.

use tracing::{debug, info, warn};

use crate::error::{ForumClientError, ForumClientResult};
use crate::models::{Comment, NewComment, Post, PostPatch, VoteDirection, VoteReceipt};
use crate::remote::RemoteClient;
use crate::session::SessionContext;
use crate::vote::{VoteEngine, VoteOutcome, VoteTicket};

#[derive(Debug, Clone)]
/// Открытый пост с комментариями.
pub struct PostDetail {
    post: Post,
    vote: VoteEngine,
    comments: Vec<Comment>,
}

impl PostDetail {
    /// Пост. Поле `score` хранит последний серверный счёт.
    pub fn post(&self) -> &Post {
        &self.post
    }

    /// Состояние голоса.
    pub fn vote(&self) -> &VoteEngine {
        &self.vote
    }

    /// Комментарии, новые сверху.
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// Счёт для отображения.
    pub fn displayed_score(&self) -> i64 {
        self.vote.displayed_score()
    }

    /// Направление голоса пользователя.
    pub fn direction(&self) -> VoteDirection {
        self.vote.direction()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Квитанция на загрузку поста.
pub struct DetailLoadTicket {
    post_id: i64,
    load_seq: u64,
    view_generation: u64,
}

impl DetailLoadTicket {
    /// Загружаемый пост.
    pub fn post_id(&self) -> i64 {
        self.post_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Квитанция на голос, выданный на странице поста.
pub struct DetailVoteTicket {
    vote: VoteTicket,
    view_generation: u64,
}

impl DetailVoteTicket {
    /// Пост.
    pub fn post_id(&self) -> i64 {
        self.vote.post_id()
    }

    /// Итоговое направление для отправки на сервер.
    pub fn direction(&self) -> VoteDirection {
        self.vote.direction()
    }
}

#[derive(Debug, Clone, Default)]
/// Синхронизация страницы поста с сервером.
pub struct DetailSync {
    detail: Option<PostDetail>,
    load_seq: u64,
    view_generation: u64,
}

impl DetailSync {
    /// Закрытая страница.
    pub fn new() -> Self {
        Self::default()
    }

    /// Открытый пост, если есть.
    pub fn detail(&self) -> Option<&PostDetail> {
        self.detail.as_ref()
    }

    /// Открыт ли какой-нибудь пост.
    pub fn is_open(&self) -> bool {
        self.detail.is_some()
    }

    /// Закрывает страницу. Ответы на запросы, отправленные до закрытия,
    /// будут отброшены.
    pub fn close(&mut self) {
        if let Some(detail) = self.detail.take() {
            debug!(post_id = detail.post.id, "detail view closed");
        }
        self.view_generation += 1;
    }

    fn open_post_id(&self) -> Option<i64> {
        self.detail.as_ref().map(|detail| detail.post.id)
    }

    /// Начинает загрузку поста.
    ///
    /// Переход на другой пост сразу закрывает текущий.
    pub fn begin_load(&mut self, post_id: i64) -> DetailLoadTicket {
        if self.open_post_id().is_some_and(|open| open != post_id) {
            self.close();
        }
        self.load_seq += 1;
        DetailLoadTicket {
            post_id,
            load_seq: self.load_seq,
            view_generation: self.view_generation,
        }
    }

    /// Применяет результаты загрузки.
    ///
    /// `Ok(None)` означает, что ответ устарел (была более новая загрузка или
    /// страницу закрыли) и ничего не изменилось. `NotFound` для поста
    /// закрывает страницу: вызывающий должен уйти с неё.
    pub fn finish_load(
        &mut self,
        ticket: DetailLoadTicket,
        post: ForumClientResult<Post>,
        comments: ForumClientResult<Vec<Comment>>,
    ) -> ForumClientResult<Option<&PostDetail>> {
        if ticket.load_seq != self.load_seq || ticket.view_generation != self.view_generation {
            warn!(post_id = ticket.post_id, "stale detail load discarded");
            return Ok(None);
        }
        self.install(ticket.post_id, post, comments).map(Some)
    }

    fn install(
        &mut self,
        post_id: i64,
        post: ForumClientResult<Post>,
        comments: ForumClientResult<Vec<Comment>>,
    ) -> ForumClientResult<&PostDetail> {
        let post = match post {
            Ok(post) => post,
            Err(ForumClientError::NotFound) => {
                info!(post_id, "post not found, closing detail view");
                self.close();
                return Err(ForumClientError::NotFound);
            }
            Err(err) => {
                warn!(post_id, error = %err, "post load failed");
                return Err(err);
            }
        };

        let previous = self.detail.take().filter(|detail| detail.post.id == post.id);
        let comments = match comments {
            Ok(comments) => comments,
            Err(err) => {
                warn!(post_id, error = %err, "comments load failed, showing post without them");
                previous
                    .as_ref()
                    .map(|detail| detail.comments.clone())
                    .unwrap_or_default()
            }
        };

        let vote = match previous {
            Some(mut detail) => {
                detail.vote.rebase(post.score);
                detail.vote
            }
            None => VoteEngine::new(post.id, post.score),
        };

        Ok(&*self.detail.insert(PostDetail {
            post,
            vote,
            comments,
        }))
    }

    /// Загружает пост и его комментарии.
    pub async fn load<R>(&mut self, remote: &R, post_id: i64) -> ForumClientResult<&PostDetail>
    where
        R: RemoteClient + ?Sized,
    {
        self.begin_load(post_id);
        let post = remote.fetch_post(post_id).await;
        let comments = match &post {
            Ok(_) => remote.fetch_comments(post_id).await,
            Err(_) => Ok(Vec::new()),
        };
        self.install(post_id, post, comments)
    }

    /// Добавляет комментарий в начало списка.
    ///
    /// Комментарий к другому посту или к закрытой странице отбрасывается.
    pub fn append_comment(&mut self, comment: Comment) -> bool {
        match self.detail.as_mut() {
            Some(detail) if detail.post.id == comment.post_id => {
                detail.comments.insert(0, comment);
                true
            }
            _ => {
                debug!(post_id = comment.post_id, "comment for a closed view dropped");
                false
            }
        }
    }

    /// Восстанавливает известное направление голоса. Не трогает голос в полёте.
    pub fn restore_direction(&mut self, direction: VoteDirection) -> bool {
        match self.detail.as_mut() {
            Some(detail) if !detail.vote.is_pending() => {
                detail.vote =
                    VoteEngine::with_direction(detail.post.id, detail.post.score, direction);
                true
            }
            _ => false,
        }
    }

    /// Отправляет комментарий к открытому посту.
    pub async fn submit_comment<R>(
        &mut self,
        session: &SessionContext,
        remote: &R,
        input: &NewComment,
    ) -> ForumClientResult<Comment>
    where
        R: RemoteClient + ?Sized,
    {
        let user = session.require_user()?.clone();
        let post_id = self.open_post_id().ok_or(ForumClientError::NotFound)?;
        let input = input.normalized()?;

        let mut comment = remote.create_comment(post_id, &input).await?;
        if comment.author_name.is_empty() {
            comment.author_name = user.username;
        }
        if comment.author_id == 0 {
            comment.author_id = user.id;
        }

        info!(post_id, comment_id = comment.id, "comment created");
        self.append_comment(comment.clone());
        Ok(comment)
    }

    /// Оптимистично применяет голос к открытому посту.
    pub fn begin_vote(
        &mut self,
        session: &SessionContext,
        direction: VoteDirection,
    ) -> ForumClientResult<Option<DetailVoteTicket>> {
        session.require_user()?;
        let view_generation = self.view_generation;
        let detail = self.detail.as_mut().ok_or(ForumClientError::NotFound)?;
        let ticket = detail.vote.begin(session, direction)?;
        Ok(ticket.map(|vote| DetailVoteTicket {
            vote,
            view_generation,
        }))
    }

    /// Сверяет голос с ответом сервера. Ответ для закрытой страницы
    /// отбрасывается.
    pub fn complete_vote(
        &mut self,
        ticket: DetailVoteTicket,
        result: ForumClientResult<VoteReceipt>,
    ) -> ForumClientResult<VoteOutcome> {
        let detail = match self.detail.as_mut() {
            Some(detail) if ticket.view_generation == self.view_generation => detail,
            _ => {
                warn!(post_id = ticket.post_id(), "vote response for a closed view discarded");
                return Ok(VoteOutcome::Discarded);
            }
        };
        let outcome = detail.vote.complete(ticket.vote, result);
        detail.post.score = detail.vote.server_score();
        outcome
    }

    /// Полный цикл голоса за открытый пост.
    pub async fn vote<R>(
        &mut self,
        session: &SessionContext,
        remote: &R,
        direction: VoteDirection,
    ) -> ForumClientResult<VoteOutcome>
    where
        R: RemoteClient + ?Sized,
    {
        let Some(ticket) = self.begin_vote(session, direction)? else {
            return Ok(VoteOutcome::Ignored);
        };
        let result = remote.submit_vote(ticket.post_id(), ticket.direction()).await;
        self.complete_vote(ticket, result)
    }

    /// Редактирует открытый пост. Доступно только автору.
    pub async fn edit_post<R>(
        &mut self,
        session: &SessionContext,
        remote: &R,
        patch: &PostPatch,
    ) -> ForumClientResult<Post>
    where
        R: RemoteClient + ?Sized,
    {
        session.require_user()?;
        let detail = self.detail.as_ref().ok_or(ForumClientError::NotFound)?;
        session.require_owner(detail.post.author_id)?;
        let post_id = detail.post.id;
        let update = patch.resolve(&detail.post).normalized()?;

        let updated = remote.update_post(post_id, &update).await?;
        let detail = self.detail.as_mut().ok_or(ForumClientError::NotFound)?;
        detail.post.title = updated.title;
        detail.post.body = updated.body;

        info!(post_id, "post updated from detail view");
        Ok(detail.post.clone())
    }

    /// Удаляет открытый пост и закрывает страницу. Доступно только автору.
    ///
    /// Возвращает id удалённого поста, чтобы вызывающий убрал его из лент.
    pub async fn delete_post<R>(
        &mut self,
        session: &SessionContext,
        remote: &R,
    ) -> ForumClientResult<i64>
    where
        R: RemoteClient + ?Sized,
    {
        session.require_user()?;
        let detail = self.detail.as_ref().ok_or(ForumClientError::NotFound)?;
        session.require_owner(detail.post.author_id)?;
        let post_id = detail.post.id;

        match remote.delete_post(post_id).await {
            Ok(()) => {
                info!(post_id, "post deleted from detail view");
                self.close();
                Ok(post_id)
            }
            Err(ForumClientError::NotFound) => {
                self.close();
                Err(ForumClientError::NotFound)
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionUser;
    use crate::test_support::{FakeRemote, sample_comment, sample_post};

    fn session_for(id: i64) -> SessionContext {
        SessionContext::signed_in(SessionUser {
            id,
            username: format!("user{id}"),
        })
    }

    fn remote_with_post() -> FakeRemote {
        let remote = FakeRemote::with_posts(vec![sample_post(1, 5, 1), sample_post(2, 0, 9)]);
        remote.set_comments(vec![sample_comment(10, 1), sample_comment(11, 2)]);
        remote
    }

    #[tokio::test]
    async fn load_fetches_post_and_its_comments() {
        let remote = remote_with_post();
        let mut sync = DetailSync::new();

        let detail = sync.load(&remote, 1).await.expect("load");

        assert_eq!(detail.post().id, 1);
        assert_eq!(detail.displayed_score(), 5);
        assert_eq!(detail.comments().len(), 1);
        assert_eq!(detail.comments()[0].id, 10);
    }

    #[tokio::test]
    async fn missing_post_closes_the_view() {
        let remote = remote_with_post();
        let mut sync = DetailSync::new();
        sync.load(&remote, 1).await.expect("load");

        let err = sync.load(&remote, 404).await.expect_err("missing post");

        assert_eq!(err, ForumClientError::NotFound);
        assert!(!sync.is_open());
        assert!(!remote.calls().contains(&"fetch_comments:404".to_string()));
    }

    #[tokio::test]
    async fn comments_failure_is_not_terminal() {
        let remote = remote_with_post();
        remote.fail_comments_with(ForumClientError::Transient("reset".to_string()));
        let mut sync = DetailSync::new();

        let detail = sync.load(&remote, 1).await.expect("post still shown");
        assert!(detail.comments().is_empty());
    }

    #[tokio::test]
    async fn transient_reload_failure_keeps_open_post() {
        let remote = remote_with_post();
        let mut sync = DetailSync::new();
        sync.load(&remote, 1).await.expect("load");

        remote.fail_with(ForumClientError::Transient("offline".to_string()));
        sync.load(&remote, 1).await.expect_err("reload fails");

        assert_eq!(sync.detail().expect("still open").post().id, 1);
    }

    #[tokio::test]
    async fn stale_load_is_discarded() {
        let remote = remote_with_post();
        let mut sync = DetailSync::new();

        let first = sync.begin_load(1);
        let second = sync.begin_load(2);

        let post2 = remote.fetch_post(2).await;
        let comments2 = remote.fetch_comments(2).await;
        sync.finish_load(second, post2, comments2)
            .expect("second load")
            .expect("applied");

        let post1 = remote.fetch_post(1).await;
        let comments1 = remote.fetch_comments(1).await;
        let late = sync.finish_load(first, post1, comments1).expect("no error");

        assert!(late.is_none());
        assert_eq!(sync.detail().expect("open").post().id, 2);
    }

    #[tokio::test]
    async fn load_after_close_is_discarded() {
        let remote = remote_with_post();
        let mut sync = DetailSync::new();

        let ticket = sync.begin_load(1);
        sync.close();
        let post = remote.fetch_post(1).await;
        let outcome = sync
            .finish_load(ticket, post, Ok(Vec::new()))
            .expect("no error");

        assert!(outcome.is_none());
        assert!(!sync.is_open());
    }

    #[test]
    fn append_comment_prepends_and_keeps_score() {
        let mut sync = DetailSync::new();
        let ticket = sync.begin_load(1);
        sync.finish_load(
            ticket,
            Ok(sample_post(1, 5, 1)),
            Ok(vec![sample_comment(10, 1)]),
        )
        .expect("load");

        assert!(sync.append_comment(sample_comment(11, 1)));
        assert!(!sync.append_comment(sample_comment(12, 2)));

        let detail = sync.detail().expect("open");
        let ids: Vec<i64> = detail.comments().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![11, 10]);
        assert_eq!(detail.displayed_score(), 5);
    }

    #[tokio::test]
    async fn submit_comment_requires_session_and_fills_author() {
        let remote = remote_with_post();
        let mut sync = DetailSync::new();
        sync.load(&remote, 1).await.expect("load");

        let err = sync
            .submit_comment(&SessionContext::anonymous(), &remote, &NewComment::new("hi"))
            .await
            .expect_err("anonymous");
        assert_eq!(err, ForumClientError::Unauthenticated);

        let comment = sync
            .submit_comment(&session_for(1), &remote, &NewComment::new("  hi "))
            .await
            .expect("comment");
        assert_eq!(comment.body, "hi");
        assert_eq!(comment.author_name, "user1");
        assert_eq!(sync.detail().expect("open").comments()[0].id, comment.id);
    }

    #[tokio::test]
    async fn vote_response_after_close_is_discarded() {
        let remote = remote_with_post();
        let mut sync = DetailSync::new();
        sync.load(&remote, 1).await.expect("load");

        let ticket = sync
            .begin_vote(&session_for(3), VoteDirection::Up)
            .expect("begin")
            .expect("ticket");
        sync.close();
        sync.load(&remote, 1).await.expect("reopen");

        let result = remote.submit_vote(ticket.post_id(), ticket.direction()).await;
        let outcome = sync.complete_vote(ticket, result).expect("discard");

        assert_eq!(outcome, VoteOutcome::Discarded);
        assert_eq!(sync.detail().expect("open").displayed_score(), 5);
    }

    #[tokio::test]
    async fn reload_of_same_post_keeps_pending_vote() {
        let remote = remote_with_post();
        let mut sync = DetailSync::new();
        sync.load(&remote, 1).await.expect("load");

        let ticket = sync
            .begin_vote(&session_for(3), VoteDirection::Down)
            .expect("begin")
            .expect("ticket");

        remote.set_posts(vec![sample_post(1, 7, 1)]);
        sync.load(&remote, 1).await.expect("reload");
        assert_eq!(sync.detail().expect("open").displayed_score(), 6);

        let outcome = sync
            .complete_vote(ticket, Ok(VoteReceipt { score: Some(6) }))
            .expect("commit");
        assert_eq!(outcome.committed_score(), Some(6));
        assert_eq!(sync.detail().expect("open").post().score, 6);
    }

    #[tokio::test]
    async fn vote_reports_committed_score_for_feed_propagation() {
        let remote = remote_with_post();
        remote.set_vote_reply(Ok(VoteReceipt { score: Some(6) }));
        let mut sync = DetailSync::new();
        sync.load(&remote, 1).await.expect("load");

        let outcome = sync
            .vote(&session_for(3), &remote, VoteDirection::Up)
            .await
            .expect("vote");

        assert_eq!(outcome.committed_score(), Some(6));
        assert_eq!(remote.recorded_votes(), vec![(1, VoteDirection::Up)]);
    }

    #[tokio::test]
    async fn restored_direction_allows_undo() {
        let remote = remote_with_post();
        let mut sync = DetailSync::new();
        sync.load(&remote, 1).await.expect("load");

        assert!(sync.restore_direction(VoteDirection::Up));
        sync.vote(&session_for(3), &remote, VoteDirection::Up)
            .await
            .expect("undo");

        let detail = sync.detail().expect("open");
        assert_eq!(detail.displayed_score(), 4);
        assert_eq!(detail.direction(), VoteDirection::None);
        assert_eq!(remote.recorded_votes(), vec![(1, VoteDirection::None)]);
    }

    #[tokio::test]
    async fn delete_by_non_owner_is_forbidden() {
        let remote = remote_with_post();
        let mut sync = DetailSync::new();
        sync.load(&remote, 2).await.expect("load");

        let err = sync
            .delete_post(&session_for(1), &remote)
            .await
            .expect_err("not the owner");

        assert_eq!(err, ForumClientError::Forbidden);
        assert!(sync.is_open());
        assert!(!remote.calls().contains(&"delete_post:2".to_string()));
    }

    #[tokio::test]
    async fn delete_by_owner_closes_view_and_returns_id() {
        let remote = remote_with_post();
        let mut sync = DetailSync::new();
        sync.load(&remote, 1).await.expect("load");

        let deleted = sync
            .delete_post(&session_for(1), &remote)
            .await
            .expect("owner delete");

        assert_eq!(deleted, 1);
        assert!(!sync.is_open());
    }

    #[tokio::test]
    async fn edit_by_owner_updates_open_post() {
        let remote = remote_with_post();
        let mut sync = DetailSync::new();
        sync.load(&remote, 1).await.expect("load");

        let post = sync
            .edit_post(
                &session_for(1),
                &remote,
                &PostPatch {
                    title: None,
                    body: Some("new body".to_string()),
                },
            )
            .await
            .expect("edit");

        assert_eq!(post.title, "post 1");
        assert_eq!(post.body, "new body");
        assert_eq!(sync.detail().expect("open").post().body, "new body");
    }
}
