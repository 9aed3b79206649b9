//! Лента постов с локальными голосами.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::error::{ForumClientError, ForumClientResult};
use crate::models::{NewPost, Post, PostPatch, VoteDirection, VoteReceipt};
use crate::remote::{FeedKind, RemoteClient};
use crate::session::SessionContext;
use crate::vote::{VoteEngine, VoteOutcome, VoteTicket};

#[derive(Debug, Clone)]
/// Пост в ленте вместе с состоянием голоса пользователя.
pub struct FeedEntry {
    post: Post,
    vote: VoteEngine,
    epoch: u64,
}

impl FeedEntry {
    fn new(post: Post, epoch: u64) -> Self {
        let vote = VoteEngine::new(post.id, post.score);
        Self { post, vote, epoch }
    }

    /// Пост. Поле `score` хранит последний серверный счёт.
    pub fn post(&self) -> &Post {
        &self.post
    }

    /// Состояние голоса.
    pub fn vote(&self) -> &VoteEngine {
        &self.vote
    }

    /// Счёт для отображения, с учётом голоса в полёте.
    pub fn displayed_score(&self) -> i64 {
        self.vote.displayed_score()
    }

    /// Направление голоса пользователя.
    pub fn direction(&self) -> VoteDirection {
        self.vote.direction()
    }

    fn rebase(&mut self, server_score: i64) {
        self.vote.rebase(server_score);
        self.post.score = server_score;
    }

    fn sync_score(&mut self) {
        self.post.score = self.vote.server_score();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Квитанция на голос, выданный в ленте.
///
/// Привязана к конкретной записи: если пост ушёл из ленты и вернулся,
/// старая квитанция к новой записи уже не подходит.
pub struct FeedVoteTicket {
    vote: VoteTicket,
    epoch: u64,
}

impl FeedVoteTicket {
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
/// Упорядоченная лента постов, новые сверху.
///
/// Патчи не меняют порядок, а операции над отсутствующим id ничего не делают.
pub struct FeedStore {
    kind: FeedKind,
    entries: Vec<FeedEntry>,
    next_epoch: u64,
}

impl FeedStore {
    /// Пустая лента указанного вида.
    pub fn new(kind: FeedKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
            next_epoch: 0,
        }
    }

    /// Вид ленты.
    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    /// Записи в порядке отображения.
    pub fn entries(&self) -> &[FeedEntry] {
        &self.entries
    }

    /// Запись по id поста.
    pub fn get(&self, post_id: i64) -> Option<&FeedEntry> {
        self.entries.iter().find(|entry| entry.post.id == post_id)
    }

    /// Количество постов.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Пуста ли лента.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get_mut(&mut self, post_id: i64) -> Option<&mut FeedEntry> {
        self.entries.iter_mut().find(|entry| entry.post.id == post_id)
    }

    /// Загружает ленту целиком.
    ///
    /// При ошибке предыдущий снимок остаётся нетронутым.
    pub async fn load<R>(&mut self, remote: &R) -> ForumClientResult<&[FeedEntry]>
    where
        R: RemoteClient + ?Sized,
    {
        match self.kind.fetch(remote).await {
            Ok(posts) => {
                self.apply_snapshot(posts);
                Ok(&self.entries)
            }
            Err(err) => {
                warn!(kind = ?self.kind, error = %err, "feed load failed, keeping previous snapshot");
                Err(err)
            }
        }
    }

    /// Заменяет ленту новым снимком с сервера.
    ///
    /// Посты, которые уже были в ленте, сохраняют состояние голоса; если
    /// голос ещё в полёте, его дельта ложится поверх нового счёта.
    pub fn apply_snapshot(&mut self, posts: Vec<Post>) {
        let mut previous: HashMap<i64, FeedEntry> = self
            .entries
            .drain(..)
            .map(|entry| (entry.post.id, entry))
            .collect();

        let mut carried_pending = 0usize;
        self.entries = posts
            .into_iter()
            .map(|post| match previous.remove(&post.id) {
                Some(mut entry) => {
                    if entry.vote.is_pending() {
                        carried_pending += 1;
                    }
                    let score = post.score;
                    entry.post = post;
                    entry.rebase(score);
                    entry
                }
                None => {
                    self.next_epoch += 1;
                    FeedEntry::new(post, self.next_epoch)
                }
            })
            .collect();

        debug!(
            kind = ?self.kind,
            count = self.entries.len(),
            carried_pending,
            "feed snapshot applied"
        );
    }

    /// Добавляет подтверждённый сервером пост в начало ленты.
    ///
    /// Если пост с таким id уже есть, он переезжает наверх без дубля.
    pub fn insert(&mut self, post: Post) {
        let entry = match self.entries.iter().position(|entry| entry.post.id == post.id) {
            Some(index) => {
                let mut entry = self.entries.remove(index);
                let score = post.score;
                entry.post = post;
                entry.rebase(score);
                entry
            }
            None => {
                self.next_epoch += 1;
                FeedEntry::new(post, self.next_epoch)
            }
        };
        self.entries.insert(0, entry);
    }

    /// Удаляет пост из ленты. Повторное удаление ничего не делает.
    pub fn remove(&mut self, post_id: i64) -> Option<Post> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.post.id == post_id)?;
        Some(self.entries.remove(index).post)
    }

    /// Обновляет серверный счёт поста. Возвращает `false`, если поста нет.
    pub fn patch_score(&mut self, post_id: i64, score: i64) -> bool {
        match self.get_mut(post_id) {
            Some(entry) => {
                entry.rebase(score);
                true
            }
            None => false,
        }
    }

    /// Обновляет заголовок и/или текст. Возвращает `false`, если поста нет.
    pub fn patch_fields(&mut self, post_id: i64, patch: &PostPatch) -> bool {
        match self.get_mut(post_id) {
            Some(entry) => {
                patch.apply_to(&mut entry.post);
                true
            }
            None => false,
        }
    }

    /// Восстанавливает известное направление голоса (например, из прошлой
    /// сессии). Не трогает пост с голосом в полёте.
    pub fn restore_direction(&mut self, post_id: i64, direction: VoteDirection) -> bool {
        self.next_epoch += 1;
        let epoch = self.next_epoch;
        match self.get_mut(post_id) {
            Some(entry) if !entry.vote.is_pending() => {
                entry.vote = VoteEngine::with_direction(post_id, entry.post.score, direction);
                entry.epoch = epoch;
                true
            }
            _ => false,
        }
    }

    /// Создаёт пост на сервере и кладёт подтверждённый результат в начало.
    pub async fn create_post<R>(
        &mut self,
        session: &SessionContext,
        remote: &R,
        input: &NewPost,
    ) -> ForumClientResult<Post>
    where
        R: RemoteClient + ?Sized,
    {
        let user = session.require_user()?.clone();
        let input = input.normalized()?;

        let mut post = remote.create_post(&input).await?;
        if post.author_name.is_empty() {
            post.author_name = user.username;
        }
        if post.author_id == 0 {
            post.author_id = user.id;
        }

        info!(post_id = post.id, "post created");
        self.insert(post.clone());
        Ok(post)
    }

    /// Редактирует пост. Доступно только автору.
    pub async fn edit_post<R>(
        &mut self,
        session: &SessionContext,
        remote: &R,
        post_id: i64,
        patch: &PostPatch,
    ) -> ForumClientResult<Post>
    where
        R: RemoteClient + ?Sized,
    {
        session.require_user()?;
        let entry = self.get(post_id).ok_or(ForumClientError::NotFound)?;
        session.require_owner(entry.post.author_id)?;
        let update = patch.resolve(&entry.post).normalized()?;

        let updated = remote.update_post(post_id, &update).await?;
        let applied = PostPatch {
            title: Some(updated.title.clone()),
            body: Some(updated.body.clone()),
        };
        if !self.patch_fields(post_id, &applied) {
            debug!(post_id, "edited post left the feed before the response");
        }

        info!(post_id, "post updated");
        Ok(self
            .get(post_id)
            .map(|entry| entry.post.clone())
            .unwrap_or(updated))
    }

    /// Удаляет пост. Доступно только автору.
    ///
    /// Если сервер уже не знает о посте, локальная запись тоже удаляется,
    /// а вызывающий получает [`ForumClientError::NotFound`].
    pub async fn delete_post<R>(
        &mut self,
        session: &SessionContext,
        remote: &R,
        post_id: i64,
    ) -> ForumClientResult<()>
    where
        R: RemoteClient + ?Sized,
    {
        session.require_user()?;
        let entry = self.get(post_id).ok_or(ForumClientError::NotFound)?;
        session.require_owner(entry.post.author_id)?;

        match remote.delete_post(post_id).await {
            Ok(()) => {
                self.remove(post_id);
                info!(post_id, "post deleted");
                Ok(())
            }
            Err(ForumClientError::NotFound) => {
                self.remove(post_id);
                warn!(post_id, "post already gone on the server");
                Err(ForumClientError::NotFound)
            }
            Err(err) => Err(err),
        }
    }

    /// Оптимистично применяет голос к посту ленты.
    pub fn begin_vote(
        &mut self,
        session: &SessionContext,
        post_id: i64,
        direction: VoteDirection,
    ) -> ForumClientResult<Option<FeedVoteTicket>> {
        session.require_user()?;
        let entry = self.get_mut(post_id).ok_or(ForumClientError::NotFound)?;
        let epoch = entry.epoch;
        let ticket = entry.vote.begin(session, direction)?;
        Ok(ticket.map(|vote| FeedVoteTicket { vote, epoch }))
    }

    /// Сверяет голос с ответом сервера.
    ///
    /// Если пост за это время пропал из ленты (даже если потом вернулся),
    /// ответ отбрасывается.
    pub fn complete_vote(
        &mut self,
        ticket: FeedVoteTicket,
        result: ForumClientResult<VoteReceipt>,
    ) -> ForumClientResult<VoteOutcome> {
        let entry = match self.get_mut(ticket.post_id()) {
            Some(entry) if entry.epoch == ticket.epoch => entry,
            _ => {
                warn!(post_id = ticket.post_id(), "vote response for a post no longer in the feed");
                return Ok(VoteOutcome::Discarded);
            }
        };
        let outcome = entry.vote.complete(ticket.vote, result);
        entry.sync_score();
        outcome
    }

    /// Полный цикл голоса за пост ленты.
    pub async fn vote<R>(
        &mut self,
        session: &SessionContext,
        remote: &R,
        post_id: i64,
        direction: VoteDirection,
    ) -> ForumClientResult<VoteOutcome>
    where
        R: RemoteClient + ?Sized,
    {
        let Some(ticket) = self.begin_vote(session, post_id, direction)? else {
            return Ok(VoteOutcome::Ignored);
        };
        let result = remote.submit_vote(ticket.post_id(), ticket.direction()).await;
        self.complete_vote(ticket, result)
    }
}
