//! Оптимистичное голосование за один пост.
//!
//! Клик сразу меняет отображаемый счёт и направление, запрос уходит следом.
//! Ответ сервера либо подтверждает голос (и, если прислан счёт, заменяет
//! им локальное значение), либо откатывает состояние к моменту до клика.
//! Пока запрос в полёте, новые клики по этому посту отбрасываются.

use tracing::{debug, info, warn};

use crate::error::{ForumClientError, ForumClientResult};
use crate::models::{VoteDirection, VoteReceipt};
use crate::remote::RemoteClient;
use crate::session::SessionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Фаза машины состояний голоса.
pub enum VotePhase {
    /// Пользователь ещё не голосовал в этой сессии.
    Idle,
    /// Запрос отправлен, ответа нет.
    Pending,
    /// Последний голос подтверждён сервером.
    Committed,
    /// Последний голос отклонён, состояние откачено.
    RolledBack,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Снимок состояния голоса для отображения.
pub struct VoteState {
    /// Пост.
    pub post_id: i64,
    /// Счёт, который видит пользователь.
    pub displayed_score: i64,
    /// Направление, которое клиент считает действующим.
    pub user_direction: VoteDirection,
    /// Есть ли запрос в полёте.
    pub pending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Квитанция на отправленный голос. Её нужно вернуть в
/// [`VoteEngine::complete`] вместе с ответом сервера.
pub struct VoteTicket {
    post_id: i64,
    seq: u64,
    direction: VoteDirection,
}

impl VoteTicket {
    /// Пост, за который голосуем.
    pub fn post_id(&self) -> i64 {
        self.post_id
    }

    /// Итоговое направление, которое нужно отправить на сервер.
    pub fn direction(&self) -> VoteDirection {
        self.direction
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Чем закончилась попытка проголосовать.
pub enum VoteOutcome {
    /// Сервер принял голос.
    Committed {
        /// Счёт после сверки с сервером.
        score: i64,
        /// Действующее направление.
        direction: VoteDirection,
    },
    /// Клик отброшен, потому что предыдущий голос ещё в полёте.
    Ignored,
    /// Ответ пришёл для запроса, который уже неактуален.
    Discarded,
}

impl VoteOutcome {
    /// Подтверждённый счёт, если голос принят.
    pub fn committed_score(&self) -> Option<i64> {
        match self {
            Self::Committed { score, .. } => Some(*score),
            Self::Ignored | Self::Discarded => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    seq: u64,
    delta: i64,
    previous: VoteDirection,
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Idle,
    Pending(InFlight),
    Committed,
    RolledBack,
}

#[derive(Debug, Clone)]
/// Состояние голоса текущего пользователя за один пост.
///
/// Инвариант: `displayed_score() == server_score() + pending_delta()`.
pub struct VoteEngine {
    post_id: i64,
    server_score: i64,
    direction: VoteDirection,
    phase: Phase,
    next_seq: u64,
}

impl VoteEngine {
    /// Движок для поста без голоса пользователя.
    pub fn new(post_id: i64, server_score: i64) -> Self {
        Self::with_direction(post_id, server_score, VoteDirection::None)
    }

    /// Движок с уже известным направлением голоса, учтённым в `server_score`.
    pub fn with_direction(post_id: i64, server_score: i64, direction: VoteDirection) -> Self {
        Self {
            post_id,
            server_score,
            direction,
            phase: Phase::Idle,
            next_seq: 1,
        }
    }

    /// Пост.
    pub fn post_id(&self) -> i64 {
        self.post_id
    }

    /// Последний известный серверный счёт.
    pub fn server_score(&self) -> i64 {
        self.server_score
    }

    /// Дельта неподтверждённого голоса, 0 если запроса в полёте нет.
    pub fn pending_delta(&self) -> i64 {
        match self.phase {
            Phase::Pending(in_flight) => in_flight.delta,
            Phase::Idle | Phase::Committed | Phase::RolledBack => 0,
        }
    }

    /// Счёт, который видит пользователь.
    pub fn displayed_score(&self) -> i64 {
        self.server_score + self.pending_delta()
    }

    /// Направление, которое клиент считает действующим.
    pub fn direction(&self) -> VoteDirection {
        self.direction
    }

    /// Текущая фаза.
    pub fn phase(&self) -> VotePhase {
        match self.phase {
            Phase::Idle => VotePhase::Idle,
            Phase::Pending(_) => VotePhase::Pending,
            Phase::Committed => VotePhase::Committed,
            Phase::RolledBack => VotePhase::RolledBack,
        }
    }

    /// Есть ли запрос в полёте.
    pub fn is_pending(&self) -> bool {
        matches!(self.phase, Phase::Pending(_))
    }

    /// Снимок для отображения.
    pub fn state(&self) -> VoteState {
        VoteState {
            post_id: self.post_id,
            displayed_score: self.displayed_score(),
            user_direction: self.direction,
            pending: self.is_pending(),
        }
    }

    /// Применяет клик оптимистично и выдаёт квитанцию на запрос.
    ///
    /// Повторный клик в то же направление снимает голос. Возвращает `None`,
    /// если предыдущий запрос ещё не завершён: такой клик просто теряется.
    pub fn begin(
        &mut self,
        session: &SessionContext,
        requested: VoteDirection,
    ) -> ForumClientResult<Option<VoteTicket>> {
        session.require_user()?;
        if requested == VoteDirection::None {
            return Err(ForumClientError::InvalidRequest(
                "vote direction must be up or down".to_string(),
            ));
        }
        if self.is_pending() {
            debug!(post_id = self.post_id, "vote click dropped, request in flight");
            return Ok(None);
        }

        let previous = self.direction;
        let target = if requested == previous {
            VoteDirection::None
        } else {
            requested
        };
        let delta = target.weight() - previous.weight();
        let seq = self.next_seq;
        self.next_seq += 1;

        self.direction = target;
        self.phase = Phase::Pending(InFlight {
            seq,
            delta,
            previous,
        });
        debug!(
            post_id = self.post_id,
            ?previous,
            ?target,
            delta,
            displayed = self.displayed_score(),
            "optimistic vote applied"
        );

        Ok(Some(VoteTicket {
            post_id: self.post_id,
            seq,
            direction: target,
        }))
    }

    /// Сверяет состояние с ответом сервера на запрос по `ticket`.
    ///
    /// При ошибке состояние откатывается и ошибка возвращается вызывающему.
    /// Ответ на неактуальную квитанцию игнорируется.
    pub fn complete(
        &mut self,
        ticket: VoteTicket,
        result: ForumClientResult<VoteReceipt>,
    ) -> ForumClientResult<VoteOutcome> {
        let in_flight = match self.phase {
            Phase::Pending(in_flight)
                if ticket.post_id == self.post_id && ticket.seq == in_flight.seq =>
            {
                in_flight
            }
            _ => {
                warn!(post_id = ticket.post_id, "stale vote response discarded");
                return Ok(VoteOutcome::Discarded);
            }
        };

        match result {
            Ok(receipt) => {
                let optimistic = self.server_score + in_flight.delta;
                self.server_score = receipt.score.unwrap_or(optimistic);
                self.phase = Phase::Committed;
                if self.server_score != optimistic {
                    debug!(
                        post_id = self.post_id,
                        optimistic,
                        server = self.server_score,
                        "server score differs from optimistic value"
                    );
                }
                info!(
                    post_id = self.post_id,
                    score = self.server_score,
                    direction = ?self.direction,
                    "vote committed"
                );
                Ok(VoteOutcome::Committed {
                    score: self.server_score,
                    direction: self.direction,
                })
            }
            Err(err) => {
                self.direction = in_flight.previous;
                self.phase = Phase::RolledBack;
                warn!(post_id = self.post_id, error = %err, "vote rolled back");
                Err(err)
            }
        }
    }

    /// Принимает новый серверный счёт (перезагрузка ленты или явный патч).
    ///
    /// Неподтверждённая дельта сохраняется поверх нового значения.
    pub fn rebase(&mut self, server_score: i64) {
        if self.is_pending() {
            debug!(
                post_id = self.post_id,
                server_score,
                delta = self.pending_delta(),
                "reapplying pending vote over new server score"
            );
        }
        self.server_score = server_score;
    }

    /// Полный цикл голоса: оптимистичное применение, запрос, сверка.
    pub async fn apply_vote<R>(
        &mut self,
        session: &SessionContext,
        remote: &R,
        direction: VoteDirection,
    ) -> ForumClientResult<VoteOutcome>
    where
        R: RemoteClient + ?Sized,
    {
        let Some(ticket) = self.begin(session, direction)? else {
            return Ok(VoteOutcome::Ignored);
        };
        let result = remote.submit_vote(ticket.post_id, ticket.direction).await;
        self.complete(ticket, result)
    }
}
