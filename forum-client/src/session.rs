use serde::{Deserialize, Serialize};

use crate::error::{ForumClientError, ForumClientResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Пользователь текущей сессии.
pub struct SessionUser {
    /// Идентификатор пользователя.
    pub id: i64,
    /// Логин.
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Учётные данные, которые HTTP-клиент прикладывает к каждому запросу.
pub struct SessionCredential {
    /// Уходит в заголовке `X-User-ID`.
    pub user_id: i64,
    /// Уходит как `Authorization: Bearer`, если есть.
    pub token: Option<String>,
}

/// Контекст сессии: кто сейчас работает с форумом.
///
/// Компоненты получают его по ссылке и только читают. Менять состояние
/// (`login`/`logout`) может лишь владелец контекста, поэтому в тестах можно
/// подставить любого пользователя без глобального состояния.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    user: Option<SessionUser>,
}

impl SessionContext {
    /// Анонимная сессия.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Сессия с уже вошедшим пользователем.
    pub fn signed_in(user: SessionUser) -> Self {
        Self { user: Some(user) }
    }

    /// Текущий пользователь, если есть.
    pub fn current_user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    /// Текущий пользователь или [`ForumClientError::Unauthenticated`].
    pub fn require_user(&self) -> ForumClientResult<&SessionUser> {
        self.user.as_ref().ok_or(ForumClientError::Unauthenticated)
    }

    /// Проверяет, что текущий пользователь является автором ресурса.
    pub fn require_owner(&self, author_id: i64) -> ForumClientResult<&SessionUser> {
        let user = self.require_user()?;
        if user.id != author_id {
            return Err(ForumClientError::Forbidden);
        }
        Ok(user)
    }

    /// Запоминает вошедшего пользователя.
    pub fn login(&mut self, user: SessionUser) {
        self.user = Some(user);
    }

    /// Завершает сессию.
    pub fn logout(&mut self) {
        self.user = None;
    }
}
