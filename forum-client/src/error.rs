use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Ошибки клиентской библиотеки `forum-client`.
pub enum ForumClientError {
    /// Для действия требуется пользователь, а сессия анонимная.
    #[error("unauthenticated")]
    Unauthenticated,

    /// Пользователь есть, но он не владелец ресурса.
    #[error("forbidden")]
    Forbidden,

    /// Пост или комментарий не найден.
    #[error("not found")]
    NotFound,

    /// Сервер отклонил голос из-за гонки или дубликата.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Сеть, таймаут, 5xx или нечитаемый ответ.
    #[error("transient error: {0}")]
    Transient(String),

    /// Некорректный запрос: локальная валидация или 400 от сервера.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Результат операций `forum-client`.
pub type ForumClientResult<T> = Result<T, ForumClientError>;

impl ForumClientError {
    /// Имеет ли смысл повторить запрос позже.
    ///
    /// Ядро само ничего не повторяет, решение остаётся за вызывающим кодом.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub(crate) fn from_http_status(status: reqwest::StatusCode, message: Option<String>) -> Self {
        let message = message.unwrap_or_else(|| format!("http status {status}"));
        match status {
            reqwest::StatusCode::UNAUTHORIZED => Self::Unauthenticated,
            reqwest::StatusCode::FORBIDDEN => Self::Forbidden,
            reqwest::StatusCode::NOT_FOUND => Self::NotFound,
            reqwest::StatusCode::CONFLICT => Self::Conflict(message),
            reqwest::StatusCode::REQUEST_TIMEOUT | reqwest::StatusCode::TOO_MANY_REQUESTS => {
                Self::Transient(message)
            }
            status if status.is_server_error() => Self::Transient(message),
            _ => Self::InvalidRequest(message),
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_http_status(status, None);
        }
        Self::Transient(err.to_string())
    }
}

impl From<ValidationErrors> for ForumClientError {
    fn from(value: ValidationErrors) -> Self {
        Self::InvalidRequest(value.to_string())
    }
}
