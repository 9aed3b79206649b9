use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ForumClientResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Публичная модель поста.
pub struct Post {
    /// Идентификатор поста, назначается сервером.
    pub id: i64,
    /// Заголовок поста.
    pub title: String,
    /// Текст поста.
    pub body: String,
    /// Последний известный серверный счёт голосов.
    pub score: i64,
    /// Идентификатор автора, единственного, кто может править и удалять пост.
    pub author_id: i64,
    /// Имя автора для отображения.
    pub author_name: String,
    /// Дата и время создания (UTC), если сервер её прислал.
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Публичная модель комментария.
pub struct Comment {
    /// Идентификатор комментария.
    pub id: i64,
    /// Пост, к которому относится комментарий.
    pub post_id: i64,
    /// Текст комментария.
    pub body: String,
    /// Идентификатор автора.
    pub author_id: i64,
    /// Имя автора для отображения.
    pub author_name: String,
    /// Дата и время создания (UTC), если сервер её прислал.
    pub created_at: Option<DateTime<Utc>>,
    /// Ответы в порядке, в котором их вернул сервер.
    pub replies: Vec<Comment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Направление голоса текущего пользователя.
pub enum VoteDirection {
    /// Голоса нет.
    #[default]
    None,
    /// Голос «за».
    Up,
    /// Голос «против».
    Down,
}

impl VoteDirection {
    /// Вклад направления в счёт: `+1`, `-1` или `0`.
    pub fn weight(self) -> i64 {
        match self {
            Self::None => 0,
            Self::Up => 1,
            Self::Down => -1,
        }
    }

    /// Значение поля `value` в запросе `/vote`.
    pub fn wire_value(self) -> i8 {
        match self {
            Self::None => 0,
            Self::Up => 1,
            Self::Down => -1,
        }
    }

    /// Обратное к [`VoteDirection::wire_value`]; любое положительное значение
    /// считается `Up`, отрицательное `Down`.
    pub fn from_wire_value(value: i64) -> Self {
        match value.signum() {
            1 => Self::Up,
            -1 => Self::Down,
            _ => Self::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
/// Ответ сервера на голос.
pub struct VoteReceipt {
    /// Авторитетный счёт после голоса. Старые бэкенды его не присылают.
    pub score: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
/// Данные для создания поста.
pub struct NewPost {
    /// Заголовок.
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    /// Текст.
    #[validate(length(min = 1))]
    pub body: String,
}

impl NewPost {
    /// Создаёт запрос, обрезая пробелы по краям.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into().trim().to_string(),
            body: body.into().trim().to_string(),
        }
    }

    pub(crate) fn normalized(&self) -> ForumClientResult<Self> {
        let normalized = Self::new(self.title.as_str(), self.body.as_str());
        normalized.validate()?;
        Ok(normalized)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
/// Полное содержимое поста для `PUT /posts/{id}`.
pub struct PostUpdate {
    /// Новый заголовок.
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    /// Новый текст.
    #[validate(length(min = 1))]
    pub body: String,
}

impl PostUpdate {
    pub(crate) fn normalized(&self) -> ForumClientResult<Self> {
        let normalized = Self {
            title: self.title.trim().to_string(),
            body: self.body.trim().to_string(),
        };
        normalized.validate()?;
        Ok(normalized)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Частичное изменение полей поста. `None` означает «оставить как есть».
pub struct PostPatch {
    /// Новый заголовок.
    pub title: Option<String>,
    /// Новый текст.
    pub body: Option<String>,
}

impl PostPatch {
    /// Собирает полный [`PostUpdate`], дополняя пропущенные поля из `post`.
    pub fn resolve(&self, post: &Post) -> PostUpdate {
        PostUpdate {
            title: self.title.clone().unwrap_or_else(|| post.title.clone()),
            body: self.body.clone().unwrap_or_else(|| post.body.clone()),
        }
    }

    pub(crate) fn apply_to(&self, post: &mut Post) {
        if let Some(title) = &self.title {
            post.title = title.clone();
        }
        if let Some(body) = &self.body {
            post.body = body.clone();
        }
    }
}

impl From<PostUpdate> for PostPatch {
    fn from(value: PostUpdate) -> Self {
        Self {
            title: Some(value.title),
            body: Some(value.body),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
/// Данные для создания комментария.
pub struct NewComment {
    /// Текст комментария.
    #[validate(length(min = 1))]
    pub body: String,
}

impl NewComment {
    /// Создаёт запрос, обрезая пробелы по краям.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into().trim().to_string(),
        }
    }

    pub(crate) fn normalized(&self) -> ForumClientResult<Self> {
        let normalized = Self::new(self.body.as_str());
        normalized.validate()?;
        Ok(normalized)
    }
}
