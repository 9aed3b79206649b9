use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;
use tracing::{debug, info};
use validator::Validate;

use crate::error::{ForumClientError, ForumClientResult};
use crate::models::{Comment, NewComment, NewPost, Post, PostUpdate, VoteDirection, VoteReceipt};
use crate::remote::RemoteClient;
use crate::session::{SessionCredential, SessionUser};

const USER_ID_HEADER: &str = "X-User-ID";

#[derive(Debug, Serialize, Validate)]
struct CredentialsDto {
    #[validate(length(min = 1, max = 80))]
    username: String,
    #[validate(length(min = 1))]
    password: String,
}

impl CredentialsDto {
    fn new(username: &str, password: &str) -> ForumClientResult<Self> {
        let dto = Self {
            username: username.trim().to_string(),
            password: password.to_string(),
        };
        dto.validate()?;
        Ok(dto)
    }
}

#[derive(Debug, Default, Deserialize)]
struct MessageDto {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponseDto {
    user_id: i64,
}

#[derive(Debug, Serialize)]
struct PostBodyDto<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct CommentBodyDto<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct VoteRequestDto {
    post_id: i64,
    value: i8,
}

#[derive(Debug, Default, Deserialize)]
struct VoteResponseDto {
    #[serde(default)]
    score: Option<i64>,
    #[serde(default)]
    vote_score: Option<i64>,
}

impl VoteResponseDto {
    fn score(&self) -> Option<i64> {
        self.score.or(self.vote_score)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponseDto {
    error: Option<String>,
}

// Старые версии бэкенда отдают `content`, `vote_score`, `user_id` и
// `author_username`, иногда вместе с новыми именами, а время в формате
// RFC 2822. Новое имя важнее старого.
#[derive(Debug, Deserialize)]
struct PostDto {
    id: i64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    score: Option<i64>,
    #[serde(default)]
    vote_score: Option<i64>,
    #[serde(default)]
    author_id: Option<i64>,
    #[serde(default)]
    user_id: Option<i64>,
    #[serde(default)]
    author_name: Option<String>,
    #[serde(default)]
    author_username: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    created: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentDto {
    id: i64,
    #[serde(default)]
    post_id: Option<i64>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    author_id: Option<i64>,
    #[serde(default)]
    user_id: Option<i64>,
    #[serde(default)]
    author_name: Option<String>,
    #[serde(default)]
    author_username: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    replies: Vec<CommentDto>,
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_rfc2822(raw))
        .map(|ts| ts.with_timezone(&Utc))
        .ok()
}

impl From<PostDto> for Post {
    fn from(value: PostDto) -> Self {
        Self {
            id: value.id,
            title: value.title,
            body: value.body.or(value.content).unwrap_or_default(),
            score: value.score.or(value.vote_score).unwrap_or_default(),
            author_id: value.author_id.or(value.user_id).unwrap_or_default(),
            author_name: value
                .author_name
                .or(value.author_username)
                .unwrap_or_default(),
            created_at: parse_timestamp(value.created_at.or(value.created).as_deref()),
        }
    }
}

impl CommentDto {
    fn into_comment(self, fallback_post_id: i64) -> Comment {
        let post_id = self.post_id.unwrap_or(fallback_post_id);
        Comment {
            id: self.id,
            post_id,
            body: self.body.or(self.content).unwrap_or_default(),
            author_id: self.author_id.or(self.user_id).unwrap_or_default(),
            author_name: self
                .author_name
                .or(self.author_username)
                .unwrap_or_default(),
            created_at: parse_timestamp(self.created_at.or(self.created).as_deref()),
            replies: self
                .replies
                .into_iter()
                .map(|reply| reply.into_comment(post_id))
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
/// Параметры HTTP-клиента.
pub struct HttpClientConfig {
    /// Базовый URL бэкенда, например `http://127.0.0.1:5000`.
    pub base_url: String,
    /// Таймаут установки соединения.
    pub connect_timeout: Duration,
    /// Таймаут всего запроса.
    pub request_timeout: Duration,
}

impl HttpClientConfig {
    /// Конфигурация с таймаутами по умолчанию (5 и 15 секунд).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone)]
/// HTTP-реализация [`RemoteClient`] поверх REST API форума.
pub struct HttpRemoteClient {
    base_url: String,
    client: Client,
    credential: Option<SessionCredential>,
}

impl HttpRemoteClient {
    /// Создаёт клиент без учётных данных.
    pub fn new(config: HttpClientConfig) -> ForumClientResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| {
                ForumClientError::InvalidRequest(format!("failed to build http client: {err}"))
            })?;

        Ok(Self {
            base_url: config.base_url,
            client,
            credential: None,
        })
    }

    /// Устанавливает учётные данные, которые будут приложены к запросам.
    pub fn set_credential(&mut self, credential: SessionCredential) {
        self.credential = Some(credential);
    }

    /// Сбрасывает учётные данные.
    pub fn clear_credential(&mut self) {
        self.credential = None;
    }

    /// Текущие учётные данные, если есть.
    pub fn credential(&self) -> Option<&SessionCredential> {
        self.credential.as_ref()
    }

    /// Выполняет вход (`POST /login`) и запоминает учётные данные.
    pub async fn login(&mut self, username: &str, password: &str) -> ForumClientResult<SessionUser> {
        let payload = CredentialsDto::new(username, password)?;
        let dto: LoginResponseDto = self
            .send_json(Method::POST, "/login", Some(&payload))
            .await?;

        self.credential = Some(SessionCredential {
            user_id: dto.user_id,
            token: None,
        });
        Ok(SessionUser {
            id: dto.user_id,
            username: payload.username,
        })
    }

    /// Регистрирует пользователя (`POST /register`) и сразу выполняет вход.
    ///
    /// Сервер не возвращает id нового пользователя, поэтому он берётся из
    /// ответа на последующий `login`.
    pub async fn register(
        &mut self,
        username: &str,
        password: &str,
    ) -> ForumClientResult<SessionUser> {
        let payload = CredentialsDto::new(username, password)?;
        let dto: MessageDto = self
            .send_json(Method::POST, "/register", Some(&payload))
            .await?;
        info!(
            username = payload.username.as_str(),
            message = dto.message.as_deref().unwrap_or_default(),
            "user registered"
        );

        self.login(&payload.username, &payload.password).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self.client.request(method, self.endpoint(path));
        if let Some(credential) = &self.credential {
            request = request.header(USER_ID_HEADER, credential.user_id.to_string());
            if let Some(token) = &credential.token {
                request = request.bearer_auth(token);
            }
        }
        request
    }

    async fn decode_error(response: reqwest::Response) -> ForumClientError {
        let status = response.status();

        let message = match response.json::<ErrorResponseDto>().await {
            Ok(body) => body
                .error
                .unwrap_or_else(|| format!("http status {status}")),
            Err(_) => format!("http status {status}"),
        };
        ForumClientError::from_http_status(status, Some(message))
    }

    async fn send(&self, request: RequestBuilder) -> ForumClientResult<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(ForumClientError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }
        Ok(response)
    }

    /// универсальный helper для запросов с опциональным json-payload
    async fn send_json<TReq, TRes>(
        &self,
        method: Method,
        path: &str,
        body: Option<&TReq>,
    ) -> ForumClientResult<TRes>
    where
        TReq: Serialize,
        TRes: DeserializeOwned,
    {
        debug!(method = method.as_str(), path, "forum request");
        let mut request = self.request(method, path);
        if let Some(body) = body {
            request = request.json(body);
        }

        self.send(request)
            .await?
            .json::<TRes>()
            .await
            .map_err(ForumClientError::from_reqwest)
    }

    async fn get_json<TRes>(&self, path: &str) -> ForumClientResult<TRes>
    where
        TRes: DeserializeOwned,
    {
        self.send_json::<(), TRes>(Method::GET, path, None).await
    }

    async fn fetch_posts(&self, path: &str) -> ForumClientResult<Vec<Post>> {
        let dtos: Vec<PostDto> = self.get_json(path).await?;
        Ok(dtos.into_iter().map(Post::from).collect())
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn fetch_feed(&self) -> ForumClientResult<Vec<Post>> {
        self.fetch_posts("/posts").await
    }

    async fn fetch_popular(&self) -> ForumClientResult<Vec<Post>> {
        self.fetch_posts("/posts/popular").await
    }

    async fn fetch_user_posts(&self, user_id: i64) -> ForumClientResult<Vec<Post>> {
        self.fetch_posts(&format!("/users/{user_id}/posts")).await
    }

    async fn fetch_post(&self, id: i64) -> ForumClientResult<Post> {
        let dto: PostDto = self.get_json(&format!("/posts/{id}")).await?;
        Ok(dto.into())
    }

    async fn fetch_comments(&self, post_id: i64) -> ForumClientResult<Vec<Comment>> {
        let dtos: Vec<CommentDto> = self.get_json(&format!("/posts/{post_id}/comments")).await?;
        Ok(dtos
            .into_iter()
            .map(|dto| dto.into_comment(post_id))
            .collect())
    }

    async fn submit_vote(
        &self,
        post_id: i64,
        direction: VoteDirection,
    ) -> ForumClientResult<VoteReceipt> {
        let payload = VoteRequestDto {
            post_id,
            value: direction.wire_value(),
        };
        debug!(post_id, value = payload.value, "submitting vote");
        let response = self
            .send(self.request(Method::POST, "/vote").json(&payload))
            .await?;

        // Ответ без тела или без `score` означает, что сервер счёт не вернул.
        let raw = response
            .bytes()
            .await
            .map_err(ForumClientError::from_reqwest)?;
        let dto = if raw.iter().all(u8::is_ascii_whitespace) {
            VoteResponseDto::default()
        } else {
            serde_json::from_slice::<VoteResponseDto>(&raw)
                .map_err(|err| ForumClientError::Transient(format!("invalid vote response: {err}")))?
        };
        Ok(VoteReceipt { score: dto.score() })
    }

    async fn create_post(&self, input: &NewPost) -> ForumClientResult<Post> {
        let payload = PostBodyDto {
            title: &input.title,
            body: &input.body,
        };
        let dto: PostDto = self
            .send_json(Method::POST, "/posts", Some(&payload))
            .await?;
        Ok(dto.into())
    }

    async fn update_post(&self, id: i64, update: &PostUpdate) -> ForumClientResult<Post> {
        let payload = PostBodyDto {
            title: &update.title,
            body: &update.body,
        };
        let dto: PostDto = self
            .send_json(Method::PUT, &format!("/posts/{id}"), Some(&payload))
            .await?;
        Ok(dto.into())
    }

    async fn delete_post(&self, id: i64) -> ForumClientResult<()> {
        self.send(self.request(Method::DELETE, &format!("/posts/{id}")))
            .await?;
        Ok(())
    }

    async fn create_comment(
        &self,
        post_id: i64,
        input: &NewComment,
    ) -> ForumClientResult<Comment> {
        let payload = CommentBodyDto { body: &input.body };
        let dto: CommentDto = self
            .send_json(
                Method::POST,
                &format!("/posts/{post_id}/comments"),
                Some(&payload),
            )
            .await?;
        Ok(dto.into_comment(post_id))
    }
}
