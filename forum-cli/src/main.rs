mod logging;
mod session_file;
mod settings;

use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use forum_client::{
    Comment, DetailSync, FeedEntry, FeedKind, FeedStore, ForumClientError, HttpRemoteClient,
    NewComment, NewPost, Post, PostDetail, PostPatch, VoteDirection, VoteOutcome,
};
use tracing::debug;

use crate::logging::init_logging;
use crate::session_file::{
    SESSION_FILE, StoredSession, load_session, persist_session, remove_session,
};
use crate::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "forum-cli", version, about = "CLI клиент для форума")]
struct Cli {
    /// Адрес сервера (по умолчанию FORUM_API_URL или http://127.0.0.1:5000).
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DirectionArg {
    Up,
    Down,
}

impl From<DirectionArg> for VoteDirection {
    fn from(value: DirectionArg) -> Self {
        match value {
            DirectionArg::Up => VoteDirection::Up,
            DirectionArg::Down => VoteDirection::Down,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Регистрация пользователя с последующим входом.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Вход пользователя.
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Выход: удаляет сохранённую сессию.
    Logout,
    /// Лента постов.
    Feed {
        /// Популярные посты вместо новых.
        #[arg(long, conflicts_with = "author")]
        popular: bool,
        /// Посты одного автора.
        #[arg(long)]
        author: Option<i64>,
    },
    /// Пост с комментариями.
    Show {
        #[arg(long)]
        id: i64,
    },
    /// Голос за пост (требует вход).
    ///
    /// Повторный голос в том же направлении снимает его.
    Vote {
        #[arg(long)]
        id: i64,
        #[arg(long, value_enum)]
        direction: DirectionArg,
    },
    /// Создание поста (требует вход).
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        body: String,
    },
    /// Редактирование своего поста.
    ///
    /// Не указанные поля остаются прежними.
    Edit {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        body: Option<String>,
    },
    /// Удаление своего поста.
    Delete {
        #[arg(long)]
        id: i64,
    },
    /// Комментарий к посту (требует вход).
    Comment {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        body: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Ошибка: {err}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let settings = Settings::from_env().context("некорректная конфигурация")?;
    init_logging(&settings.log_level)?;

    let config = settings.http_config(cli.server);
    debug!(base_url = %config.base_url, "using forum backend");
    let mut remote = HttpRemoteClient::new(config).map_err(map_client_error)?;

    let session_path = Path::new(SESSION_FILE);
    let mut stored = load_session(session_path)?;
    if let Some(credential) = stored.credential.clone() {
        remote.set_credential(credential);
    }
    let session = stored.context();

    match cli.command {
        Command::Register { username, password } => {
            let user = remote
                .register(&username, &password)
                .await
                .map_err(map_client_error)?;
            let credential = remote
                .credential()
                .cloned()
                .context("сервер не вернул учётные данные")?;
            stored.sign_in(user.clone(), credential);
            persist_session(session_path, &stored)?;
            println!("Регистрация успешна: {} (id={})", user.username, user.id);
        }
        Command::Login { username, password } => {
            let user = remote
                .login(&username, &password)
                .await
                .map_err(map_client_error)?;
            let credential = remote
                .credential()
                .cloned()
                .context("сервер не вернул учётные данные")?;
            stored.sign_in(user.clone(), credential);
            persist_session(session_path, &stored)?;
            println!("Вход выполнен: {} (id={})", user.username, user.id);
        }
        Command::Logout => {
            remove_session(session_path)
                .with_context(|| format!("не удалось удалить {}", session_path.display()))?;
            println!("Сессия завершена");
        }
        Command::Feed { popular, author } => {
            let kind = feed_kind(popular, author);
            let mut feed = FeedStore::new(kind);
            feed.load(&remote).await.map_err(map_client_error)?;
            for (post_id, direction) in &stored.votes {
                feed.restore_direction(*post_id, *direction);
            }
            print_feed(kind, feed.entries());
        }
        Command::Show { id } => {
            let mut detail = DetailSync::new();
            load_detail(&mut detail, &remote, &stored, id).await?;
            if let Some(detail) = detail.detail() {
                print_detail(detail);
            }
        }
        Command::Vote { id, direction } => {
            let mut detail = DetailSync::new();
            load_detail(&mut detail, &remote, &stored, id).await?;
            let outcome = detail
                .vote(&session, &remote, direction.into())
                .await
                .map_err(map_client_error)?;

            if let VoteOutcome::Committed { direction, .. } = outcome {
                stored.remember_vote(id, direction);
                persist_session(session_path, &stored)?;
            }
            println!("{}", vote_outcome_message(id, outcome));
        }
        Command::Create { title, body } => {
            let mut feed = FeedStore::new(FeedKind::Latest);
            let post = feed
                .create_post(&session, &remote, &NewPost::new(title, body))
                .await
                .map_err(map_client_error)?;
            print_post("Пост создан", &post);
        }
        Command::Edit { id, title, body } => {
            let mut detail = DetailSync::new();
            load_detail(&mut detail, &remote, &stored, id).await?;
            let post = detail
                .edit_post(&session, &remote, &PostPatch { title, body })
                .await
                .map_err(map_client_error)?;
            print_post("Пост обновлён", &post);
        }
        Command::Delete { id } => {
            let mut detail = DetailSync::new();
            load_detail(&mut detail, &remote, &stored, id).await?;
            let deleted = detail
                .delete_post(&session, &remote)
                .await
                .map_err(map_client_error)?;
            stored.forget_post(deleted);
            persist_session(session_path, &stored)?;
            println!("Пост удалён: id={deleted}");
        }
        Command::Comment { id, body } => {
            let mut detail = DetailSync::new();
            load_detail(&mut detail, &remote, &stored, id).await?;
            let comment = detail
                .submit_comment(&session, &remote, &NewComment::new(body))
                .await
                .map_err(map_client_error)?;
            println!("Комментарий добавлен: id={}", comment.id);
        }
    }

    Ok(())
}

async fn load_detail(
    detail: &mut DetailSync,
    remote: &HttpRemoteClient,
    stored: &StoredSession,
    post_id: i64,
) -> Result<()> {
    detail
        .load(remote, post_id)
        .await
        .map_err(map_client_error)?;
    detail.restore_direction(stored.vote_for(post_id));
    Ok(())
}

fn feed_kind(popular: bool, author: Option<i64>) -> FeedKind {
    match (popular, author) {
        (_, Some(user_id)) => FeedKind::Author(user_id),
        (true, None) => FeedKind::Popular,
        (false, None) => FeedKind::Latest,
    }
}

fn map_client_error(err: ForumClientError) -> anyhow::Error {
    let message = match err {
        ForumClientError::Unauthenticated => {
            "требуется авторизация: выполните `forum-cli login ...` или `forum-cli register ...`".to_string()
        }
        ForumClientError::Forbidden => "действие доступно только автору".to_string(),
        ForumClientError::NotFound => "ресурс не найден".to_string(),
        ForumClientError::Conflict(message) => format!("конфликт: {message}"),
        ForumClientError::Transient(message) => {
            format!("сервер недоступен, повторите позже: {message}")
        }
        ForumClientError::InvalidRequest(message) => format!("некорректный запрос: {message}"),
    };
    anyhow::anyhow!(message)
}

fn direction_label(direction: VoteDirection) -> &'static str {
    match direction {
        VoteDirection::Up => "голос: +",
        VoteDirection::Down => "голос: -",
        VoteDirection::None => "голоса нет",
    }
}

fn vote_outcome_message(post_id: i64, outcome: VoteOutcome) -> String {
    match outcome {
        VoteOutcome::Committed { score, direction } => format!(
            "Голос учтён: id={post_id}, счёт={score}, {}",
            direction_label(direction)
        ),
        VoteOutcome::Ignored => {
            format!("Голос не отправлен: предыдущий голос за пост id={post_id} ещё обрабатывается")
        }
        VoteOutcome::Discarded => {
            format!("Ответ сервера для поста id={post_id} устарел и не применён")
        }
    }
}

fn vote_marker(direction: VoteDirection) -> &'static str {
    match direction {
        VoteDirection::Up => "▲",
        VoteDirection::Down => "▼",
        VoteDirection::None => " ",
    }
}

fn print_post(title: &str, post: &Post) {
    println!("{title}");
    println!("id: {}", post.id);
    println!("title: {}", post.title);
    println!("body: {}", post.body);
    println!("score: {}", post.score);
    println!("author: {} (id={})", post.author_name, post.author_id);
    if let Some(created_at) = post.created_at {
        println!("created_at: {created_at}");
    }
}

fn print_feed(kind: FeedKind, entries: &[FeedEntry]) {
    let title = match kind {
        FeedKind::Latest => "Новые посты".to_string(),
        FeedKind::Popular => "Популярные посты".to_string(),
        FeedKind::Author(user_id) => format!("Посты пользователя id={user_id}"),
    };
    println!("{title}: {}", entries.len());

    for entry in entries {
        println!(
            "{} {:>4} [{}] {} ({})",
            vote_marker(entry.direction()),
            entry.displayed_score(),
            entry.post().id,
            entry.post().title,
            entry.post().author_name
        );
    }
}

fn print_detail(detail: &PostDetail) {
    let post = detail.post();
    print_post("Пост", post);
    println!("{}", direction_label(detail.direction()));
    println!("Комментариев: {}", detail.comments().len());
    for comment in detail.comments() {
        print_comment(comment, 1);
    }
}

fn print_comment(comment: &Comment, depth: usize) {
    println!(
        "{}- [{}] {}: {}",
        "  ".repeat(depth),
        comment.id,
        comment.author_name,
        comment.body
    );
    for reply in &comment.replies {
        print_comment(reply, depth + 1);
    }
}
