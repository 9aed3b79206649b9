//! Сессия CLI между запусками: пользователь, учётные данные и известные
//! направления голосов (сервер их не отдаёт).

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use forum_client::{SessionContext, SessionCredential, SessionUser, VoteDirection};
use serde::{Deserialize, Serialize};

pub const SESSION_FILE: &str = ".forum_session";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub user: Option<SessionUser>,
    pub credential: Option<SessionCredential>,
    #[serde(default)]
    pub votes: BTreeMap<i64, VoteDirection>,
}

impl StoredSession {
    pub fn context(&self) -> SessionContext {
        match &self.user {
            Some(user) => SessionContext::signed_in(user.clone()),
            None => SessionContext::anonymous(),
        }
    }

    pub fn vote_for(&self, post_id: i64) -> VoteDirection {
        self.votes.get(&post_id).copied().unwrap_or_default()
    }

    pub fn remember_vote(&mut self, post_id: i64, direction: VoteDirection) {
        if direction == VoteDirection::None {
            self.votes.remove(&post_id);
        } else {
            self.votes.insert(post_id, direction);
        }
    }

    pub fn forget_post(&mut self, post_id: i64) {
        self.votes.remove(&post_id);
    }

    /// Новый пользователь начинает без чужих голосов.
    pub fn sign_in(&mut self, user: SessionUser, credential: SessionCredential) {
        if self.user.as_ref().map(|current| current.id) != Some(user.id) {
            self.votes.clear();
        }
        self.user = Some(user);
        self.credential = Some(credential);
    }
}

pub fn parse_session_content(raw: &str) -> Result<StoredSession> {
    if raw.trim().is_empty() {
        return Ok(StoredSession::default());
    }
    serde_json::from_str(raw).context("повреждён файл сессии")
}

pub fn load_session(path: &Path) -> Result<StoredSession> {
    if !path.exists() {
        return Ok(StoredSession::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("не удалось прочитать {}", path.display()))?;
    parse_session_content(&raw)
}

pub fn persist_session(path: &Path, session: &StoredSession) -> Result<()> {
    let raw = serde_json::to_string_pretty(session).context("не удалось сериализовать сессию")?;
    fs::write(path, raw).with_context(|| format!("не удалось записать {}", path.display()))
}

pub fn remove_session(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}
