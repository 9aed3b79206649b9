use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{ForumClientError, ForumClientResult};
use crate::models::{Comment, NewComment, NewPost, Post, PostUpdate, VoteDirection, VoteReceipt};
use crate::remote::RemoteClient;

pub(crate) fn sample_post(id: i64, score: i64, author_id: i64) -> Post {
    Post {
        id,
        title: format!("post {id}"),
        body: format!("body {id}"),
        score,
        author_id,
        author_name: format!("user{author_id}"),
        created_at: None,
    }
}

pub(crate) fn sample_comment(id: i64, post_id: i64) -> Comment {
    Comment {
        id,
        post_id,
        body: format!("comment {id}"),
        author_id: 1,
        author_name: "user1".to_string(),
        created_at: None,
        replies: Vec::new(),
    }
}

#[derive(Clone)]
pub(crate) struct FakeRemote {
    acting_user_id: i64,
    posts: Arc<Mutex<Vec<Post>>>,
    comments: Arc<Mutex<Vec<Comment>>>,
    vote_reply: Arc<Mutex<ForumClientResult<VoteReceipt>>>,
    comments_failure: Arc<Mutex<Option<ForumClientError>>>,
    failure: Arc<Mutex<Option<ForumClientError>>>,
    votes: Arc<Mutex<Vec<(i64, VoteDirection)>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeRemote {
    pub(crate) fn new() -> Self {
        Self::acting_as(1)
    }

    pub(crate) fn acting_as(user_id: i64) -> Self {
        Self {
            acting_user_id: user_id,
            posts: Arc::new(Mutex::new(Vec::new())),
            comments: Arc::new(Mutex::new(Vec::new())),
            vote_reply: Arc::new(Mutex::new(Ok(VoteReceipt::default()))),
            comments_failure: Arc::new(Mutex::new(None)),
            failure: Arc::new(Mutex::new(None)),
            votes: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn with_posts(posts: Vec<Post>) -> Self {
        let remote = Self::new();
        remote.set_posts(posts);
        remote
    }

    pub(crate) fn set_posts(&self, posts: Vec<Post>) {
        *self.posts.lock().expect("posts mutex poisoned") = posts;
    }

    pub(crate) fn set_comments(&self, comments: Vec<Comment>) {
        *self.comments.lock().expect("comments mutex poisoned") = comments;
    }

    pub(crate) fn set_vote_reply(&self, reply: ForumClientResult<VoteReceipt>) {
        *self.vote_reply.lock().expect("vote_reply mutex poisoned") = reply;
    }

    pub(crate) fn fail_comments_with(&self, error: ForumClientError) {
        *self
            .comments_failure
            .lock()
            .expect("comments_failure mutex poisoned") = Some(error);
    }

    pub(crate) fn fail_with(&self, error: ForumClientError) {
        *self.failure.lock().expect("failure mutex poisoned") = Some(error);
    }

    pub(crate) fn recover(&self) {
        *self.failure.lock().expect("failure mutex poisoned") = None;
    }

    pub(crate) fn recorded_votes(&self) -> Vec<(i64, VoteDirection)> {
        self.votes.lock().expect("votes mutex poisoned").clone()
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls mutex poisoned").clone()
    }

    fn record(&self, call: impl Into<String>) -> ForumClientResult<()> {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .push(call.into());
        match self.failure.lock().expect("failure mutex poisoned").clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteClient for FakeRemote {
    async fn fetch_feed(&self) -> ForumClientResult<Vec<Post>> {
        self.record("fetch_feed")?;
        Ok(self.posts.lock().expect("posts mutex poisoned").clone())
    }

    async fn fetch_popular(&self) -> ForumClientResult<Vec<Post>> {
        self.record("fetch_popular")?;
        let mut posts = self.posts.lock().expect("posts mutex poisoned").clone();
        posts.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(posts)
    }

    async fn fetch_user_posts(&self, user_id: i64) -> ForumClientResult<Vec<Post>> {
        self.record(format!("fetch_user_posts:{user_id}"))?;
        Ok(self
            .posts
            .lock()
            .expect("posts mutex poisoned")
            .iter()
            .filter(|post| post.author_id == user_id)
            .cloned()
            .collect())
    }

    async fn fetch_post(&self, id: i64) -> ForumClientResult<Post> {
        self.record(format!("fetch_post:{id}"))?;
        self.posts
            .lock()
            .expect("posts mutex poisoned")
            .iter()
            .find(|post| post.id == id)
            .cloned()
            .ok_or(ForumClientError::NotFound)
    }

    async fn fetch_comments(&self, post_id: i64) -> ForumClientResult<Vec<Comment>> {
        self.record(format!("fetch_comments:{post_id}"))?;
        if let Some(err) = self
            .comments_failure
            .lock()
            .expect("comments_failure mutex poisoned")
            .clone()
        {
            return Err(err);
        }
        Ok(self
            .comments
            .lock()
            .expect("comments mutex poisoned")
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn submit_vote(
        &self,
        post_id: i64,
        direction: VoteDirection,
    ) -> ForumClientResult<VoteReceipt> {
        self.record(format!("submit_vote:{post_id}"))?;
        self.votes
            .lock()
            .expect("votes mutex poisoned")
            .push((post_id, direction));
        self.vote_reply
            .lock()
            .expect("vote_reply mutex poisoned")
            .clone()
    }

    async fn create_post(&self, input: &NewPost) -> ForumClientResult<Post> {
        self.record("create_post")?;
        let mut posts = self.posts.lock().expect("posts mutex poisoned");
        let id = posts.iter().map(|post| post.id).max().unwrap_or(0) + 1;
        let post = Post {
            id,
            title: input.title.clone(),
            body: input.body.clone(),
            score: 0,
            author_id: self.acting_user_id,
            author_name: String::new(),
            created_at: None,
        };
        posts.insert(0, post.clone());
        Ok(post)
    }

    async fn update_post(&self, id: i64, update: &PostUpdate) -> ForumClientResult<Post> {
        self.record(format!("update_post:{id}"))?;
        let mut posts = self.posts.lock().expect("posts mutex poisoned");
        let post = posts
            .iter_mut()
            .find(|post| post.id == id)
            .ok_or(ForumClientError::NotFound)?;
        if post.author_id != self.acting_user_id {
            return Err(ForumClientError::Forbidden);
        }
        post.title = update.title.clone();
        post.body = update.body.clone();
        Ok(post.clone())
    }

    async fn delete_post(&self, id: i64) -> ForumClientResult<()> {
        self.record(format!("delete_post:{id}"))?;
        let mut posts = self.posts.lock().expect("posts mutex poisoned");
        let before = posts.len();
        posts.retain(|post| post.id != id);
        if posts.len() == before {
            return Err(ForumClientError::NotFound);
        }
        Ok(())
    }

    async fn create_comment(
        &self,
        post_id: i64,
        input: &NewComment,
    ) -> ForumClientResult<Comment> {
        self.record(format!("create_comment:{post_id}"))?;
        let mut comments = self.comments.lock().expect("comments mutex poisoned");
        let comment = Comment {
            id: comments.len() as i64 + 1,
            post_id,
            body: input.body.clone(),
            author_id: self.acting_user_id,
            author_name: String::new(),
            created_at: None,
            replies: Vec::new(),
        };
        comments.insert(0, comment.clone());
        Ok(comment)
    }
}
