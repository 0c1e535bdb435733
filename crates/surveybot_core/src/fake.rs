//! In-memory wiki for exercising the bot without a network.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::api::{WikiApi, WikiApiError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEdit {
    pub title: String,
    pub content: String,
    pub summary: String,
}

#[derive(Debug, Default)]
struct FakeState {
    pages: BTreeMap<String, String>,
    reads: Vec<String>,
    edits: Vec<RecordedEdit>,
    edit_failures: VecDeque<WikiApiError>,
    failing_reads: BTreeSet<String>,
    failing_edits: BTreeMap<String, (String, String)>,
    token_refreshes: usize,
    logins: usize,
    fail_login: bool,
}

#[derive(Debug, Default)]
pub struct FakeWiki {
    state: Mutex<FakeState>,
    read_delay: Option<Duration>,
}

impl FakeWiki {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, title: &str, content: &str) -> Self {
        self.lock().pages.insert(title.to_string(), content.to_string());
        self
    }

    /// Sleep inside every read so concurrent operations interleave.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn fail_next_edit(&self, error: WikiApiError) {
        self.lock().edit_failures.push_back(error);
    }

    /// Every edit of `title` is refused with the given API error code.
    pub fn fail_edits_of(&self, title: &str, code: &str, info: &str) {
        self.lock()
            .failing_edits
            .insert(title.to_string(), (code.to_string(), info.to_string()));
    }

    pub fn fail_reads_of(&self, title: &str) {
        self.lock().failing_reads.insert(title.to_string());
    }

    pub fn fail_logins(&self) {
        self.lock().fail_login = true;
    }

    pub fn page(&self, title: &str) -> Option<String> {
        self.lock().pages.get(title).cloned()
    }

    pub fn edits(&self) -> Vec<RecordedEdit> {
        self.lock().edits.clone()
    }

    pub fn edited_titles(&self) -> Vec<String> {
        self.lock()
            .edits
            .iter()
            .map(|edit| edit.title.clone())
            .collect()
    }

    pub fn reads(&self) -> Vec<String> {
        self.lock().reads.clone()
    }

    pub fn token_refreshes(&self) -> usize {
        self.lock().token_refreshes
    }

    pub fn logins(&self) -> usize {
        self.lock().logins
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl WikiApi for FakeWiki {
    async fn read_page(&self, title: &str) -> Result<String> {
        let snapshot = {
            let mut state = self.lock();
            state.reads.push(title.to_string());
            if state.failing_reads.contains(title) {
                anyhow::bail!("read of {title} timed out");
            }
            state.pages.get(title).cloned()
        };
        // The text is taken before the delay, like a response still in flight.
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        snapshot.ok_or_else(|| WikiApiError::MissingPage(title.to_string()).into())
    }

    async fn edit_page(&self, title: &str, content: &str, summary: &str) -> Result<()> {
        let mut state = self.lock();
        if let Some(error) = state.edit_failures.pop_front() {
            return Err(error.into());
        }
        if let Some((code, info)) = state.failing_edits.get(title) {
            return Err(WikiApiError::api(code, info).into());
        }
        state.pages.insert(title.to_string(), content.to_string());
        state.edits.push(RecordedEdit {
            title: title.to_string(),
            content: content.to_string(),
            summary: summary.to_string(),
        });
        Ok(())
    }

    async fn refresh_token(&self) -> Result<()> {
        self.lock().token_refreshes += 1;
        Ok(())
    }

    async fn login(&self, _username: &str, _password: &str) -> Result<()> {
        let mut state = self.lock();
        if state.fail_login {
            anyhow::bail!("MediaWiki login failed: Incorrect password");
        }
        state.logins += 1;
        Ok(())
    }
}
