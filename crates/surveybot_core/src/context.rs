use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use tokio::sync::oneshot;

use crate::api::WikiApi;
use crate::config::{Credentials, Settings, SurveyConfig};
use crate::content::TransclusionCounter;
use crate::editor::EditApplier;
use crate::replica::{EditorCountLookup, PageIdCache};

/// Everything an event handler needs, built once at startup.
pub struct BotContext {
    pub settings: Settings,
    pub survey: SurveyConfig,
    pub bot_identity: Option<String>,
    pub api: Arc<dyn WikiApi>,
    pub editor: EditApplier,
    pub counter: TransclusionCounter,
    pub page_ids: PageIdCache,
    pub editor_counts: Option<Arc<dyn EditorCountLookup>>,
    locks: CategoryLocks,
}

impl BotContext {
    pub fn new(
        settings: Settings,
        survey: SurveyConfig,
        api: Arc<dyn WikiApi>,
        credentials: Option<Credentials>,
    ) -> Result<Self> {
        let counter = TransclusionCounter::new(&survey.survey_root)?;
        let bot_identity = settings.bot_identity(credentials.as_ref());
        let editor = EditApplier::new(api.clone(), credentials, settings.bot.dry_run);
        let locks = CategoryLocks::new(settings.bot.serialize_categories);
        Ok(Self {
            settings,
            survey,
            bot_identity,
            api,
            editor,
            counter,
            page_ids: PageIdCache::default(),
            editor_counts: None,
            locks,
        })
    }

    pub fn with_page_ids(mut self, page_ids: PageIdCache) -> Self {
        self.page_ids = page_ids;
        self
    }

    pub fn with_editor_counts(mut self, lookup: Arc<dyn EditorCountLookup>) -> Self {
        self.editor_counts = Some(lookup);
        self
    }

    /// Configured categories plus the sentinel ones.
    pub fn accepts_category(&self, category: &str) -> bool {
        self.survey.categories.iter().any(|item| item == category)
            || self
                .settings
                .bot
                .extra_categories
                .iter()
                .any(|item| item == category)
    }

    /// Take the next place in line for `categories` without waiting.
    pub fn reserve_categories(&self, categories: &[&str]) -> CategoryTurn {
        self.locks.reserve(categories)
    }

    pub async fn lock_categories(&self, categories: &[&str]) -> CategoryGuard {
        self.locks.reserve(categories).acquire().await
    }
}

/// Per-category queues of operations, in the order they were reserved.
///
/// Every reservation waits for the one reserved just before it on each of
/// its categories. When disabled, operations on the same category may
/// interleave their read and write steps and the later write wins.
pub struct CategoryLocks {
    enabled: bool,
    tails: Mutex<HashMap<String, oneshot::Receiver<()>>>,
}

impl CategoryLocks {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            tails: Mutex::new(HashMap::new()),
        }
    }

    /// Reservations are made under one lock, so a turn only ever waits on
    /// earlier turns and two moves in opposite directions cannot deadlock.
    pub fn reserve(&self, categories: &[&str]) -> CategoryTurn {
        if !self.enabled {
            return CategoryTurn::default();
        }
        let mut names: Vec<&str> = categories.to_vec();
        names.sort_unstable();
        names.dedup();

        let mut tails = self.tails.lock().unwrap_or_else(PoisonError::into_inner);
        let mut turn = CategoryTurn::default();
        for name in names {
            let (release, done) = oneshot::channel();
            if let Some(previous) = tails.insert(name.to_string(), done) {
                turn.waits.push(previous);
            }
            turn.releases.push(release);
        }
        turn
    }
}

/// A reserved place in the queues of one or more categories.
#[derive(Debug, Default)]
pub struct CategoryTurn {
    waits: Vec<oneshot::Receiver<()>>,
    releases: Vec<oneshot::Sender<()>>,
}

impl CategoryTurn {
    /// Wait until every earlier holder of these categories is done.
    pub async fn acquire(self) -> CategoryGuard {
        for previous in self.waits {
            // Dropping the sender releases the turn; the error is the signal.
            let _ = previous.await;
        }
        CategoryGuard {
            releases: self.releases,
        }
    }
}

/// Held for the whole read-then-write sequence; dropping it lets the next
/// reservation run.
#[derive(Debug)]
pub struct CategoryGuard {
    releases: Vec<oneshot::Sender<()>>,
}

impl CategoryGuard {
    /// Number of category queues held.
    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }
}
