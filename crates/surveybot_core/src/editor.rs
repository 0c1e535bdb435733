use std::sync::Arc;

use similar::TextDiff;
use tracing::{error, info, warn};

use crate::api::{ApiErrorKind, WikiApi, error_kind};
use crate::config::Credentials;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Saved,
    /// Dry run: the change was logged, not written.
    Previewed,
    Abandoned,
}

impl EditOutcome {
    pub fn is_abandoned(self) -> bool {
        self == Self::Abandoned
    }
}

/// Writes pages with at most one retry after a token refresh or re-login.
///
/// Failures never propagate: they are logged and reported as
/// [`EditOutcome::Abandoned`], callers carry on with their next step.
pub struct EditApplier {
    api: Arc<dyn WikiApi>,
    credentials: Option<Credentials>,
    dry_run: bool,
}

impl EditApplier {
    pub fn new(api: Arc<dyn WikiApi>, credentials: Option<Credentials>, dry_run: bool) -> Self {
        Self {
            api,
            credentials,
            dry_run,
        }
    }

    pub async fn apply(&self, title: &str, content: &str, summary: &str) -> EditOutcome {
        if self.dry_run {
            self.preview(title, content, summary).await;
            return EditOutcome::Previewed;
        }

        info!(title, "attempting edit");
        let error = match self.api.edit_page(title, content, summary).await {
            Ok(()) => return EditOutcome::Saved,
            Err(error) => error,
        };

        match error_kind(&error) {
            ApiErrorKind::BadToken => {
                info!(title, "edit token invalid, refreshing");
                if let Err(error) = self.api.refresh_token().await {
                    error!(title, error = %format!("{error:#}"), "token refresh failed");
                    return EditOutcome::Abandoned;
                }
                self.retry(title, content, summary).await
            }
            ApiErrorKind::SessionLost => {
                info!(title, "login session died, logging in again");
                let Some(credentials) = &self.credentials else {
                    error!(title, "no credentials available to restore the session");
                    return EditOutcome::Abandoned;
                };
                if let Err(error) = self
                    .api
                    .login(&credentials.username, &credentials.password)
                    .await
                {
                    error!(title, error = %format!("{error:#}"), "login failed");
                    return EditOutcome::Abandoned;
                }
                self.retry(title, content, summary).await
            }
            _ => {
                error!(title, error = %format!("{error:#}"), "unhandled error when editing");
                EditOutcome::Abandoned
            }
        }
    }

    async fn retry(&self, title: &str, content: &str, summary: &str) -> EditOutcome {
        match self.api.edit_page(title, content, summary).await {
            Ok(()) => EditOutcome::Saved,
            Err(error) => {
                error!(title, error = %format!("{error:#}"), "edit retry failed");
                EditOutcome::Abandoned
            }
        }
    }

    async fn preview(&self, title: &str, content: &str, summary: &str) {
        let current = match self.api.read_page(title).await {
            Ok(current) => current,
            Err(error) => {
                warn!(title, error = %format!("{error:#}"), "dry run: could not read current text");
                String::new()
            }
        };
        let diff = TextDiff::from_lines(current.as_str(), content)
            .unified_diff()
            .context_radius(2)
            .header(title, "proposed")
            .to_string();
        info!(title, summary, "dry run, not saving:\n{diff}");
    }
}
