//! Keeps category pages and their counters in step with proposal pages.
//!
//! Every step reads the page fresh, computes the new text with the pure
//! functions in [`crate::content`], and hands the result to the
//! [`crate::editor::EditApplier`]. A failed read aborts the remaining steps of
//! the operation. When a category page write is abandoned, the counter pages
//! that depend on it are left as they were.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::content::{
    HeaderCheck, add_transclusion, correct_proposal_header, remove_transclusion,
    rename_transclusion, transclusion_line,
};
use crate::context::{BotContext, CategoryGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Updated,
    Unchanged,
    /// The page write was given up; dependent writes were skipped.
    Abandoned,
}

/// Why a proposal leaves a category page; drives the edit summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalReason {
    Deleted,
    MovedTo { target: String, label: String },
}

impl RemovalReason {
    pub fn summary(&self, full_title: &str, proposal: &str) -> String {
        match self {
            Self::Deleted => format!("Proposal \"[[{full_title}|{proposal}]]\" was deleted."),
            Self::MovedTo { target, label } => {
                format!("\"{proposal}\" moved to [[{target}|{label}]]")
            }
        }
    }
}

pub struct Reconciler<'a> {
    ctx: &'a BotContext,
    in_turn: bool,
}

impl<'a> Reconciler<'a> {
    /// Each operation queues for its categories itself.
    pub fn new(ctx: &'a BotContext) -> Self {
        Self { ctx, in_turn: false }
    }

    /// The caller already holds the categories' turn.
    pub fn in_turn(ctx: &'a BotContext) -> Self {
        Self { ctx, in_turn: true }
    }

    async fn lock(&self, categories: &[&str]) -> Option<CategoryGuard> {
        if self.in_turn {
            return None;
        }
        Some(self.ctx.lock_categories(categories).await)
    }

    pub async fn add_proposal(&self, category: &str, proposal: &str) -> Result<Change> {
        let _guard = self.lock(&[category]).await;
        self.add_unlocked(category, proposal).await
    }

    pub async fn remove_proposal(
        &self,
        category: &str,
        proposal: &str,
        reason: &RemovalReason,
    ) -> Result<Change> {
        let _guard = self.lock(&[category]).await;
        self.remove_unlocked(category, proposal, reason).await
    }

    pub async fn move_proposal(
        &self,
        old_category: &str,
        old_proposal: &str,
        new_category: &str,
        new_proposal: &str,
    ) -> Result<Change> {
        let _guard = self.lock(&[old_category, new_category]).await;
        let root = &self.ctx.survey.survey_root;
        let new_full_title = format!("{root}/{new_category}/{new_proposal}");
        let reason = RemovalReason::MovedTo {
            target: new_full_title,
            label: format!("{new_category}/{new_proposal}"),
        };

        if old_category == new_category {
            self.correct_header(new_category, new_proposal).await?;
            return self
                .rename_unlocked(new_category, old_proposal, new_proposal, &reason)
                .await;
        }

        self.remove_unlocked(old_category, old_proposal, &reason)
            .await?;
        self.correct_header(new_category, new_proposal).await?;
        self.add_unlocked(new_category, new_proposal).await
    }

    /// Make the header template on a proposal page carry the proposal's
    /// current name.
    pub async fn correct_header(&self, category: &str, proposal: &str) -> Result<Change> {
        let path = format!("{}/{category}/{proposal}", self.ctx.survey.survey_root);
        let content = self.fetch(&path).await?;
        let template = self.ctx.settings.header_template();

        match correct_proposal_header(template, &content, proposal) {
            HeaderCheck::Valid => {
                debug!(page = %path, "proposal header is valid");
                Ok(Change::Unchanged)
            }
            HeaderCheck::Corrected(corrected) => {
                info!(page = %path, proposal, "correcting proposal header template");
                let summary =
                    format!("Correcting Proposal header template for [[{path}|{proposal}]]");
                if self.ctx.editor.apply(&path, &corrected, &summary).await.is_abandoned() {
                    return Ok(Change::Abandoned);
                }
                Ok(Change::Updated)
            }
            HeaderCheck::Missing => {
                warn!(page = %path, "no proposal header template found; leaving the page as is");
                Ok(Change::Unchanged)
            }
        }
    }

    async fn add_unlocked(&self, category: &str, proposal: &str) -> Result<Change> {
        let root = &self.ctx.survey.survey_root;
        let page = self.ctx.survey.category_path(category);
        info!(category, proposal, "transcluding proposal");

        let content = self.fetch(&page).await?;
        let line = transclusion_line(root, category, proposal);
        let Some(updated) = add_transclusion(&content, &line) else {
            info!(category, proposal, "already transcluded");
            return Ok(Change::Unchanged);
        };

        let summary = format!("Transcluding proposal \"[[{page}/{proposal}|{proposal}]]\"");
        if self.ctx.editor.apply(&page, &updated, &summary).await.is_abandoned() {
            warn!(category, proposal, "category page not saved; counts left as they are");
            return Ok(Change::Abandoned);
        }
        if self.ctx.settings.is_counted(category) {
            self.write_proposal_count(category, &updated).await;
        }
        if self.ctx.settings.bot.editor_counts {
            self.write_editor_count(category).await;
        }
        Ok(Change::Updated)
    }

    async fn remove_unlocked(
        &self,
        category: &str,
        proposal: &str,
        reason: &RemovalReason,
    ) -> Result<Change> {
        let root = &self.ctx.survey.survey_root;
        let page = self.ctx.survey.category_path(category);
        let full_title = format!("{page}/{proposal}");
        info!(category, proposal, "removing transclusion");

        let content = self.fetch(&page).await?;
        let line = transclusion_line(root, category, proposal);
        let Some(updated) = remove_transclusion(&content, &line) else {
            info!(category, proposal, "not transcluded; nothing to remove");
            return Ok(Change::Unchanged);
        };

        let counted = self.ctx.settings.is_counted(category);
        if counted {
            self.write_proposal_count(category, &updated).await;
        }
        let summary = reason.summary(&full_title, proposal);
        if self.ctx.editor.apply(&page, &updated, &summary).await.is_abandoned() {
            if counted {
                warn!(category, proposal, "category page not saved; restoring proposal count");
                self.write_proposal_count(category, &content).await;
            }
            return Ok(Change::Abandoned);
        }
        Ok(Change::Updated)
    }

    async fn rename_unlocked(
        &self,
        category: &str,
        old_proposal: &str,
        new_proposal: &str,
        reason: &RemovalReason,
    ) -> Result<Change> {
        let root = &self.ctx.survey.survey_root;
        let page = self.ctx.survey.category_path(category);
        let content = self.fetch(&page).await?;
        let old_line = transclusion_line(root, category, old_proposal);
        let new_line = transclusion_line(root, category, new_proposal);

        let Some(updated) = rename_transclusion(&content, &old_line, &new_line) else {
            info!(
                category,
                old_proposal, "old transclusion not found; transcluding the new title"
            );
            return self.add_unlocked(category, new_proposal).await;
        };

        let summary = reason.summary(&format!("{page}/{old_proposal}"), old_proposal);
        if self.ctx.editor.apply(&page, &updated, &summary).await.is_abandoned() {
            return Ok(Change::Abandoned);
        }
        let counter = &self.ctx.counter;
        if self.ctx.settings.is_counted(category) && counter.count(&content) != counter.count(&updated) {
            self.write_proposal_count(category, &updated).await;
        }
        Ok(Change::Updated)
    }

    async fn write_proposal_count(&self, category: &str, content: &str) {
        let survey = &self.ctx.survey;
        let count = self.ctx.counter.count(content);
        info!(category, count, "updating proposal count");
        let title = survey.counts_path(&self.ctx.settings.bot.counts_subpage, category);
        let summary = format!(
            "Updating proposal count for [[{}|{category}]] ({count})",
            survey.category_path(category)
        );
        self.ctx
            .editor
            .apply(&title, &count.to_string(), &summary)
            .await;
    }

    async fn write_editor_count(&self, category: &str) {
        let Some(lookup) = &self.ctx.editor_counts else {
            debug!(category, "editor counts enabled without a replica; skipping");
            return;
        };
        let Some(page_id) = self.ctx.page_ids.get(category) else {
            warn!(category, "no cached page id; skipping editor count");
            return;
        };
        let count = match lookup.distinct_editors(page_id).await {
            Ok(count) => count,
            Err(error) => {
                warn!(category, error = %format!("{error:#}"), "editor count lookup failed");
                return;
            }
        };

        info!(category, count, "updating editor count");
        let survey = &self.ctx.survey;
        let title = survey.counts_path(&self.ctx.settings.bot.editor_counts_subpage, category);
        let summary = format!(
            "Updating editor count for [[{}|{category}]] ({count})",
            survey.category_path(category)
        );
        self.ctx
            .editor
            .apply(&title, &count.to_string(), &summary)
            .await;
    }

    async fn fetch(&self, title: &str) -> Result<String> {
        self.ctx
            .api
            .read_page(title)
            .await
            .with_context(|| format!("failed to read page {title}"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::config::{Settings, SurveyConfig};
    use crate::content::count_transclusions;
    use crate::fake::FakeWiki;
    use crate::replica::{EditorCountLookup, PageIdCache, build_page_id_cache, PageIdLookup};

    const HEADER: &str = "Community Wishlist Survey/Proposal header";

    fn survey() -> SurveyConfig {
        SurveyConfig {
            survey_root: "R".to_string(),
            categories: vec!["Cat".to_string(), "NewCat".to_string()],
        }
    }

    fn context(wiki: &Arc<FakeWiki>) -> BotContext {
        BotContext::new(Settings::default(), survey(), wiki.clone(), None).expect("context")
    }

    fn header(proposal: &str) -> String {
        format!("{{{{:{HEADER}|1={proposal}}}}}\nBody")
    }

    #[tokio::test]
    async fn add_appends_and_writes_count() {
        let wiki = Arc::new(FakeWiki::new().with_page("R/Cat", "{{:R/Cat/Alpha}}"));
        let ctx = context(&wiki);

        let change = Reconciler::new(&ctx)
            .add_proposal("Cat", "Beta")
            .await
            .expect("add");
        assert_eq!(change, Change::Updated);
        assert_eq!(
            wiki.page("R/Cat").as_deref(),
            Some("{{:R/Cat/Alpha}}\n{{:R/Cat/Beta}}")
        );
        assert_eq!(wiki.page("R/Proposal counts/Cat").as_deref(), Some("2"));
        assert_eq!(wiki.edited_titles(), vec!["R/Cat", "R/Proposal counts/Cat"]);

        let edits = wiki.edits();
        assert_eq!(edits[0].summary, "Transcluding proposal \"[[R/Cat/Beta|Beta]]\"");
        assert_eq!(
            edits[1].summary,
            "Updating proposal count for [[R/Cat|Cat]] (2)"
        );
    }

    #[tokio::test]
    async fn add_twice_matches_add_once() {
        let wiki = Arc::new(FakeWiki::new().with_page("R/Cat", "{{:R/Cat/Alpha}}"));
        let ctx = context(&wiki);
        let reconciler = Reconciler::new(&ctx);

        reconciler.add_proposal("Cat", "Beta").await.expect("first");
        let after_once = wiki.page("R/Cat");
        let change = reconciler.add_proposal("Cat", "Beta").await.expect("second");

        assert_eq!(change, Change::Unchanged);
        assert_eq!(wiki.page("R/Cat"), after_once);
        assert_eq!(wiki.edits().len(), 2);
    }

    #[tokio::test]
    async fn remove_writes_count_then_category() {
        let wiki = Arc::new(
            FakeWiki::new().with_page("R/Cat", "{{:R/Cat/Alpha}}\n{{:R/Cat/Beta}}"),
        );
        let ctx = context(&wiki);

        Reconciler::new(&ctx)
            .remove_proposal("Cat", "Alpha", &RemovalReason::Deleted)
            .await
            .expect("remove");
        assert_eq!(wiki.page("R/Cat").as_deref(), Some("\n{{:R/Cat/Beta}}"));
        assert_eq!(wiki.page("R/Proposal counts/Cat").as_deref(), Some("1"));
        assert_eq!(wiki.edited_titles(), vec!["R/Proposal counts/Cat", "R/Cat"]);
        assert_eq!(
            wiki.edits()[1].summary,
            "Proposal \"[[R/Cat/Alpha|Alpha]]\" was deleted."
        );
    }

    #[tokio::test]
    async fn remove_absent_proposal_writes_nothing() {
        let wiki = Arc::new(FakeWiki::new().with_page("R/Cat", "{{:R/Cat/Alpha}}"));
        let ctx = context(&wiki);

        let change = Reconciler::new(&ctx)
            .remove_proposal("Cat", "Ghost", &RemovalReason::Deleted)
            .await
            .expect("remove");
        assert_eq!(change, Change::Unchanged);
        assert!(wiki.edits().is_empty());
    }

    #[tokio::test]
    async fn uncounted_category_skips_counts_page() {
        let wiki = Arc::new(FakeWiki::new().with_page("R/Untranslated", ""));
        let ctx = context(&wiki);

        Reconciler::new(&ctx)
            .add_proposal("Untranslated", "Alpha")
            .await
            .expect("add");
        assert_eq!(wiki.edited_titles(), vec!["R/Untranslated"]);
    }

    #[tokio::test]
    async fn read_failure_aborts_without_writes() {
        let wiki = Arc::new(FakeWiki::new().with_page("R/Cat", "{{:R/Cat/Alpha}}"));
        wiki.fail_reads_of("R/Cat");
        let ctx = context(&wiki);

        let error = Reconciler::new(&ctx)
            .add_proposal("Cat", "Beta")
            .await
            .expect_err("read fails");
        assert!(format!("{error:#}").contains("failed to read page R/Cat"));
        assert!(wiki.edits().is_empty());
    }

    #[tokio::test]
    async fn move_within_category_renames_in_place() {
        let wiki = Arc::new(
            FakeWiki::new()
                .with_page("R/Cat", "{{:R/Cat/Alpha}}\n{{:R/Cat/Beta}}\n{{:R/Cat/Gamma}}")
                .with_page("R/Cat/Better", &header("Beta")),
        );
        let ctx = context(&wiki);

        Reconciler::new(&ctx)
            .move_proposal("Cat", "Beta", "Cat", "Better")
            .await
            .expect("move");
        assert_eq!(
            wiki.page("R/Cat").as_deref(),
            Some("{{:R/Cat/Alpha}}\n{{:R/Cat/Better}}\n{{:R/Cat/Gamma}}")
        );
        assert_eq!(wiki.page("R/Cat/Better"), Some(header("Better")));
        assert_eq!(wiki.edited_titles(), vec!["R/Cat/Better", "R/Cat"]);
        assert_eq!(
            wiki.edits()[1].summary,
            "\"Beta\" moved to [[R/Cat/Better|Cat/Better]]"
        );
    }

    #[tokio::test]
    async fn move_across_categories_removes_corrects_and_adds() {
        let wiki = Arc::new(
            FakeWiki::new()
                .with_page("R/Cat", "{{:R/Cat/Alpha}}\n{{:R/Cat/Beta}}")
                .with_page("R/NewCat", "{{:R/NewCat/Gamma}}")
                .with_page("R/NewCat/Beta", &header("Beta")),
        );
        let ctx = context(&wiki);

        Reconciler::new(&ctx)
            .move_proposal("Cat", "Beta", "NewCat", "Beta")
            .await
            .expect("move");

        assert_eq!(wiki.page("R/Cat").as_deref(), Some("{{:R/Cat/Alpha}}"));
        assert_eq!(
            wiki.page("R/NewCat").as_deref(),
            Some("{{:R/NewCat/Gamma}}\n{{:R/NewCat/Beta}}")
        );
        assert_eq!(
            wiki.edited_titles(),
            vec![
                "R/Proposal counts/Cat",
                "R/Cat",
                "R/NewCat",
                "R/Proposal counts/NewCat",
            ]
        );
        assert_eq!(
            wiki.reads(),
            vec!["R/Cat", "R/NewCat/Beta", "R/NewCat"]
        );
    }

    #[tokio::test]
    async fn move_with_renamed_proposal_fixes_header_first() {
        let wiki = Arc::new(
            FakeWiki::new()
                .with_page("R/Cat", "{{:R/Cat/Beta}}")
                .with_page("R/NewCat", "")
                .with_page("R/NewCat/Renamed", &header("Beta")),
        );
        let ctx = context(&wiki);

        Reconciler::new(&ctx)
            .move_proposal("Cat", "Beta", "NewCat", "Renamed")
            .await
            .expect("move");
        assert_eq!(wiki.page("R/NewCat/Renamed"), Some(header("Renamed")));
        let titles = wiki.edited_titles();
        let header_at = titles.iter().position(|title| title == "R/NewCat/Renamed");
        let add_at = titles.iter().position(|title| title == "R/NewCat");
        assert!(header_at < add_at);
    }

    #[tokio::test]
    async fn rename_without_old_line_adds_new_one() {
        let wiki = Arc::new(
            FakeWiki::new()
                .with_page("R/Cat", "{{:R/Cat/Alpha}}")
                .with_page("R/Cat/Better", &header("Better")),
        );
        let ctx = context(&wiki);

        Reconciler::new(&ctx)
            .move_proposal("Cat", "Beta", "Cat", "Better")
            .await
            .expect("move");
        assert_eq!(
            wiki.page("R/Cat").as_deref(),
            Some("{{:R/Cat/Alpha}}\n{{:R/Cat/Better}}")
        );
        assert_eq!(wiki.page("R/Proposal counts/Cat").as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn missing_header_still_transcludes() {
        let wiki = Arc::new(
            FakeWiki::new()
                .with_page("R/Cat", "{{:R/Cat/Beta}}")
                .with_page("R/NewCat", "")
                .with_page("R/NewCat/Beta", "No header here"),
        );
        let ctx = context(&wiki);

        Reconciler::new(&ctx)
            .move_proposal("Cat", "Beta", "NewCat", "Beta")
            .await
            .expect("move");
        assert_eq!(wiki.page("R/NewCat/Beta").as_deref(), Some("No header here"));
        assert_eq!(wiki.page("R/NewCat").as_deref(), Some("{{:R/NewCat/Beta}}"));
    }

    #[tokio::test]
    async fn abandoned_add_leaves_counts_alone() {
        let wiki = Arc::new(FakeWiki::new().with_page("R/Cat", "{{:R/Cat/Alpha}}"));
        wiki.fail_next_edit(crate::api::WikiApiError::api("protectedpage", "Protected."));
        let mut settings = Settings::default();
        settings.bot.editor_counts = true;
        let ctx = BotContext::new(settings, survey(), wiki.clone(), None)
            .expect("context")
            .with_editor_counts(Arc::new(FixedReplica));

        let change = Reconciler::new(&ctx)
            .add_proposal("Cat", "Beta")
            .await
            .expect("add");
        assert_eq!(change, Change::Abandoned);
        assert_eq!(wiki.page("R/Cat").as_deref(), Some("{{:R/Cat/Alpha}}"));
        assert!(wiki.page("R/Proposal counts/Cat").is_none());
        assert!(wiki.page("R/Editor counts/Cat").is_none());
        assert!(wiki.edits().is_empty());
    }

    #[tokio::test]
    async fn abandoned_remove_restores_the_count() {
        let wiki = Arc::new(
            FakeWiki::new()
                .with_page("R/Cat", "{{:R/Cat/Alpha}}\n{{:R/Cat/Beta}}")
                .with_page("R/Proposal counts/Cat", "2"),
        );
        wiki.fail_edits_of("R/Cat", "protectedpage", "Protected.");
        let ctx = context(&wiki);

        let change = Reconciler::new(&ctx)
            .remove_proposal("Cat", "Alpha", &RemovalReason::Deleted)
            .await
            .expect("remove");
        assert_eq!(change, Change::Abandoned);
        assert_eq!(
            wiki.page("R/Cat").as_deref(),
            Some("{{:R/Cat/Alpha}}\n{{:R/Cat/Beta}}")
        );
        assert_eq!(wiki.page("R/Proposal counts/Cat").as_deref(), Some("2"));
        let counts: Vec<_> = wiki.edits().into_iter().map(|edit| edit.content).collect();
        assert_eq!(counts, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn abandoned_header_correction_is_reported() {
        let wiki = Arc::new(FakeWiki::new().with_page("R/Cat/Better", &header("Beta")));
        wiki.fail_edits_of("R/Cat/Better", "protectedpage", "Protected.");
        let ctx = context(&wiki);

        let change = Reconciler::new(&ctx)
            .correct_header("Cat", "Better")
            .await
            .expect("header");
        assert_eq!(change, Change::Abandoned);
        assert_eq!(wiki.page("R/Cat/Better"), Some(header("Beta")));
    }

    #[tokio::test]
    async fn in_turn_reconciler_does_not_queue_again() {
        let wiki = Arc::new(FakeWiki::new().with_page("R/Cat", ""));
        let ctx = context(&wiki);

        let _guard = ctx.lock_categories(&["Cat"]).await;
        let change = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            Reconciler::in_turn(&ctx).add_proposal("Cat", "Alpha"),
        )
        .await
        .expect("no self-deadlock")
        .expect("add");
        assert_eq!(change, Change::Updated);
        assert_eq!(wiki.page("R/Cat").as_deref(), Some("{{:R/Cat/Alpha}}"));
    }

    struct FixedReplica;

    #[async_trait]
    impl PageIdLookup for FixedReplica {
        async fn page_id(&self, _title: &str) -> anyhow::Result<Option<i64>> {
            Ok(Some(42))
        }
    }

    #[async_trait]
    impl EditorCountLookup for FixedReplica {
        async fn distinct_editors(&self, page_id: i64) -> anyhow::Result<u64> {
            assert_eq!(page_id, 42);
            Ok(7)
        }
    }

    #[tokio::test]
    async fn editor_count_written_when_enabled() {
        let wiki = Arc::new(FakeWiki::new().with_page("R/Cat", ""));
        let mut settings = Settings::default();
        settings.bot.editor_counts = true;
        let page_ids: PageIdCache = build_page_id_cache(&FixedReplica, &survey())
            .await
            .expect("cache");
        let ctx = BotContext::new(settings, survey(), wiki.clone(), None)
            .expect("context")
            .with_page_ids(page_ids)
            .with_editor_counts(Arc::new(FixedReplica));

        Reconciler::new(&ctx)
            .add_proposal("Cat", "Alpha")
            .await
            .expect("add");
        assert_eq!(wiki.page("R/Editor counts/Cat").as_deref(), Some("7"));
        assert_eq!(
            wiki.edits()[2].summary,
            "Updating editor count for [[R/Cat|Cat]] (7)"
        );
    }

    async fn add_concurrently(ctx: Arc<BotContext>) {
        let first = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                Reconciler::new(&ctx).add_proposal("Cat", "Beta").await
            })
        };
        let second = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                Reconciler::new(&ctx).add_proposal("Cat", "Gamma").await
            })
        };
        first.await.expect("join").expect("first add");
        second.await.expect("join").expect("second add");
    }

    #[tokio::test]
    async fn serialized_category_keeps_both_additions() {
        let wiki = Arc::new(
            FakeWiki::new()
                .with_page("R/Cat", "{{:R/Cat/Alpha}}")
                .with_read_delay(std::time::Duration::from_millis(20)),
        );
        add_concurrently(Arc::new(context(&wiki))).await;

        let content = wiki.page("R/Cat").expect("page");
        assert!(content.contains("{{:R/Cat/Beta}}"));
        assert!(content.contains("{{:R/Cat/Gamma}}"));
        assert_eq!(wiki.page("R/Proposal counts/Cat").as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn unserialized_category_loses_an_update() {
        let wiki = Arc::new(
            FakeWiki::new()
                .with_page("R/Cat", "{{:R/Cat/Alpha}}")
                .with_read_delay(std::time::Duration::from_millis(20)),
        );
        let mut settings = Settings::default();
        settings.bot.serialize_categories = false;
        let ctx = BotContext::new(settings, survey(), wiki.clone(), None).expect("context");
        add_concurrently(Arc::new(ctx)).await;

        let content = wiki.page("R/Cat").expect("page");
        assert_eq!(count_transclusions("R", &content).expect("count"), 2);
    }
}
