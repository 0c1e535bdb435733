use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, trace};

use crate::context::{BotContext, CategoryTurn};
use crate::reconcile::{Change, Reconciler, RemovalReason};
use crate::title::{ProposalTitle, parse_proposal_title};

/// One message of the recent-changes feed. Only the fields the bot reads.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ChangeEvent {
    #[serde(default)]
    pub wiki: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub user: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub log_type: Option<String>,
    /// An object for moves, but an empty array for some other log types.
    #[serde(default)]
    pub log_params: Option<Value>,
}

impl ChangeEvent {
    pub fn from_json(data: &str) -> Result<Self> {
        Ok(serde_json::from_str(data)?)
    }

    pub fn move_target(&self) -> Option<&str> {
        self.log_params
            .as_ref()
            .and_then(|params| params.get("target"))
            .and_then(Value::as_str)
    }

    fn is_log(&self, log_type: &str) -> bool {
        self.kind == "log" && self.log_type.as_deref() == Some(log_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Add {
        category: String,
        proposal: String,
    },
    Move {
        from: ProposalTitle,
        to: ProposalTitle,
    },
    Remove {
        category: String,
        proposal: String,
        reason: RemovalReason,
    },
}

impl Action {
    /// Category pages the action reads and writes.
    pub fn categories(&self) -> Vec<&str> {
        match self {
            Self::Add { category, .. } | Self::Remove { category, .. } => vec![category.as_str()],
            Self::Move { from, to } => vec![from.category.as_str(), to.category.as_str()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    OtherWiki,
    OutsideSurvey,
    OwnEdit,
    NotAProposal,
    InvalidCategory(String),
    UnhandledKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Act(Action),
    Skip(Skip),
}

/// Decide what, if anything, an event means for the survey. Performs no I/O.
pub fn classify(ctx: &BotContext, event: &ChangeEvent) -> Classification {
    let root = &ctx.survey.survey_root;
    if event.wiki != ctx.settings.wiki_id() {
        trace!(wiki = %event.wiki, "event from another wiki");
        return Classification::Skip(Skip::OtherWiki);
    }
    if !event.title.starts_with(&format!("{root}/")) {
        trace!(title = %event.title, "page outside the survey");
        return Classification::Skip(Skip::OutsideSurvey);
    }
    if ctx.bot_identity.as_deref() == Some(event.user.as_str()) {
        debug!(title = %event.title, "own edit, ignoring");
        return Classification::Skip(Skip::OwnEdit);
    }
    let Some(source) = parse_proposal_title(root, &event.title) else {
        info!(title = %event.title, "non-proposal page edited, ignoring");
        return Classification::Skip(Skip::NotAProposal);
    };
    if !ctx.accepts_category(&source.category) {
        info!(title = %source.full_title, "edit in invalid category");
        return Classification::Skip(Skip::InvalidCategory(source.category));
    }

    if event.kind == "new" {
        info!(category = %source.category, proposal = %source.proposal, "new proposal added");
        return Classification::Act(Action::Add {
            category: source.category,
            proposal: source.proposal,
        });
    }

    if event.is_log("move") {
        let target_title = event.move_target().unwrap_or_default();
        let target = parse_proposal_title(root, target_title)
            .filter(|target| ctx.accepts_category(&target.category));
        return match target {
            Some(target) => {
                info!(
                    from = %source.proposal,
                    from_category = %source.category,
                    to = %target.proposal,
                    to_category = %target.category,
                    "proposal moved"
                );
                Classification::Act(Action::Move {
                    from: source,
                    to: target,
                })
            }
            None => {
                info!(
                    proposal = %source.proposal,
                    category = %source.category,
                    target = target_title,
                    "proposal moved out of the survey"
                );
                Classification::Act(Action::Remove {
                    category: source.category,
                    proposal: source.proposal,
                    reason: RemovalReason::MovedTo {
                        target: target_title.to_string(),
                        label: target_title.to_string(),
                    },
                })
            }
        };
    }

    if event.is_log("delete") {
        info!(
            proposal = %source.proposal,
            category = %source.category,
            "proposal deleted, removing transclusion"
        );
        return Classification::Act(Action::Remove {
            category: source.category,
            proposal: source.proposal,
            reason: RemovalReason::Deleted,
        });
    }

    debug!(title = %event.title, kind = %event.kind, "event kind needs no action");
    Classification::Skip(Skip::UnhandledKind)
}

/// Queue the action behind earlier actions on the same categories. Must be
/// called in event order; the returned turn is redeemed by [`dispatch_in_turn`].
pub fn reserve(ctx: &BotContext, action: &Action) -> CategoryTurn {
    ctx.reserve_categories(&action.categories())
}

pub async fn dispatch(ctx: &BotContext, action: &Action) -> Result<Change> {
    dispatch_in_turn(ctx, action, reserve(ctx, action)).await
}

pub async fn dispatch_in_turn(
    ctx: &BotContext,
    action: &Action,
    turn: CategoryTurn,
) -> Result<Change> {
    let _guard = turn.acquire().await;
    let reconciler = Reconciler::in_turn(ctx);
    match action {
        Action::Add { category, proposal } => reconciler.add_proposal(category, proposal).await,
        Action::Move { from, to } => {
            reconciler
                .move_proposal(&from.category, &from.proposal, &to.category, &to.proposal)
                .await
        }
        Action::Remove {
            category,
            proposal,
            reason,
        } => reconciler.remove_proposal(category, proposal, reason).await,
    }
}

/// Classify and act on one event. Failures end up in the log only.
pub async fn handle_event(ctx: &BotContext, event: &ChangeEvent) {
    let Classification::Act(action) = classify(ctx, event) else {
        return;
    };
    if let Err(error) = dispatch(ctx, &action).await {
        error!(title = %event.title, error = %format!("{error:#}"), "operation aborted");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::config::{Credentials, Settings, SurveyConfig};
    use crate::fake::FakeWiki;

    fn context(wiki: &Arc<FakeWiki>) -> BotContext {
        let credentials = Credentials {
            username: "Survey bot@watcher".to_string(),
            password: "secret".to_string(),
        };
        BotContext::new(
            Settings::default(),
            SurveyConfig {
                survey_root: "R".to_string(),
                categories: vec!["Cat".to_string(), "NewCat".to_string()],
            },
            wiki.clone(),
            Some(credentials),
        )
        .expect("context")
    }

    fn event(value: serde_json::Value) -> ChangeEvent {
        serde_json::from_value(value).expect("event")
    }

    fn new_page(title: &str, user: &str) -> ChangeEvent {
        event(json!({"wiki": "metawiki", "title": title, "user": user, "type": "new"}))
    }

    #[test]
    fn parses_feed_message_with_extra_fields() {
        let parsed = ChangeEvent::from_json(
            r#"{"$schema":"/mediawiki/recentchange/1.0.0","wiki":"metawiki","title":"R/Cat/Beta","user":"Someone","type":"log","log_type":"move","log_params":{"target":"R/NewCat/Beta","noredir":"0"},"namespace":0}"#,
        )
        .expect("parse");
        assert_eq!(parsed.kind, "log");
        assert_eq!(parsed.move_target(), Some("R/NewCat/Beta"));
    }

    #[test]
    fn array_log_params_have_no_target() {
        let parsed = event(json!({"wiki": "metawiki", "title": "R/Cat/Beta", "type": "log", "log_type": "delete", "log_params": []}));
        assert_eq!(parsed.move_target(), None);
    }

    #[test]
    fn new_page_becomes_add() {
        let wiki = Arc::new(FakeWiki::new());
        let ctx = context(&wiki);
        assert_eq!(
            classify(&ctx, &new_page("R/Cat/Beta", "Someone")),
            Classification::Act(Action::Add {
                category: "Cat".to_string(),
                proposal: "Beta".to_string(),
            })
        );
    }

    #[test]
    fn rejections_are_classified() {
        let wiki = Arc::new(FakeWiki::new());
        let ctx = context(&wiki);

        let mut other_wiki = new_page("R/Cat/Beta", "Someone");
        other_wiki.wiki = "enwiki".to_string();
        assert_eq!(classify(&ctx, &other_wiki), Classification::Skip(Skip::OtherWiki));
        assert_eq!(
            classify(&ctx, &new_page("Elsewhere/Cat/Beta", "Someone")),
            Classification::Skip(Skip::OutsideSurvey)
        );
        assert_eq!(
            classify(&ctx, &new_page("R/Cat/Beta", "Survey bot")),
            Classification::Skip(Skip::OwnEdit)
        );
        assert_eq!(
            classify(&ctx, &new_page("R/Cat", "Someone")),
            Classification::Skip(Skip::NotAProposal)
        );
        assert_eq!(
            classify(&ctx, &new_page("R/Unknown/Beta", "Someone")),
            Classification::Skip(Skip::InvalidCategory("Unknown".to_string()))
        );
        assert_eq!(
            classify(
                &ctx,
                &event(json!({"wiki": "metawiki", "title": "R/Cat/Beta", "user": "Someone", "type": "edit"}))
            ),
            Classification::Skip(Skip::UnhandledKind)
        );
    }

    #[test]
    fn sentinel_categories_pass_the_filter() {
        let wiki = Arc::new(FakeWiki::new());
        let ctx = context(&wiki);
        assert!(matches!(
            classify(&ctx, &new_page("R/Archive/Beta", "Someone")),
            Classification::Act(Action::Add { .. })
        ));
    }

    #[test]
    fn move_out_of_the_survey_is_a_removal() {
        let wiki = Arc::new(FakeWiki::new());
        let ctx = context(&wiki);
        let moved = event(json!({
            "wiki": "metawiki", "title": "R/Cat/Beta", "user": "Someone",
            "type": "log", "log_type": "move", "log_params": {"target": "User:Someone/Beta"}
        }));
        assert_eq!(
            classify(&ctx, &moved),
            Classification::Act(Action::Remove {
                category: "Cat".to_string(),
                proposal: "Beta".to_string(),
                reason: RemovalReason::MovedTo {
                    target: "User:Someone/Beta".to_string(),
                    label: "User:Someone/Beta".to_string(),
                },
            })
        );
    }

    #[tokio::test]
    async fn category_page_event_makes_no_api_calls() {
        let wiki = Arc::new(FakeWiki::new().with_page("R/Cat", "{{:R/Cat/Alpha}}"));
        let ctx = context(&wiki);
        handle_event(&ctx, &new_page("R/Cat", "Someone")).await;
        assert!(wiki.reads().is_empty());
        assert!(wiki.edits().is_empty());
    }

    #[tokio::test]
    async fn own_edits_never_write() {
        let wiki = Arc::new(FakeWiki::new().with_page("R/Cat", ""));
        let ctx = context(&wiki);
        handle_event(&ctx, &new_page("R/Cat/Beta", "Survey bot")).await;
        let deleted = event(json!({
            "wiki": "metawiki", "title": "R/Cat/Beta", "user": "Survey bot",
            "type": "log", "log_type": "delete", "log_params": []
        }));
        handle_event(&ctx, &deleted).await;
        assert!(wiki.edits().is_empty());
    }

    #[tokio::test]
    async fn move_across_categories_runs_in_order() {
        let wiki = Arc::new(
            FakeWiki::new()
                .with_page("R/Cat", "{{:R/Cat/Alpha}}\n{{:R/Cat/Beta}}")
                .with_page("R/NewCat", "")
                .with_page(
                    "R/NewCat/Beta",
                    "{{:Community Wishlist Survey/Proposal header|1=Beta}}\nText",
                ),
        );
        let ctx = context(&wiki);
        let moved = event(json!({
            "wiki": "metawiki", "title": "R/Cat/Beta", "user": "Someone",
            "type": "log", "log_type": "move", "log_params": {"target": "R/NewCat/Beta"}
        }));

        handle_event(&ctx, &moved).await;

        assert_eq!(wiki.reads(), vec!["R/Cat", "R/NewCat/Beta", "R/NewCat"]);
        assert_eq!(wiki.page("R/Cat").as_deref(), Some("{{:R/Cat/Alpha}}"));
        assert_eq!(wiki.page("R/NewCat").as_deref(), Some("{{:R/NewCat/Beta}}"));
        assert_eq!(
            wiki.edits()[1].summary,
            "\"Beta\" moved to [[R/NewCat/Beta|NewCat/Beta]]"
        );
    }

    #[tokio::test]
    async fn failed_read_is_logged_not_raised() {
        let wiki = Arc::new(FakeWiki::new());
        let ctx = context(&wiki);
        handle_event(&ctx, &new_page("R/Cat/Beta", "Someone")).await;
        assert_eq!(wiki.reads(), vec!["R/Cat"]);
        assert!(wiki.edits().is_empty());
    }

    #[tokio::test]
    async fn reserved_turns_follow_event_order() {
        let wiki = Arc::new(FakeWiki::new().with_page("R/Cat", "{{:R/Cat/Alpha}}"));
        let ctx = context(&wiki);
        let add = Action::Add {
            category: "Cat".to_string(),
            proposal: "Beta".to_string(),
        };
        let remove = Action::Remove {
            category: "Cat".to_string(),
            proposal: "Beta".to_string(),
            reason: RemovalReason::Deleted,
        };

        let add_turn = reserve(&ctx, &add);
        let remove_turn = reserve(&ctx, &remove);
        // The removal is polled first but still runs second.
        let (removed, added) = tokio::join!(
            dispatch_in_turn(&ctx, &remove, remove_turn),
            dispatch_in_turn(&ctx, &add, add_turn),
        );

        assert_eq!(added.expect("add"), Change::Updated);
        assert_eq!(removed.expect("remove"), Change::Updated);
        assert_eq!(wiki.page("R/Cat").as_deref(), Some("{{:R/Cat/Alpha}}"));
    }

    #[test]
    fn move_touches_both_categories() {
        let action = Action::Move {
            from: ProposalTitle {
                full_title: "R/Cat/Beta".to_string(),
                category: "Cat".to_string(),
                proposal: "Beta".to_string(),
            },
            to: ProposalTitle {
                full_title: "R/NewCat/Beta".to_string(),
                category: "NewCat".to_string(),
                proposal: "Beta".to_string(),
            },
        };
        assert_eq!(action.categories(), vec!["Cat", "NewCat"]);
    }
}
