//! Startup sequence and the long-running watch loop.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::api::{MediaWikiClient, MediaWikiClientConfig, WikiApi};
use crate::classify::{ChangeEvent, Classification, classify, dispatch, dispatch_in_turn, reserve};
use crate::config::{Credentials, Settings, SurveyConfig};
use crate::context::BotContext;
use crate::replica::{EditorCountLookup, PageIdLookup, SqliteReplica, build_page_id_cache};
use crate::stream::{StreamWatcher, StreamWatcherConfig};

/// Log in, load the survey configuration and build the page-id cache
/// against the live wiki.
pub async fn prepare(settings: Settings, credentials: Option<Credentials>) -> Result<BotContext> {
    let client = Arc::new(MediaWikiClient::new(MediaWikiClientConfig::from_settings(
        &settings,
    ))?);

    let replica = settings
        .replica
        .db_path
        .as_deref()
        .map(|path| Arc::new(SqliteReplica::new(path, settings.replica.namespace)));

    let page_ids: Arc<dyn PageIdLookup> = match &replica {
        Some(replica) => replica.clone(),
        None => client.clone(),
    };
    let editor_counts: Option<Arc<dyn EditorCountLookup>> = match (&replica, settings.bot.editor_counts) {
        (Some(replica), true) => Some(replica.clone()),
        (None, true) => {
            warn!("editor counts need a replica database; set replica.db_path to enable them");
            None
        }
        (_, false) => None,
    };

    bootstrap(settings, credentials, client, page_ids.as_ref(), editor_counts).await
}

/// Startup against any API: a failure in any step is fatal.
pub async fn bootstrap(
    settings: Settings,
    credentials: Option<Credentials>,
    api: Arc<dyn WikiApi>,
    page_ids: &dyn PageIdLookup,
    editor_counts: Option<Arc<dyn EditorCountLookup>>,
) -> Result<BotContext> {
    match &credentials {
        Some(credentials) => {
            info!(api_url = %settings.api_url(), "connecting to the API");
            if let Err(error) = api.login(&credentials.username, &credentials.password).await {
                error!(error = %format!("{error:#}"), "failed to connect to the API");
                return Err(error.context("failed to connect to the API"));
            }
            info!("API connection successful");
        }
        None => warn!("no bot credentials; running without a session"),
    }

    let config_page = settings.config_page().to_string();
    info!(page = %config_page, "loading survey configuration");
    let survey = match load_survey_config(api.as_ref(), &config_page).await {
        Ok(survey) => survey,
        Err(error) => {
            error!(error = %format!("{error:#}"), "failed to load survey configuration");
            return Err(error);
        }
    };
    info!(
        survey_root = %survey.survey_root,
        categories = survey.categories.len(),
        "bot configuration loaded"
    );

    let cache = build_page_id_cache(page_ids, &survey)
        .await
        .context("failed to build page id cache")?;
    info!(cached = cache.len(), "page id cache ready");

    let mut context = BotContext::new(settings, survey, api, credentials)?.with_page_ids(cache);
    if let Some(lookup) = editor_counts {
        context = context.with_editor_counts(lookup);
    }
    Ok(context)
}

pub async fn load_survey_config(api: &dyn WikiApi, page: &str) -> Result<SurveyConfig> {
    let content = api
        .read_page(page)
        .await
        .with_context(|| format!("failed to read configuration page {page}"))?;
    SurveyConfig::from_json(&content).with_context(|| format!("invalid configuration on {page}"))
}

/// Full startup followed by the watch loop. Only returns on failure.
pub async fn start(settings: Settings, credentials: Option<Credentials>) -> Result<()> {
    let watcher = StreamWatcher::new(StreamWatcherConfig {
        url: settings.stream_url(),
        user_agent: settings.user_agent(),
        reconnect_delay: Duration::from_millis(settings.reconnect_delay_ms()),
    })?;
    let context = Arc::new(prepare(settings, credentials).await?);
    watch(context, watcher).await
}

/// Feed stream messages to the classifier. Each accepted event is reconciled
/// on its own task, so a slow category never holds up the stream. The task's
/// category turn is reserved before spawning, which keeps events on the same
/// category in stream order.
pub async fn watch(context: Arc<BotContext>, mut watcher: StreamWatcher) -> Result<()> {
    watcher
        .run(|data| {
            let context = context.clone();
            async move {
                let event = ChangeEvent::from_json(&data).context("malformed event JSON")?;
                if let Classification::Act(action) = classify(&context, &event) {
                    let turn = reserve(&context, &action);
                    tokio::spawn(async move {
                        if let Err(error) = dispatch_in_turn(&context, &action, turn).await {
                            error!(
                                title = %event.title,
                                error = %format!("{error:#}"),
                                "operation aborted"
                            );
                        }
                    });
                }
                Ok(())
            }
        })
        .await
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub events: usize,
    pub acted: usize,
    pub failed: usize,
}

/// Run newline-delimited change events through the bot one at a time.
pub async fn replay<R: BufRead>(context: &BotContext, reader: R) -> Result<ReplayReport> {
    let mut report = ReplayReport::default();
    for (index, line) in reader.lines().enumerate() {
        let line = line.context("failed to read replay input")?;
        if line.trim().is_empty() {
            continue;
        }
        let event = ChangeEvent::from_json(&line)
            .with_context(|| format!("malformed event JSON on line {}", index + 1))?;
        report.events += 1;

        let Classification::Act(action) = classify(context, &event) else {
            continue;
        };
        report.acted += 1;
        if let Err(error) = dispatch(context, &action).await {
            report.failed += 1;
            error!(
                line = index + 1,
                title = %event.title,
                error = %format!("{error:#}"),
                "operation aborted"
            );
        }
    }
    info!(
        events = report.events,
        acted = report.acted,
        failed = report.failed,
        "replay finished"
    );
    Ok(report)
}
