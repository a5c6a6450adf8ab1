use anyhow::{bail, Result};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::fetcher::{SourceDescriptor, SourceFetcher};
use crate::limiter::ConcurrencyLimiter;
use crate::reconcile::{DomainSets, ListKind, MergeStats, PublishedSets};
use crate::scraper::{
    scrape_with_retry, BrowserEngine, BrowserLauncher, ProviderProfile, RetryPolicy, ScrapeError,
    SessionReport,
};
use crate::settings::{Settings, SOURCE_CONCURRENCY};
use crate::validator::DomainValidator;

/// A static source and the set its entries feed.
#[derive(Debug, Clone)]
pub struct TaggedSource {
    pub descriptor: SourceDescriptor,
    pub kind: ListKind,
    /// A required source that cannot be read fails the run instead of being skipped.
    pub required: bool,
}

impl TaggedSource {
    pub fn new(descriptor: SourceDescriptor, kind: ListKind) -> Self {
        Self { descriptor, kind, required: false }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// One scraping session to run: a provider on a browser engine.
#[derive(Debug, Clone)]
pub struct ScrapeTarget {
    pub profile: ProviderProfile,
    pub engine: BrowserEngine,
}

/// Everything one run will do, resolved from settings.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub sources: Vec<TaggedSource>,
    pub targets: Vec<ScrapeTarget>,
    pub source_concurrency: usize,
    pub browser_concurrency: usize,
    pub retry: RetryPolicy,
    pub proxy: Option<String>,
}

impl Default for RunPlan {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            targets: Vec::new(),
            source_concurrency: SOURCE_CONCURRENCY,
            browser_concurrency: 1,
            retry: RetryPolicy::default(),
            proxy: None,
        }
    }
}

impl RunPlan {
    pub fn from_settings(settings: &Settings) -> Self {
        let mut sources = Vec::new();
        if let Some(path) = &settings.allowlist_file {
            let descriptor = SourceDescriptor::plain(path.clone()).with_name("local allowlist");
            sources.push(TaggedSource::new(descriptor, ListKind::Allow).required());
        }
        sources.extend(
            settings
                .allow_sources
                .iter()
                .cloned()
                .map(|descriptor| TaggedSource::new(descriptor, ListKind::Allow)),
        );
        sources.extend(
            settings
                .deny_sources
                .iter()
                .cloned()
                .map(|descriptor| TaggedSource::new(descriptor, ListKind::Deny)),
        );

        let scraping = &settings.scraping;
        let mut targets = Vec::new();
        if scraping.enabled {
            for profile in scraping.providers() {
                for endpoint in &scraping.engines {
                    targets.push(ScrapeTarget {
                        profile: profile.clone(),
                        engine: endpoint.engine,
                    });
                }
            }
        }

        Self {
            sources,
            targets,
            source_concurrency: settings.source_concurrency,
            browser_concurrency: scraping.concurrency(),
            retry: scraping.retry.clone(),
            proxy: scraping.proxy.clone(),
        }
    }
}

/// Per-source ingestion counts.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub label: String,
    pub kind: ListKind,
    pub fetched: usize,
    pub stats: MergeStats,
}

/// How one (provider, engine) session ended.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub provider: String,
    pub engine: BrowserEngine,
    /// Distinct domains discovered, or the error that exhausted the retries.
    pub result: Result<usize, ScrapeError>,
    pub stats: MergeStats,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub sources: Vec<SourceOutcome>,
    pub sessions: Vec<SessionOutcome>,
    pub allow: usize,
    pub disposable: usize,
}

impl RunSummary {
    pub fn failed_sessions(&self) -> usize {
        self.sessions.iter().filter(|s| s.result.is_err()).count()
    }

    fn log(&self) {
        for source in &self.sources {
            info!(
                "Source {} ({}): {} fetched, {} accepted, {} duplicate, {} rejected, {} vetoed",
                source.label,
                source.kind,
                source.fetched,
                source.stats.accepted,
                source.stats.duplicates,
                source.stats.rejected,
                source.stats.vetoed
            );
        }
        for session in &self.sessions {
            match &session.result {
                Ok(discovered) => info!(
                    "Session {}@{}: {} discovered, {} accepted, {} vetoed",
                    session.provider,
                    session.engine,
                    discovered,
                    session.stats.accepted,
                    session.stats.vetoed
                ),
                Err(e) => warn!("Session {}@{} failed: {}", session.provider, session.engine, e),
            }
        }
        info!(
            "Run finished: {} allowlisted, {} disposable, {}/{} sessions failed",
            self.allow,
            self.disposable,
            self.failed_sessions(),
            self.sessions.len()
        );
    }
}

enum Ingest<'a> {
    Source {
        source: &'a TaggedSource,
        fetched: Result<Vec<String>>,
    },
    Session {
        target: &'a ScrapeTarget,
        result: Result<SessionReport, ScrapeError>,
    },
}

/// Runs every source and scraping session and reconciles their output.
pub struct Aggregator {
    plan: RunPlan,
    fetcher: SourceFetcher,
    launcher: Arc<dyn BrowserLauncher>,
    validator: DomainValidator,
}

impl Aggregator {
    pub fn new(
        plan: RunPlan,
        fetcher: SourceFetcher,
        launcher: Arc<dyn BrowserLauncher>,
        validator: DomainValidator,
    ) -> Self {
        Self { plan, fetcher, launcher, validator }
    }

    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }

    /// Fetches and scrapes concurrently, each group under its own bound.
    ///
    /// Results are merged in completion order as they settle. Fails when a
    /// required source cannot be read or the final disposable set is empty.
    pub async fn run(&self) -> Result<(PublishedSets, RunSummary)> {
        let plan = &self.plan;
        info!(
            "Starting run: {} sources (bound {}), {} scraping sessions (bound {})",
            plan.sources.len(),
            plan.source_concurrency,
            plan.targets.len(),
            plan.browser_concurrency
        );

        let source_limiter = ConcurrencyLimiter::new(plan.source_concurrency)?;
        let browser_limiter = ConcurrencyLimiter::new(plan.browser_concurrency)?;

        let fetcher = &self.fetcher;
        let fetches = source_limiter.stream(plan.sources.iter().map(move |source| {
            move || async move {
                let fetched = if source.required {
                    fetcher.try_fetch(&source.descriptor).await
                } else {
                    Ok(fetcher.fetch(&source.descriptor).await)
                };
                Ingest::Source { source, fetched }
            }
        }))
        .map(|(_, ingest)| ingest);

        let launcher = self.launcher.as_ref();
        let validator = &self.validator;
        let retry = &plan.retry;
        let proxy = plan.proxy.as_deref();
        let scrapes = browser_limiter.stream(plan.targets.iter().map(move |target| {
            move || async move {
                let result = scrape_with_retry(
                    launcher,
                    &target.profile,
                    target.engine,
                    proxy,
                    validator,
                    retry,
                )
                .await;
                Ingest::Session { target, result }
            }
        }))
        .map(|(_, ingest)| ingest);

        let settled = stream::select(fetches, scrapes);
        futures::pin_mut!(settled);

        let mut sets = DomainSets::new(self.validator.clone());
        let mut summary = RunSummary::default();
        while let Some(ingest) = settled.next().await {
            match ingest {
                Ingest::Source { source, fetched } => {
                    let candidates = match fetched {
                        Ok(candidates) => candidates,
                        Err(e) => {
                            let label = source.descriptor.label();
                            error!("Required source {} could not be read: {:#}", label, e);
                            return Err(e.context(format!("Required source {} could not be read", label)));
                        }
                    };
                    let stats = sets.merge(&candidates, source.kind);
                    debug!("Merged {} into the {} set: {:?}", source.descriptor.label(), source.kind, stats);
                    summary.sources.push(SourceOutcome {
                        label: source.descriptor.label().to_string(),
                        kind: source.kind,
                        fetched: candidates.len(),
                        stats,
                    });
                }
                Ingest::Session { target, result } => {
                    let (result, stats) = match result {
                        Ok(report) => {
                            let stats = sets.merge(&report.discovered, ListKind::Deny);
                            (Ok(report.discovered.len()), stats)
                        }
                        Err(e) => (Err(e), MergeStats::default()),
                    };
                    summary.sessions.push(SessionOutcome {
                        provider: target.profile.name.clone(),
                        engine: target.engine,
                        result,
                        stats,
                    });
                }
            }
        }

        let published = sets.finalize();
        summary.allow = published.allow.len();
        summary.disposable = published.disposable.len();
        summary.log();

        if published.disposable.is_empty() {
            bail!("No valid disposable domains were collected");
        }
        Ok((published, summary))
    }
}
