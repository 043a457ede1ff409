//! Batch orchestrator
//!
//! Drives one analysis request end to end:
//!
//! 1. Negotiate fields with the source (once per orchestrator).
//! 2. Page through the source under a wall-clock budget, retrying transient
//!    failures and narrowing the field set once on a schema mismatch.
//! 3. Apply the interest filter when enabled.
//! 4. Reconstruct every timeline against a single `now`, optionally on the
//!    rayon pool.
//! 5. Reduce the timelines into the requested result shape.
//!
//! Only a source that fails before yielding a single page is an error.
//! Anything later (a failing page, an exhausted budget) degrades to a
//! partial result with a warning.

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::deadline::Deadline;
use crate::error::{EngineError, SourceError};
use crate::fields::{FieldSet, GROUP_KEY};
use crate::filter::InterestFilter;
use crate::report::{
    Analysis, AnalysisStats, BottleneckReport, EntityTimeline, Overview, PageRequest,
    TimelinePage,
};
use crate::retry::retry_with_policy;
use crate::source::{EntityFilter, GroupingDimension, Page, PageQuery, RecordSource};
use chrono::{DateTime, Utc};
use dwell_metrics::{aggregate, analyze_transitions, rank, GroupedStatusTotals, RankOptions};
use dwell_timeline::{
    normalize, reconstruct_or_empty, EntityId, StatusLabel, StatusRecord, Timeline,
};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Records gathered for one request
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    /// Retrieved records, de-duplicated by id
    pub records: Vec<StatusRecord>,
    /// True when retrieval stopped before the last page
    pub partial: bool,
    /// Reasons for degraded retrieval
    pub warnings: Vec<String>,
    /// Pages fetched successfully
    pub pages_fetched: usize,
    /// Last total reported by the source
    pub total_hint: Option<u64>,
    /// Fields actually requested on the final page
    pub fields: FieldSet,
    /// True when the field set was narrowed after a schema mismatch
    pub fields_narrowed: bool,
}

/// Reconstructed population plus bookkeeping
struct Batch {
    records: Vec<StatusRecord>,
    timelines: Vec<Timeline>,
    partial: bool,
    warnings: Vec<String>,
    stats: AnalysisStats,
}

impl Batch {
    fn finish<T>(self, operation: &str, data: T, deadline: &Deadline) -> Analysis<T> {
        let mut stats = self.stats;
        stats.elapsed_ms = u64::try_from(deadline.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            operation,
            entities = stats.entities_analyzed,
            skipped = stats.entities_skipped,
            pages = stats.pages_fetched,
            partial = self.partial,
            elapsed_ms = stats.elapsed_ms,
            "analysis complete"
        );
        Analysis {
            data,
            partial: self.partial,
            warning: (!self.warnings.is_empty()).then(|| self.warnings.join("; ")),
            stats,
        }
    }
}

/// Analysis entry point over one record source
pub struct Orchestrator<S> {
    source: S,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    interest: Option<Arc<dyn InterestFilter>>,
    supported: OnceCell<FieldSet>,
}

impl<S> fmt::Debug for Orchestrator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("interest_filter", &self.interest.is_some())
            .field("negotiated", &self.supported.get())
            .finish_non_exhaustive()
    }
}

impl<S: RecordSource> Orchestrator<S> {
    /// Create orchestrator
    ///
    /// # Errors
    /// Returns `EngineError::Config` if the configuration does not validate
    pub fn new(source: S, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            source,
            config,
            clock: Arc::new(SystemClock),
            interest: None,
            supported: OnceCell::new(),
        })
    }

    /// With clock
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// With interest filter, applied when `grouping_filter_enabled` is set
    #[must_use]
    pub fn with_interest_filter(mut self, filter: impl InterestFilter + 'static) -> Self {
        self.interest = Some(Arc::new(filter));
        self
    }

    /// Configuration in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Underlying source
    #[inline]
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Population overview
    ///
    /// # Errors
    /// Returns `EngineError::SourceUnavailable` if no page could be fetched
    pub async fn overview(&self, filter: &EntityFilter) -> Result<Analysis<Overview>, EngineError> {
        let deadline = Deadline::after(self.config.execution_budget());
        info!(operation = "overview", "analysis requested");

        let batch = self.prepare(filter, None, &deadline).await?;
        let vocabulary = &self.config.vocabulary;

        let statuses = aggregate(&batch.timelines);
        let status_transitions = analyze_transitions(&batch.timelines, &vocabulary.start_label);

        let current: Vec<StatusLabel> = batch
            .records
            .iter()
            .map(|record| vocabulary.canonicalize(record.current_status.as_str()))
            .collect();
        let mut current_status_counts: BTreeMap<StatusLabel, usize> = BTreeMap::new();
        for status in &current {
            *current_status_counts.entry(status.clone()).or_default() += 1;
        }

        let overview = Overview {
            average_time_by_status: statuses.by_status,
            total_time_distribution_percent: statuses.percent_of_total_time,
            status_transitions,
            current_status_counts,
            funnel_counts: vocabulary.funnel_counts(&current),
        };

        Ok(batch.finish("overview", overview, &deadline))
    }

    /// One page of per-entity timelines
    ///
    /// # Errors
    /// Returns `EngineError::SourceUnavailable` if no page could be fetched
    pub async fn entity_timelines(
        &self,
        filter: &EntityFilter,
        request: PageRequest,
    ) -> Result<Analysis<TimelinePage>, EngineError> {
        let deadline = Deadline::after(self.config.execution_budget());
        info!(
            operation = "entity_timelines",
            page = request.page,
            page_size = request.page_size,
            "analysis requested"
        );

        let batch = self.prepare(filter, None, &deadline).await?;
        let vocabulary = &self.config.vocabulary;
        let total = batch.records.len();
        let range = request.range(total);

        let entities = batch.records[range.clone()]
            .iter()
            .zip(&batch.timelines[range])
            .map(|(record, timeline)| {
                let current_status = vocabulary.canonicalize(record.current_status.as_str());
                EntityTimeline {
                    entity_id: record.id.clone(),
                    days_in_current_status: timeline.days_in_status(&current_status),
                    current_status,
                    total_time_in_project: timeline.total_days(),
                    status_timeline: timeline.clone(),
                }
            })
            .collect();

        let page = TimelinePage {
            entities,
            page: request.page.max(1),
            page_size: request.page_size.max(1),
            total_entities: total,
            total_pages: request.total_pages(total),
        };

        Ok(batch.finish("entity_timelines", page, &deadline))
    }

    /// Ranked bottlenecks and group heatmap
    ///
    /// `min_days` overrides the configured threshold.
    ///
    /// # Errors
    /// Returns `EngineError::SourceUnavailable` if no page could be fetched
    pub async fn bottlenecks(
        &self,
        filter: &EntityFilter,
        grouping: GroupingDimension,
        min_days: Option<i64>,
    ) -> Result<Analysis<BottleneckReport>, EngineError> {
        let deadline = Deadline::after(self.config.execution_budget());
        info!(operation = "bottlenecks", %grouping, ?min_days, "analysis requested");

        let batch = self.prepare(filter, Some(grouping), &deadline).await?;

        let statuses = aggregate(&batch.timelines);
        let grouped = GroupedStatusTotals::fold(
            batch
                .records
                .iter()
                .zip(&batch.timelines)
                .map(|(record, timeline)| (record.group_key.as_ref(), timeline)),
        );

        let mut options =
            RankOptions::default().with_min_days(min_days.unwrap_or(self.config.min_bottleneck_days));
        if let Some(limit) = self.config.top_bottleneck_limit {
            options = options.with_limit(limit);
        }
        let ranking = rank(&statuses, &grouped, &options);

        let report = BottleneckReport {
            top_bottlenecks: ranking.top_bottlenecks,
            heatmap_data: ranking.heatmap,
        };

        Ok(batch.finish("bottlenecks", report, &deadline))
    }

    /// Retrieve records under a fresh budget
    ///
    /// # Errors
    /// Returns `EngineError::SourceUnavailable` if the first page cannot be fetched
    pub async fn collect(
        &self,
        filter: &EntityFilter,
        grouping: Option<GroupingDimension>,
    ) -> Result<Retrieval, EngineError> {
        let deadline = Deadline::after(self.config.execution_budget());
        self.collect_within(filter, grouping, &deadline).await
    }

    async fn prepare(
        &self,
        filter: &EntityFilter,
        grouping: Option<GroupingDimension>,
        deadline: &Deadline,
    ) -> Result<Batch, EngineError> {
        let retrieval = self.collect_within(filter, grouping, deadline).await?;
        let mut warnings = retrieval.warnings;
        let retrieved = retrieval.records.len();

        if grouping.is_some() && !retrieval.fields.contains(GROUP_KEY) {
            warnings.push("grouping field unavailable; heatmap is empty".to_string());
        }

        let records = self.apply_interest_filter(retrieval.records);
        let filtered = retrieved - records.len();

        let now = self.clock.now();
        let (records, timelines) = self.reconstruct_all(records, now).await?;
        let skipped = timelines.iter().filter(|t| t.is_empty()).count();
        let reinstated = self.count_reinstated(&records);
        if reinstated > 0 {
            debug!(reinstated, "entities carry a removal date but are no longer removed");
        }

        let stats = AnalysisStats {
            entities_retrieved: retrieved,
            entities_analyzed: timelines.len() - skipped,
            entities_skipped: skipped,
            entities_filtered: filtered,
            reinstated_after_removal: reinstated,
            pages_fetched: retrieval.pages_fetched,
            total_hint: retrieval.total_hint,
            fields_narrowed: retrieval.fields_narrowed,
            elapsed_ms: 0,
        };

        debug!(%now, analyzed = stats.entities_analyzed, "batch reconstructed");

        Ok(Batch {
            records,
            timelines,
            partial: retrieval.partial,
            warnings,
            stats,
        })
    }

    async fn negotiated_fields(&self) -> FieldSet {
        let requested = FieldSet::standard(&self.config.vocabulary);
        let negotiated = self
            .supported
            .get_or_try_init(|| async {
                let supported = self.source.negotiate_fields(&requested).await?;
                let fields = supported.restrict(&requested);
                if let Some(missing) = requested.first_missing_from(&fields) {
                    info!(first_missing = missing, served = fields.len(), "source serves a reduced field set");
                }
                Ok::<_, SourceError>(fields)
            })
            .await;

        match negotiated {
            Ok(fields) => fields.clone(),
            Err(error) => {
                warn!(%error, "field negotiation failed; requesting minimal fields");
                FieldSet::minimal()
            }
        }
    }

    async fn collect_within(
        &self,
        filter: &EntityFilter,
        grouping: Option<GroupingDimension>,
        deadline: &Deadline,
    ) -> Result<Retrieval, EngineError> {
        let negotiation = tokio::time::timeout(deadline.remaining(), self.negotiated_fields());
        let fields = match negotiation.await {
            Ok(fields) => fields,
            Err(_) => {
                warn!("field negotiation outlasted the execution budget; requesting minimal fields");
                FieldSet::minimal()
            }
        };
        let mut retrieval = Retrieval {
            fields,
            ..Retrieval::default()
        };
        let mut seen: HashSet<EntityId> = HashSet::new();
        let mut page_token: Option<String> = None;

        loop {
            if deadline.expired() {
                note_budget_exhausted(&mut retrieval, deadline);
                break;
            }

            let query = PageQuery {
                filter: filter.clone(),
                grouping,
                fields: retrieval.fields.clone(),
                page_token: page_token.clone(),
                page_size: self.config.page_size,
            };

            let outcome = tokio::time::timeout(deadline.remaining(), self.fetch_page(&query)).await;
            let result = match outcome {
                Ok(result) => result,
                Err(_) => {
                    note_budget_exhausted(&mut retrieval, deadline);
                    break;
                }
            };

            match result {
                Ok(page) => {
                    let Page {
                        records,
                        next_page_token,
                        total_hint,
                    } = page;
                    retrieval.pages_fetched += 1;
                    retrieval.total_hint = total_hint.or(retrieval.total_hint);
                    debug!(
                        page = retrieval.pages_fetched,
                        records = records.len(),
                        total_hint = ?retrieval.total_hint,
                        "page fetched"
                    );
                    for record in records {
                        if seen.insert(record.id.clone()) {
                            retrieval.records.push(record);
                        } else {
                            debug!(entity = %record.id, "duplicate entity across pages");
                        }
                    }
                    match next_page_token {
                        Some(token) => page_token = Some(token),
                        None => break,
                    }
                }
                Err(SourceError::SchemaMismatch { field }) if !retrieval.fields_narrowed => {
                    warn!(%field, "source rejected field; retrying with minimal field set");
                    retrieval.fields = narrowed_fields(&retrieval.fields, &field, grouping);
                    retrieval.fields_narrowed = true;
                    retrieval
                        .warnings
                        .push(format!("field {field} unavailable; milestone dates ignored"));
                }
                Err(error) if retrieval.pages_fetched == 0 => {
                    warn!(%error, "record source unavailable");
                    return Err(EngineError::SourceUnavailable(error));
                }
                Err(error) => {
                    warn!(
                        %error,
                        pages = retrieval.pages_fetched,
                        "page retrieval failed; returning partial result"
                    );
                    retrieval.partial = true;
                    retrieval.warnings.push(format!(
                        "retrieval stopped after {} pages: {error}",
                        retrieval.pages_fetched
                    ));
                    break;
                }
            }
        }

        Ok(retrieval)
    }

    async fn fetch_page(&self, query: &PageQuery) -> Result<Page, SourceError> {
        let policy = self.config.retry.policy();
        retry_with_policy(&policy, |attempt| {
            debug!(attempt, token = ?query.page_token, "requesting page");
            self.source.list_entities(query)
        })
        .await
    }

    fn apply_interest_filter(&self, records: Vec<StatusRecord>) -> Vec<StatusRecord> {
        if !self.config.grouping_filter_enabled {
            return records;
        }
        let Some(interest) = &self.interest else {
            debug!("grouping filter enabled without an interest filter; keeping all records");
            return records;
        };
        records
            .into_iter()
            .filter(|record| interest.accepts(record))
            .collect()
    }

    async fn reconstruct_all(
        &self,
        records: Vec<StatusRecord>,
        now: DateTime<Utc>,
    ) -> Result<(Vec<StatusRecord>, Vec<Timeline>), EngineError> {
        if !self.config.parallel_reconstruction {
            let vocabulary = &self.config.vocabulary;
            let timelines = records
                .iter()
                .map(|record| reconstruct_or_empty(record, vocabulary, now))
                .collect();
            return Ok((records, timelines));
        }

        // CPU-bound; keep it off the async worker threads.
        let vocabulary = self.config.vocabulary.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let timelines: Vec<Timeline> = records
                .par_iter()
                .map(|record| reconstruct_or_empty(record, &vocabulary, now))
                .collect();
            (records, timelines)
        });

        handle
            .await
            .map_err(|error| EngineError::Reconstruction(error.to_string()))
    }

    fn count_reinstated(&self, records: &[StatusRecord]) -> usize {
        let vocabulary = &self.config.vocabulary;
        let Some(field) = vocabulary.removal_field() else {
            return 0;
        };
        records
            .iter()
            .filter(|record| normalize(record.milestone(field)).is_some())
            .filter(|record| {
                !vocabulary.is_removed(&vocabulary.canonicalize(record.current_status.as_str()))
            })
            .count()
    }
}

/// Field set for the single retry after a schema mismatch
///
/// Falls back to the minimal set, keeping the group field when a grouping
/// was requested and the source did not reject it.
fn narrowed_fields(
    current: &FieldSet,
    rejected: &str,
    grouping: Option<GroupingDimension>,
) -> FieldSet {
    let mut fields = FieldSet::minimal();
    if grouping.is_some() && rejected != GROUP_KEY && current.contains(GROUP_KEY) {
        fields.insert(GROUP_KEY);
    }
    fields
}

fn note_budget_exhausted(retrieval: &mut Retrieval, deadline: &Deadline) {
    warn!(
        budget_ms = u64::try_from(deadline.budget().as_millis()).unwrap_or(u64::MAX),
        pages = retrieval.pages_fetched,
        records = retrieval.records.len(),
        "execution budget exhausted; returning partial result"
    );
    retrieval.partial = true;
    retrieval.warnings.push(format!(
        "execution budget of {} ms exhausted after {} pages",
        deadline.budget().as_millis(),
        retrieval.pages_fetched
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::source::InMemorySource;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 13, 0, 0, 0).unwrap()
    }

    fn draft(id: &str) -> StatusRecord {
        StatusRecord::new(id, "Draft")
            .with_created_at("2024-01-01T00:00:00Z")
            .with_last_modified_at("2024-01-06T00:00:00Z")
    }

    fn orchestrator(records: Vec<StatusRecord>) -> Orchestrator<InMemorySource> {
        Orchestrator::new(InMemorySource::new(records), EngineConfig::default().with_page_size(2))
            .unwrap()
            .with_clock(FixedClock(now()))
    }

    #[test]
    fn rejects_invalid_config() {
        let result = Orchestrator::new(InMemorySource::default(), EngineConfig::default().with_page_size(0));
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[tokio::test]
    async fn collect_walks_every_page() {
        let orch = orchestrator((0..5).map(|i| draft(&format!("d-{i}"))).collect());
        let retrieval = orch.collect(&EntityFilter::all(), None).await.unwrap();

        assert_eq!(retrieval.records.len(), 5);
        assert_eq!(retrieval.pages_fetched, 3);
        assert_eq!(retrieval.total_hint, Some(5));
        assert!(!retrieval.partial);
        assert!(retrieval.warnings.is_empty());
    }

    #[tokio::test]
    async fn sequential_and_parallel_agree() {
        let records: Vec<StatusRecord> = (0..20).map(|i| draft(&format!("d-{i}"))).collect();
        let parallel = orchestrator(records.clone());
        let sequential = Orchestrator::new(
            InMemorySource::new(records),
            EngineConfig::default().with_parallel_reconstruction(false),
        )
        .unwrap()
        .with_clock(FixedClock(now()));

        let a = parallel.overview(&EntityFilter::all()).await.unwrap();
        let b = sequential.overview(&EntityFilter::all()).await.unwrap();
        assert_eq!(a.data, b.data);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn parallel_reconstruction_on_multi_thread_runtime() {
        let records: Vec<StatusRecord> = (0..50).map(|i| draft(&format!("d-{i}"))).collect();
        let orch = orchestrator(records);

        let filter = EntityFilter::all();
        let (a, b) = tokio::join!(orch.overview(&filter), orch.overview(&filter));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.stats.entities_analyzed, 50);
        assert_eq!(a.data, b.data);
    }

    #[test]
    fn narrowing_keeps_group_field_only_when_grouping() {
        let standard = FieldSet::standard(&dwell_timeline::StatusVocabulary::default());

        let grouped = narrowed_fields(&standard, "onboardedDate", Some(GroupingDimension::Project));
        assert!(grouped.contains(GROUP_KEY));
        assert!(!grouped.contains("onboardedDate"));
        assert!(!grouped.contains("appliedDate"));

        assert_eq!(narrowed_fields(&standard, "onboardedDate", None), FieldSet::minimal());
        assert_eq!(
            narrowed_fields(&standard, GROUP_KEY, Some(GroupingDimension::Project)),
            FieldSet::minimal()
        );
    }

    #[tokio::test]
    async fn counts_reinstated_entities() {
        let reinstated = draft("r-1").with_milestone("removedDate", "2024-01-04");
        let removed = StatusRecord::new("r-2", "Removed")
            .with_created_at("2024-01-01")
            .with_milestone("removedDate", "2024-01-04");
        let orch = orchestrator(vec![reinstated, removed]);

        let analysis = orch.overview(&EntityFilter::all()).await.unwrap();
        assert_eq!(analysis.stats.reinstated_after_removal, 1);
    }
}
