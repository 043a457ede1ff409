use dwell_core::{
    EngineConfig, EngineError, EntityFilter, FieldSet, FixedClock, GroupAllowList,
    GroupingDimension, Orchestrator, PageRequest, RecordSource, SourceEntry, SourceError,
};
use dwell_test_utils::{anchored, applicant, drafts, reference_now, ScriptedSource};
use dwell_timeline::{GroupKey, StatusLabel, StatusVocabulary};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn orchestrator<S: RecordSource>(source: S, config: EngineConfig) -> Orchestrator<S> {
    Orchestrator::new(source, config)
        .unwrap()
        .with_clock(FixedClock(reference_now()))
}

fn label(s: &str) -> StatusLabel {
    StatusLabel::from(s)
}

fn grouped_population() -> Vec<SourceEntry> {
    vec![
        SourceEntry::new(applicant("a-1", "Active", 3, 10, Some(20)))
            .with_group(GroupingDimension::Project, "Atlas"),
        SourceEntry::new(applicant("a-2", "Qualified", 5, 15, None))
            .with_group(GroupingDimension::Project, "Atlas"),
        SourceEntry::new(anchored("i-1", "Invite", 0, 5))
            .with_group(GroupingDimension::Project, "Beacon"),
        SourceEntry::new(anchored("d-1", "Draft", 0, 5)),
    ]
}

#[tokio::test]
async fn overview_over_mixed_population() {
    let source = ScriptedSource::new([
        applicant("a-1", "Active", 3, 10, Some(20)),
        applicant("a-2", "Qualified", 5, 15, None),
        anchored("i-1", "Invite", 0, 5),
    ]);
    let orch = orchestrator(source, EngineConfig::default());

    let analysis = orch.overview(&EntityFilter::all()).await.unwrap();
    let overview = &analysis.data;

    assert!(!analysis.partial);
    assert_eq!(analysis.warning, None);
    assert_eq!(analysis.stats.entities_analyzed, 3);

    let qualified = &overview.average_time_by_status[&label("Qualified")];
    assert_eq!(qualified.total_days, 55);
    assert_eq!(qualified.count, 2);
    assert_eq!(qualified.average_days, 27.5);
    assert_eq!(overview.total_time_distribution_percent[&label("Invite")], 33.3);

    let json = serde_json::to_value(overview).unwrap();
    assert_eq!(json["statusTransitions"]["Start → App Received"]["count"], 2);
    assert_eq!(json["statusTransitions"]["Start → App Received"]["medianDays"], 3);
    assert_eq!(json["statusTransitions"]["Start → Invite"]["count"], 1);
    assert_eq!(json["currentStatusCounts"]["Active"], 1);
    assert_eq!(json["funnelCounts"]["Invite"], 1);
    assert_eq!(json["funnelCounts"]["App Received"], 0);
    assert_eq!(json["funnelCounts"]["Matched"], 0);
}

#[tokio::test]
async fn overview_is_deterministic() {
    let orch = orchestrator(
        ScriptedSource::from_entries(grouped_population()),
        EngineConfig::default(),
    );
    let first = orch.overview(&EntityFilter::all()).await.unwrap();
    let second = orch.overview(&EntityFilter::all()).await.unwrap();
    assert_eq!(
        serde_json::to_string(&first.data).unwrap(),
        serde_json::to_string(&second.data).unwrap()
    );
}

#[tokio::test]
async fn fields_are_negotiated_once_per_session() {
    let orch = orchestrator(ScriptedSource::new(drafts(3)), EngineConfig::default());
    orch.overview(&EntityFilter::all()).await.unwrap();
    orch.entity_timelines(&EntityFilter::all(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(orch.source().negotiations(), 1);
}

#[tokio::test]
async fn entity_timelines_paginate_after_reconstruction() {
    let orch = orchestrator(
        ScriptedSource::new(drafts(5)),
        EngineConfig::default().with_page_size(2),
    );

    let analysis = orch
        .entity_timelines(&EntityFilter::all(), PageRequest::new(2, 2))
        .await
        .unwrap();
    let page = &analysis.data;

    assert_eq!(analysis.stats.pages_fetched, 3);
    assert_eq!(page.total_entities, 5);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.entities.len(), 2);
    assert_eq!(page.entities[0].entity_id.0, "draft-2");

    let json = serde_json::to_value(page).unwrap();
    let entity = &json["entities"][0];
    assert_eq!(entity["currentStatus"], "Draft");
    assert_eq!(entity["daysInCurrentStatus"], 60);
    assert_eq!(entity["totalTimeInProject"], 60);
    assert_eq!(entity["statusTimeline"][0]["startDate"], "2024-01-01");
    assert_eq!(entity["statusTimeline"][0]["endDate"], "2024-03-01");
}

#[tokio::test]
async fn bad_records_are_skipped_not_fatal() {
    let broken = dwell_timeline::StatusRecord::new("x-1", "Draft");
    let mut records = drafts(2);
    records.push(broken);
    let orch = orchestrator(ScriptedSource::new(records), EngineConfig::default());

    let analysis = orch
        .entity_timelines(&EntityFilter::all(), PageRequest::default())
        .await
        .unwrap();

    assert_eq!(analysis.stats.entities_retrieved, 3);
    assert_eq!(analysis.stats.entities_skipped, 1);
    assert!(analysis.data.entities[2].status_timeline.is_empty());
}

#[tokio::test]
async fn bottlenecks_rank_and_map_groups() {
    let orch = orchestrator(
        ScriptedSource::from_entries(grouped_population()),
        EngineConfig::default(),
    );

    let analysis = orch
        .bottlenecks(&EntityFilter::all(), GroupingDimension::Project, None)
        .await
        .unwrap();
    let report = &analysis.data;

    let order: Vec<&str> = report
        .top_bottlenecks
        .iter()
        .map(|b| b.status.as_str())
        .collect();
    assert_eq!(
        order,
        vec!["Draft", "Invite", "Qualified", "Active", "App Received", "Start"]
    );
    assert_eq!(report.top_bottlenecks[0].average_days, 15.0);
    assert!(report.top_bottlenecks[0].groups.is_empty());

    let atlas = &report.heatmap_data[&GroupKey::from("Atlas")];
    assert_eq!(atlas[&label("Qualified")], 27.5);
    assert_eq!(
        report.heatmap_data[&GroupKey::from("Beacon")][&label("Invite")],
        60.0
    );
    assert_eq!(report.heatmap_data.len(), 2);
}

#[tokio::test]
async fn bottleneck_threshold_overrides_config() {
    let orch = orchestrator(
        ScriptedSource::from_entries(grouped_population()),
        EngineConfig::default().with_top_bottleneck_limit(10),
    );

    let analysis = orch
        .bottlenecks(&EntityFilter::all(), GroupingDimension::Project, Some(50))
        .await
        .unwrap();
    let statuses: Vec<&str> = analysis
        .data
        .top_bottlenecks
        .iter()
        .map(|b| b.status.as_str())
        .collect();
    assert_eq!(statuses, vec!["Draft", "Invite", "Qualified"]);
}

#[tokio::test]
async fn interest_filter_applies_only_when_enabled() {
    let enabled = orchestrator(
        ScriptedSource::from_entries(grouped_population()),
        EngineConfig::default().with_grouping_filter(true),
    )
    .with_interest_filter(GroupAllowList::new(["Atlas"]));

    let analysis = enabled
        .bottlenecks(&EntityFilter::all(), GroupingDimension::Project, None)
        .await
        .unwrap();
    assert_eq!(analysis.stats.entities_retrieved, 4);
    assert_eq!(analysis.stats.entities_filtered, 2);
    assert_eq!(
        analysis.data.heatmap_data.keys().collect::<Vec<_>>(),
        vec![&GroupKey::from("Atlas")]
    );

    let disabled = orchestrator(
        ScriptedSource::from_entries(grouped_population()),
        EngineConfig::default(),
    )
    .with_interest_filter(GroupAllowList::new(["Atlas"]));

    let analysis = disabled
        .bottlenecks(&EntityFilter::all(), GroupingDimension::Project, None)
        .await
        .unwrap();
    assert_eq!(analysis.stats.entities_filtered, 0);
    assert_eq!(analysis.data.heatmap_data.len(), 2);
}

#[tokio::test]
async fn schema_mismatch_narrows_to_minimal_fields() {
    let source = ScriptedSource::new([applicant("a-1", "Active", 3, 10, Some(20))])
        .serving_only(FieldSet::minimal(), true);
    let orch = orchestrator(source, EngineConfig::default());

    let analysis = orch.overview(&EntityFilter::all()).await.unwrap();

    assert!(!analysis.partial);
    assert!(analysis.stats.fields_narrowed);
    assert!(analysis.warning.unwrap().contains("appliedDate"));
    assert_eq!(orch.source().list_calls(), 2);

    // Milestones were dropped, so only the anchor fallback remains.
    let statuses: Vec<&StatusLabel> = analysis.data.average_time_by_status.keys().collect();
    assert_eq!(statuses, vec![&label("Active")]);
}

#[tokio::test]
async fn narrowing_keeps_group_field_for_bottlenecks() {
    let served: FieldSet = FieldSet::standard(&StatusVocabulary::default())
        .iter()
        .filter(|field| *field != "onboardedDate")
        .collect();
    let source = ScriptedSource::from_entries(grouped_population()).serving_only(served, true);
    let orch = orchestrator(source, EngineConfig::default());

    let analysis = orch
        .bottlenecks(&EntityFilter::all(), GroupingDimension::Project, None)
        .await
        .unwrap();

    assert!(!analysis.partial);
    assert!(analysis.stats.fields_narrowed);
    assert_eq!(orch.source().list_calls(), 2);
    let warning = analysis.warning.unwrap();
    assert!(warning.contains("onboardedDate"));
    assert!(!warning.contains("grouping field unavailable"));
    let groups: Vec<&GroupKey> = analysis.data.heatmap_data.keys().collect();
    assert_eq!(groups, vec![&GroupKey::from("Atlas"), &GroupKey::from("Beacon")]);
}

#[tokio::test]
async fn second_schema_mismatch_on_first_page_is_fatal() {
    let served: FieldSet = ["id", "currentStatus"].into_iter().collect();
    let source = ScriptedSource::new(drafts(3)).serving_only(served, true);
    let orch = orchestrator(source, EngineConfig::default());

    let err = orch.overview(&EntityFilter::all()).await.unwrap_err();

    assert!(matches!(
        err,
        EngineError::SourceUnavailable(SourceError::SchemaMismatch { ref field }) if field == "createdAt"
    ));
    assert_eq!(orch.source().list_calls(), 2);
}

#[tokio::test]
async fn negotiated_subset_avoids_mismatch() {
    let source = ScriptedSource::from_entries(grouped_population())
        .serving_only(FieldSet::minimal(), false);
    let orch = orchestrator(source, EngineConfig::default());

    let analysis = orch
        .bottlenecks(&EntityFilter::all(), GroupingDimension::Project, None)
        .await
        .unwrap();

    assert!(!analysis.stats.fields_narrowed);
    assert_eq!(orch.source().list_calls(), 1);
    assert!(analysis.data.heatmap_data.is_empty());
    assert!(analysis.warning.unwrap().contains("grouping field unavailable"));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried() {
    let source = ScriptedSource::new(drafts(3)).with_transient_failures(2);
    let orch = orchestrator(source, EngineConfig::default());

    let analysis = orch.overview(&EntityFilter::all()).await.unwrap();

    assert!(!analysis.partial);
    assert_eq!(analysis.stats.pages_fetched, 1);
    assert_eq!(orch.source().list_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn persistent_transient_failure_on_first_page_is_fatal() {
    let source = ScriptedSource::new(drafts(3)).with_transient_failures(10);
    let orch = orchestrator(source, EngineConfig::default());

    let err = orch.overview(&EntityFilter::all()).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::SourceUnavailable(SourceError::Transient(_))
    ));
    assert_eq!(orch.source().list_calls(), 3);
}

#[tokio::test]
async fn unavailable_source_is_hard_failure() {
    let orch = orchestrator(
        ScriptedSource::new(drafts(3)).unavailable(),
        EngineConfig::default(),
    );

    let err = orch.overview(&EntityFilter::all()).await.unwrap_err();
    assert!(err.is_source_failure());
}

#[tokio::test]
async fn failure_after_first_page_degrades_to_partial() {
    let orch = orchestrator(
        ScriptedSource::new(drafts(5)).failing_after(1),
        EngineConfig::default().with_page_size(2),
    );

    let analysis = orch.overview(&EntityFilter::all()).await.unwrap();

    assert!(analysis.partial);
    assert_eq!(analysis.stats.entities_retrieved, 2);
    assert_eq!(analysis.stats.total_hint, Some(5));
    assert!(analysis.warning.unwrap().contains("retrieval stopped after 1 pages"));
}

// Scenario: slow pages exhaust the budget mid-retrieval.
#[tokio::test(start_paused = true)]
async fn deadline_yields_partial_result() {
    let source = ScriptedSource::new(drafts(10)).with_page_delay(Duration::from_millis(100));
    let config = EngineConfig::default()
        .with_page_size(2)
        .with_execution_budget(Duration::from_millis(250));
    let orch = orchestrator(source, config);

    let analysis = orch
        .entity_timelines(&EntityFilter::all(), PageRequest::new(1, 50))
        .await
        .unwrap();

    assert!(analysis.partial);
    assert!(analysis.warning.unwrap().contains("execution budget"));
    assert_eq!(analysis.stats.pages_fetched, 2);
    assert_eq!(analysis.data.total_entities, 4);
    assert!(analysis.data.entities.iter().all(|e| !e.status_timeline.is_empty()));
}

#[tokio::test(start_paused = true)]
async fn slow_negotiation_is_bounded_by_budget() {
    let budget = Duration::from_secs(1);
    let source = ScriptedSource::new(drafts(3)).with_negotiation_delay(Duration::from_secs(3600));
    let orch = orchestrator(source, EngineConfig::default().with_execution_budget(budget));

    let started = tokio::time::Instant::now();
    let analysis = orch.overview(&EntityFilter::all()).await.unwrap();

    assert!(started.elapsed() <= budget);
    assert!(analysis.partial);
    assert_eq!(analysis.stats.pages_fetched, 0);
    assert_eq!(orch.source().list_calls(), 0);
    assert!(analysis.warning.unwrap().contains("execution budget"));
}

#[tokio::test(start_paused = true)]
async fn hung_source_cannot_block_past_budget() {
    let source = ScriptedSource::new(drafts(3)).with_page_delay(Duration::from_secs(3600));
    let config = EngineConfig::default().with_execution_budget(Duration::from_secs(1));
    let orch = orchestrator(source, config);

    let analysis = orch.overview(&EntityFilter::all()).await.unwrap();

    assert!(analysis.partial);
    assert_eq!(analysis.stats.pages_fetched, 0);
    assert_eq!(analysis.stats.entities_retrieved, 0);
    assert!(analysis.data.average_time_by_status.is_empty());
}
