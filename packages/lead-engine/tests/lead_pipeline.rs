//! Integration tests for full lead runs.
//!
//! These drive the coordinator through the public API:
//! 1. Search agents fan out (some failing, some slow)
//! 2. Results deduplicate into unique leads
//! 3. Enrichment, validation and timing run per lead
//! 4. Survivors are scored, ranked and persisted

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lead_engine::testing::{
    FailingSearchAgent, FailingStore, MockEnrichmentProvider, MockSignalProvider, MockSource,
    StaticSearchAgent,
};
use lead_engine::{
    Coordinator, EnrichmentData, ErrorKind, FatalReason, Industry, IndustrySearchAgent,
    LeadConfig, LeadStatus, LeadStore, MemoryStore, Phase, RawLead, RetryConfig, RunOptions,
    SearchAgent, SearchCriteria, Signal, SignalKind,
};

/// Config with fast limits and retries so tests never wait on real time.
fn test_config() -> LeadConfig {
    LeadConfig::default()
        .with_rate_limit("fixtures", 60_000)
        .with_rate_limit("firmographics", 60_000)
        .with_rate_limit("signals", 60_000)
        .with_retry(RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        })
        .with_phase_timeout_seconds(30)
}

fn industry_agents(coordinator: &Coordinator, source: Arc<MockSource>) -> Vec<Arc<dyn SearchAgent>> {
    let gateway = coordinator.gateway().clone();
    vec![
        Arc::new(IndustrySearchAgent::banking(gateway.clone()).with_source(source.clone())),
        Arc::new(IndustrySearchAgent::insurance(gateway.clone()).with_source(source.clone())),
        Arc::new(IndustrySearchAgent::energy(gateway).with_source(source)),
    ]
}

#[tokio::test]
async fn test_one_failing_agent_of_four_still_completes() {
    let source = Arc::new(MockSource::new("fixtures").with_results([
        RawLead::new("Summit Holdings", Industry::Unknown).with_employees(2500),
        RawLead::new("Harbor Group", Industry::Unknown).with_employees(400),
    ]));
    let coordinator = Coordinator::new(test_config()).unwrap();
    let agents = industry_agents(&coordinator, source);
    let coordinator = coordinator
        .with_search_agents(agents)
        .with_search_agent(Arc::new(FailingSearchAgent::new(
            "government_agent",
            Industry::Government,
        )));

    let run = coordinator
        .run(&SearchCriteria::new(), RunOptions::new())
        .await
        .unwrap();

    assert_eq!(run.phase(), Phase::Completed);
    assert!(!run.is_partial());
    assert_eq!(run.errors().len(), 1);
    assert_eq!(run.errors_for("government_agent").len(), 1);
    // Three industries × two companies.
    assert_eq!(run.stats().deduped, 6);
    assert_eq!(run.ranked().len(), 6);
    assert!(run
        .ranked()
        .iter()
        .all(|lead| lead.status() == LeadStatus::Scored));
}

#[tokio::test]
async fn test_name_variants_from_two_agents_merge() {
    let first = StaticSearchAgent::new(
        "registry_agent",
        Industry::Banking,
        vec![serde_json::from_str(r#"{"company":"ABC Bank Inc","industry":"banking","employee_count":1200}"#).unwrap()],
    );
    let second = StaticSearchAgent::new(
        "news_agent",
        Industry::Banking,
        vec![serde_json::from_str(r#"{"company":"abc bank","industry":"banking","source":"news"}"#).unwrap()],
    );
    let coordinator = Coordinator::new(test_config())
        .unwrap()
        .with_search_agent(Arc::new(first))
        .with_search_agent(Arc::new(second));

    let run = coordinator
        .run(&SearchCriteria::new(), RunOptions::new())
        .await
        .unwrap();

    assert_eq!(run.stats().found, 2);
    assert_eq!(run.ranked().len(), 1);
    let lead = &run.ranked()[0];
    assert_eq!(lead.key().as_str(), "abc bank|banking");
    assert_eq!(lead.company().employee_count, Some(1200));
    assert!(lead.sources().contains("news"));
}

#[tokio::test]
async fn test_undersized_lead_is_excluded_from_ranking() {
    let agent = StaticSearchAgent::new(
        "banking_agent",
        Industry::Banking,
        vec![
            RawLead::new("Tiny Credit Union", Industry::Banking).with_employees(10),
            RawLead::new("Regional Bank", Industry::Banking).with_employees(300),
        ],
    );
    let store = Arc::new(MemoryStore::new());
    let coordinator = Coordinator::new(test_config().with_min_employees(50))
        .unwrap()
        .with_search_agent(Arc::new(agent))
        .with_store(store.clone());

    let run = coordinator
        .run(&SearchCriteria::new(), RunOptions::new())
        .await
        .unwrap();

    assert_eq!(run.stats().disqualified, 1);
    assert_eq!(run.ranked().len(), 1);
    assert_eq!(run.ranked()[0].company().name, "Regional Bank");
    assert_eq!(store.count().await.unwrap(), 1);
    assert!(store.get("tiny credit union|banking").await.unwrap().is_none());
}

#[tokio::test]
async fn test_full_pipeline_enriches_detects_scores_and_persists() {
    let source = Arc::new(MockSource::new("fixtures").with_results([
        RawLead::new("Great Lakes Bank", Industry::Banking).with_website("https://www.greatlakesbank.com"),
        RawLead::new("Prairie Savings", Industry::Banking).with_employees(150),
    ]));
    let enrichment = Arc::new(
        MockEnrichmentProvider::new("firmographics").with_data_for(
            "Great Lakes Bank",
            EnrichmentData {
                employee_count: Some(6000),
                location: Some("Chicago, IL".into()),
                tech_stack: vec!["IBM Mainframe".into(), "COBOL".into()],
                ..Default::default()
            },
        ),
    );
    let signals = Arc::new(MockSignalProvider::new("signals").with_signals(vec![Signal::new(
        SignalKind::RfpPublished,
        Utc::now(),
        "rfp-2026-017",
    )]));
    let store = Arc::new(MemoryStore::new());

    let coordinator = Coordinator::new(test_config()).unwrap();
    let agent = IndustrySearchAgent::banking(coordinator.gateway().clone()).with_source(source);
    let coordinator = coordinator
        .with_search_agent(Arc::new(agent))
        .with_enrichment_provider(enrichment.clone())
        .with_signal_provider(signals.clone())
        .with_store(store.clone());

    let run = coordinator
        .run(&SearchCriteria::new(), RunOptions::new())
        .await
        .unwrap();

    let stats = run.stats();
    assert_eq!(stats.deduped, 2);
    assert_eq!(stats.enriched, 2);
    assert_eq!(stats.validated, 2);
    assert_eq!(stats.scored, 2);
    assert_eq!(stats.persisted, 2);
    assert_eq!(enrichment.call_count(), 2);
    assert_eq!(signals.call_count(), 2);

    let top = &run.ranked()[0];
    assert_eq!(top.company().name, "Great Lakes Bank");
    assert_eq!(top.company().employee_count, Some(6000));
    assert!(top.timing().unwrap() > 0.0);
    assert!(top.sources().contains("firmographics"));
    assert!(!top.validation_notes().is_empty());

    let stored = store.query_top(1).await.unwrap();
    assert_eq!(stored[0].id(), top.id());
}

#[tokio::test]
async fn test_repeat_run_is_served_from_cache() {
    let source = Arc::new(
        MockSource::new("fixtures").with_results([RawLead::new("Coastal Power", Industry::Energy)]),
    );
    let coordinator = Coordinator::new(test_config()).unwrap();
    let agent = IndustrySearchAgent::energy(coordinator.gateway().clone()).with_source(source.clone());
    let coordinator = coordinator.with_search_agent(Arc::new(agent));

    coordinator
        .run(&SearchCriteria::new(), RunOptions::new())
        .await
        .unwrap();
    let first = source.call_count();
    coordinator
        .run(&SearchCriteria::new(), RunOptions::new())
        .await
        .unwrap();

    assert!(first > 0);
    assert_eq!(source.call_count(), first);
}

#[tokio::test]
async fn test_transient_source_errors_are_retried() {
    let source = Arc::new(
        MockSource::new("fixtures")
            .with_results([RawLead::new("Keystone Mutual", Industry::Insurance)])
            .failing_transiently(2),
    );
    let coordinator = Coordinator::new(test_config()).unwrap();
    let agent = IndustrySearchAgent::insurance(coordinator.gateway().clone())
        .with_source(source.clone())
        .with_max_results(5);
    let coordinator = coordinator.with_search_agent(Arc::new(agent));

    let run = coordinator
        .run(&SearchCriteria::new(), RunOptions::new())
        .await
        .unwrap();

    assert_eq!(run.ranked().len(), 1);
    assert_eq!(run.error_count(), 0);
}

#[tokio::test]
async fn test_enrichment_failures_are_recorded_per_lead() {
    let agent = StaticSearchAgent::new(
        "banking_agent",
        Industry::Banking,
        vec![
            RawLead::new("North Bank", Industry::Banking),
            RawLead::new("South Bank", Industry::Banking),
        ],
    );
    let coordinator = Coordinator::new(test_config())
        .unwrap()
        .with_search_agent(Arc::new(agent))
        .with_enrichment_provider(Arc::new(
            MockEnrichmentProvider::new("firmographics").failing_permanently(),
        ));

    let run = coordinator
        .run(&SearchCriteria::new(), RunOptions::new())
        .await
        .unwrap();

    assert!(run.is_completed());
    assert_eq!(run.ranked().len(), 2);
    let errors = run.errors_for("enrichment_agent");
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.kind == ErrorKind::Permanent && e.lead_key.is_some()));
    assert_eq!(run.stats().enriched, 0);
}

#[tokio::test]
async fn test_persistence_failures_do_not_fail_the_run() {
    let agent = StaticSearchAgent::new(
        "energy_agent",
        Industry::Energy,
        vec![RawLead::new("Mesa Utilities", Industry::Energy)],
    );
    let store = Arc::new(FailingStore::new());
    let coordinator = Coordinator::new(test_config())
        .unwrap()
        .with_search_agent(Arc::new(agent))
        .with_store(store.clone());

    let run = coordinator
        .run(&SearchCriteria::new(), RunOptions::new())
        .await
        .unwrap();

    assert!(run.is_completed());
    assert_eq!(store.put_count(), 1);
    assert_eq!(run.errors_for("persistence").len(), 1);
    assert_eq!(run.errors_for("persistence")[0].kind, ErrorKind::Storage);
    assert_eq!(run.stats().persisted, 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_finalizes_partial_run() {
    let fast = StaticSearchAgent::new(
        "banking_agent",
        Industry::Banking,
        vec![RawLead::new("Quick Bank", Industry::Banking)],
    );
    let slow = StaticSearchAgent::new(
        "energy_agent",
        Industry::Energy,
        vec![RawLead::new("Slow Power", Industry::Energy)],
    )
    .with_delay(Duration::from_secs(60));
    let coordinator = Coordinator::new(test_config())
        .unwrap()
        .with_search_agent(Arc::new(fast))
        .with_search_agent(Arc::new(slow));

    let run = coordinator
        .run(
            &SearchCriteria::new(),
            RunOptions::new().with_deadline(Duration::from_secs(5)),
        )
        .await
        .unwrap();

    assert!(run.is_completed());
    assert!(run.is_partial());
    assert_eq!(run.ranked().len(), 1);
    assert_eq!(run.ranked()[0].company().name, "Quick Bank");
    assert_eq!(run.errors_for("energy_agent")[0].kind, ErrorKind::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_before_any_results_fails() {
    let slow = StaticSearchAgent::new(
        "energy_agent",
        Industry::Energy,
        vec![RawLead::new("Slow Power", Industry::Energy)],
    )
    .with_delay(Duration::from_secs(60));
    let coordinator = Coordinator::new(test_config())
        .unwrap()
        .with_search_agent(Arc::new(slow));

    let err = coordinator
        .run(
            &SearchCriteria::new(),
            RunOptions::new().with_deadline(Duration::from_secs(5)),
        )
        .await
        .unwrap_err();

    assert_eq!(err.reason, FatalReason::DeadlineBeforeDedup);
    assert_eq!(err.run.phase(), Phase::Failed);
    assert!(err.run.ranked().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_slow_agent_times_out_without_failing_the_run() {
    let fast = StaticSearchAgent::new(
        "banking_agent",
        Industry::Banking,
        vec![RawLead::new("Quick Bank", Industry::Banking)],
    );
    let slow = StaticSearchAgent::new("energy_agent", Industry::Energy, vec![])
        .with_delay(Duration::from_secs(120));
    let coordinator = Coordinator::new(test_config())
        .unwrap()
        .with_search_agent(Arc::new(fast))
        .with_search_agent(Arc::new(slow));

    let run = coordinator
        .run(&SearchCriteria::new(), RunOptions::new())
        .await
        .unwrap();

    assert!(run.is_completed());
    assert!(!run.is_partial());
    assert_eq!(run.errors_for("energy_agent")[0].kind, ErrorKind::Timeout);
}

fn two_banks() -> StaticSearchAgent {
    StaticSearchAgent::new(
        "banking_agent",
        Industry::Banking,
        vec![
            RawLead::new("North Bank", Industry::Banking),
            RawLead::new("South Bank", Industry::Banking),
        ],
    )
}

#[tokio::test(start_paused = true)]
async fn test_slow_enrichment_times_out_per_lead() {
    let enrichment = Arc::new(
        MockEnrichmentProvider::new("firmographics")
            .with_default(EnrichmentData {
                employee_count: Some(900),
                ..Default::default()
            })
            .with_delay(Duration::from_secs(60)),
    );
    let coordinator = Coordinator::new(test_config().with_phase_timeout_seconds(2))
        .unwrap()
        .with_search_agent(Arc::new(two_banks()))
        .with_enrichment_provider(enrichment.clone());

    let run = coordinator
        .run(&SearchCriteria::new(), RunOptions::new())
        .await
        .unwrap();

    assert!(run.is_completed());
    assert!(!run.is_partial());
    assert_eq!(enrichment.call_count(), 2);
    let errors = run.errors_for("enrichment_agent");
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.kind == ErrorKind::Timeout && e.lead_key.is_some()));
    assert_eq!(run.stats().enriched, 0);
    assert_eq!(run.ranked().len(), 2);
    assert!(run
        .ranked()
        .iter()
        .all(|lead| lead.company().employee_count.is_none() && lead.status() == LeadStatus::Scored));
}

#[tokio::test(start_paused = true)]
async fn test_slow_signal_lookup_times_out_in_timing() {
    let signals = Arc::new(MockSignalProvider::new("signals").with_delay(Duration::from_secs(60)));
    let coordinator = Coordinator::new(test_config().with_phase_timeout_seconds(2))
        .unwrap()
        .with_search_agent(Arc::new(two_banks()))
        .with_signal_provider(signals.clone());

    let run = coordinator
        .run(&SearchCriteria::new(), RunOptions::new())
        .await
        .unwrap();

    assert!(run.is_completed());
    assert_eq!(signals.call_count(), 2);
    let errors = run.errors_for("timing_agent");
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.kind == ErrorKind::Timeout && e.lead_key.is_some()));
    assert_eq!(run.ranked().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_during_enrichment_records_cut_off_leads() {
    let enrichment = Arc::new(
        MockEnrichmentProvider::new("firmographics").with_delay(Duration::from_secs(60)),
    );
    let signals = Arc::new(MockSignalProvider::new("signals"));
    let coordinator = Coordinator::new(test_config())
        .unwrap()
        .with_search_agent(Arc::new(two_banks()))
        .with_enrichment_provider(enrichment.clone())
        .with_signal_provider(signals.clone());

    let run = coordinator
        .run(
            &SearchCriteria::new(),
            RunOptions::new().with_deadline(Duration::from_secs(5)),
        )
        .await
        .unwrap();

    assert!(run.is_completed());
    assert!(run.is_partial());
    assert_eq!(enrichment.call_count(), 2);
    // Nothing new is launched once the deadline fires.
    assert_eq!(signals.call_count(), 0);
    assert_eq!(run.stats().validated, 0);

    let errors = run.errors_for("enrichment_agent");
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.kind == ErrorKind::Cancelled));
    let mut cut_off: Vec<String> = errors
        .iter()
        .filter_map(|e| e.lead_key.as_ref().map(|k| k.to_string()))
        .collect();
    cut_off.sort();
    assert_eq!(cut_off, vec!["north bank|banking", "south bank|banking"]);

    assert_eq!(run.ranked().len(), 2);
    assert!(run.ranked().iter().all(|lead| lead.score().is_some()));
}

#[tokio::test(start_paused = true)]
async fn test_slow_source_times_out_its_agent() {
    let slow = Arc::new(
        MockSource::new("fixtures")
            .with_results([RawLead::new("Slow Power", Industry::Energy)])
            .with_delay(Duration::from_secs(60)),
    );
    let coordinator = Coordinator::new(test_config().with_phase_timeout_seconds(2)).unwrap();
    let agent = IndustrySearchAgent::energy(coordinator.gateway().clone()).with_source(slow.clone());
    let coordinator = coordinator
        .with_search_agent(Arc::new(agent))
        .with_search_agent(Arc::new(two_banks()));

    let run = coordinator
        .run(&SearchCriteria::new(), RunOptions::new())
        .await
        .unwrap();

    assert!(run.is_completed());
    assert!(slow.call_count() > 0);
    assert_eq!(run.errors_for("energy_agent")[0].kind, ErrorKind::Timeout);
    assert_eq!(run.ranked().len(), 2);
}

#[tokio::test]
async fn test_unbounded_cache_ttl_is_accepted() {
    let config = test_config().with_cache_ttl_seconds(u64::MAX);
    assert!(config.validate().is_ok());

    let enrichment = Arc::new(MockEnrichmentProvider::new("firmographics").with_default(
        EnrichmentData {
            employee_count: Some(1200),
            ..Default::default()
        },
    ));
    let coordinator = Coordinator::new(config)
        .unwrap()
        .with_search_agent(Arc::new(two_banks()))
        .with_enrichment_provider(enrichment);

    let run = coordinator
        .run(&SearchCriteria::new(), RunOptions::new())
        .await
        .unwrap();

    assert_eq!(run.stats().enriched, 2);
    assert_eq!(run.error_count(), 0);
}
