//! Integration tests for the latency statistics engine.

use perf_stats::{Config, Percentile, RankRule, SeriesKind, StatsEngine, StatsError, UseCase};
use pretty_assertions::assert_eq;

/// Captured fraud run: 3 warm-up records, then 48 input events over
/// `T0..T0+15666` interleaved with 24 derived events.
const FIXTURE: &str = include_str!("fixtures/fraud-run.log");
const T0: i64 = 1_431_592_200_000;

fn p(v: f64) -> Percentile {
  Percentile::new(v).unwrap()
}

fn analyze(config: Config, log: &str, start: i64) -> perf_stats::Stats {
  StatsEngine::for_use_case(config, UseCase::Fraud)
    .analyze(log.as_bytes(), start)
    .unwrap()
}

#[test]
fn fixture_after_warm_up_pins_percentiles() {
  let stats = analyze(Config::default(), FIXTURE, T0);

  assert_eq!(stats.num_input_events(), 48);
  assert_eq!(stats.input_index().earliest(), Some(T0));
  assert_eq!(stats.input_index().latest(), Some(T0 + 15_666));
  let rate = stats.average_arrival_rate().unwrap();
  assert!((rate - 47_000.0 / 15_666.0).abs() < 1e-9, "rate {}", rate);

  assert_eq!(stats.latency(p(0.9)).unwrap(), 132);
  assert_eq!(stats.processing_latency(p(0.9)).unwrap(), 33);
  assert_eq!(stats.in_latency(p(0.9)).unwrap(), 8);
  assert_eq!(stats.out_latency(p(0.9)).unwrap(), 117);
  assert_eq!(stats.latency(p(0.5)).unwrap(), 87);
  assert_eq!(stats.latency(p(1.0)).unwrap(), 144);

  assert_eq!(stats.series(SeriesKind::EndToEnd).len(), 21);
  assert_eq!(stats.series(SeriesKind::Processing).len(), 24);

  let types: Vec<_> = stats.event_types().collect();
  assert_eq!(
    types,
    vec![
      "IncreasingAmounts",
      "SuddenCardUseNearExpirationDate",
      "TransactionsInFarAwayPlaces"
    ]
  );
  assert_eq!(stats.per_type_latency("IncreasingAmounts", p(0.9)).unwrap(), 111);
  assert_eq!(
    stats
      .per_type_latency("SuddenCardUseNearExpirationDate", p(0.9))
      .unwrap(),
    132
  );
  assert_eq!(
    stats.per_type_latency("TransactionsInFarAwayPlaces", p(0.9)).unwrap(),
    129
  );

  let pass = stats.pass();
  assert_eq!(pass.records, 75);
  assert_eq!(pass.before_start, 3);
  assert_eq!(pass.derived_events, 24);
  assert_eq!(pass.unresolved, 3);
}

#[test]
fn fixture_unadjusted_rank() {
  let config = Config {
    rank_rule: RankRule::Unadjusted,
    ..Config::default()
  };
  let stats = analyze(config, FIXTURE, T0);
  assert_eq!(stats.latency(p(0.9)).unwrap(), 141);
  assert_eq!(stats.processing_latency(p(0.9)).unwrap(), 35);
  assert_eq!(stats.latency(p(1.0)).unwrap(), 144);
}

#[test]
fn fixture_with_warm_up_keeps_negative_samples() {
  let stats = analyze(Config::default(), FIXTURE, i64::MIN);
  assert_eq!(stats.num_input_events(), 50);
  assert_eq!(stats.latency(p(1.0)).unwrap(), 500);
  assert_eq!(stats.latency(p(0.9)).unwrap(), 141);
  assert_eq!(stats.series(SeriesKind::InputPhase).min(), Some(-5));
  assert_eq!(stats.event_log().unwrap().rows()[0].event_id, "warm-alert");
}

#[test]
fn fixture_event_log_rows() {
  let stats = analyze(Config::default(), FIXTURE, T0);
  let log = stats.event_log().unwrap();
  assert_eq!(log.len(), 23);

  // alert-04 is observed twice; the second sighting refines the first row.
  let refined = log.get("alert-04").unwrap();
  assert_eq!(refined.timestamp, 1_431_592_209_478);
  assert_eq!(refined.event_name, "TransactionsInFarAwayPlaces");
  assert_eq!(refined.e2e_latency, Some(48));
  assert_eq!(refined.in_latency, Some(6));
  assert_eq!(refined.processing_latency, Some(31));
  assert_eq!(refined.out_latency, Some(11));

  // No contributor ids: processing only.
  let partial = log.get("alert-05").unwrap();
  assert_eq!(partial.e2e_latency, None);
  assert_eq!(partial.processing_latency, Some(33));

  let mut out = Vec::new();
  stats.dump_log(&mut out, true).unwrap();
  let text = String::from_utf8(out).unwrap();
  let head: Vec<_> = text.lines().take(4).collect();
  assert_eq!(
    head,
    vec![
      "timestamp,eventName,eventId,e2eLatency,inLatency,processingLatency,outLatency",
      "1431592200422,TransactionsInFarAwayPlaces,alert-01,21,1,6,14",
      "1431592200488,SuddenCardUseNearExpirationDate,alert-03,87,1,23,63",
      "1431592200501,SuddenCardUseNearExpirationDate,alert-00,132,5,10,117",
    ]
  );
  assert_eq!(text.lines().count(), 24);
}

#[test]
fn fixture_minimal_mode_matches_global_series() {
  let stats = analyze(Config::minimal(), FIXTURE, T0);
  assert_eq!(stats.latency(p(0.9)).unwrap(), 132);
  assert_eq!(stats.processing_latency(p(0.9)).unwrap(), 33);
  assert_eq!(stats.event_types().count(), 0);
  assert!(stats.event_log().is_none());
  assert!(stats.summary(p(0.9)).per_type.is_none());
}

#[test]
fn fixture_summary_text() {
  let stats = analyze(Config::default(), FIXTURE, T0);
  assert_eq!(
    stats.summary(p(0.9)).render_text(),
    "90.0% End-to-end latency: 132 ms\n\
     90.0% Processing latency: 33 ms\n\
     90.0% End-to-end latencies per event type:\n\
     IncreasingAmounts: 111 ms\n\
     SuddenCardUseNearExpirationDate: 132 ms\n\
     TransactionsInFarAwayPlaces: 129 ms\n\
     90.0% Input phase latency: 8 ms\n\
     90.0% Output phase latency: 117 ms\n\
     Num of input events: 48, average rate: 3.000128 events/sec\n"
  );
}

#[test]
fn bottleneck_contributor_scenario() {
  let log = r#"100:95,A
200:195,B
250:{"name":"Alert","timestamp":230,"attributes":{"EventId":"d","transaction_ids":["A","B"],"timestamps":[]}}
"#;
  let stats = analyze(Config::default(), log, 0);
  assert_eq!(stats.latency(p(1.0)).unwrap(), 50);
  assert!(matches!(
    stats.processing_latency(p(1.0)),
    Err(StatsError::EmptySeries { .. })
  ));
}

#[test]
fn empty_contributor_ids_scenario() {
  let log = r#"5:{"name":"Alert","timestamp":30,"attributes":{"EventId":"d","transaction_ids":[],"timestamps":[10,"20"]}}"#;
  let stats = analyze(Config::default(), log, 0);
  assert_eq!(stats.processing_latency(p(1.0)).unwrap(), 10);
  assert!(stats.latency(p(1.0)).is_err());
  assert!(stats.out_latency(p(1.0)).is_err());
}

#[test]
fn input_only_log() {
  let log: String = (0..10)
    .map(|i| format!("{}:{},tx-{}\n", 1000 + i * 100, 990 + i * 100, i))
    .collect();
  let stats = analyze(Config::default(), &log, 0);
  assert_eq!(stats.num_input_events(), 10);
  for kind in SeriesKind::ALL {
    assert!(stats.series(kind).is_empty());
  }
  let err = stats.latency(p(0.5)).unwrap_err();
  assert_eq!(err.to_string(), "no samples in end-to-end series");
  assert_eq!(stats.average_arrival_rate(), Some(10.0));
}

#[test]
fn malformed_record_aborts_without_results() {
  let log = "100:95,A\n\nnot-a-time:96,B\n";
  let err = StatsEngine::for_use_case(Config::default(), UseCase::Fraud)
    .analyze(log.as_bytes(), 0)
    .unwrap_err();
  match err {
    StatsError::MalformedRecord { line, reason } => {
      assert_eq!(line, 3);
      assert!(reason.contains("not-a-time"));
    }
    other => panic!("unexpected error {:?}", other),
  }
}

#[test]
fn out_of_order_capture_gives_negative_latency() {
  let log = r#"300:295,A
250:{"name":"Alert","timestamp":240,"attributes":{"EventId":"d","transaction_ids":["A"],"timestamps":[296]}}
"#;
  let stats = analyze(Config::default(), log, 0);
  assert_eq!(stats.latency(p(1.0)).unwrap(), -50);
  assert_eq!(stats.processing_latency(p(1.0)).unwrap(), -56);
}
