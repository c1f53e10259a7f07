use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use post_insights::{fit, predict, FallbackLevel, InsightsError, PostRecord, Predictor};

// 2024-03-04 is a Monday.
fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

fn post(id: &str, ts: DateTime<Utc>, likes: i64) -> PostRecord {
    PostRecord::new(id, ts, likes, 0)
}

#[test]
fn worked_example_predicts_bucket_mean() {
    let records = vec![
        post("a", at(4, 9), 10),
        post("b", at(4, 9), 50),
        post("c", at(5, 14), 5),
    ];

    let model = fit(&records).unwrap();

    assert_eq!(predict(&model, 9, "Monday").unwrap(), 30);
}

#[test]
fn fallback_chain_widens_one_level_at_a_time() {
    let records = vec![
        post("a", at(4, 9), 10),
        post("b", at(4, 9), 20),
        post("c", at(11, 9), 40),
    ];
    let model = fit(&records).unwrap();

    let exact = model.explain(9, "Monday").unwrap();
    assert_eq!(exact.level, FallbackLevel::Bucket);
    assert_eq!(exact.support, 3);
    assert_eq!(exact.likes, 23);

    let hour_only = model.explain(9, "Tuesday").unwrap();
    assert_eq!(hour_only.level, FallbackLevel::Hour);
    assert_eq!(hour_only.likes, 23);

    let global = model.explain(14, "Wednesday").unwrap();
    assert_eq!(global.level, FallbackLevel::Global);
    assert_eq!(global.support, 3);
}

#[test]
fn hour_fallback_uses_hour_mean_across_days() {
    let records = vec![
        post("mon-9", at(4, 9), 10),
        post("wed-9", at(6, 9), 30),
        post("wed-18", at(6, 18), 400),
    ];
    let model = fit(&records).unwrap();

    let prediction = model.explain(9, "Friday").unwrap();

    assert_eq!(prediction.level, FallbackLevel::Hour);
    assert_eq!(prediction.support, 2);
    assert_eq!(prediction.likes, 20);
}

#[test]
fn day_fallback_applies_when_hour_is_unseen() {
    let records = vec![
        post("mon-9", at(4, 9), 10),
        post("mon-18", at(4, 18), 30),
        post("tue-12", at(5, 12), 500),
    ];
    let model = fit(&records).unwrap();

    let prediction = model.explain(21, "monday").unwrap();

    assert_eq!(prediction.level, FallbackLevel::Day);
    assert_eq!(prediction.support, 2);
    assert_eq!(prediction.likes, 20);
}

#[test]
fn global_fallback_uses_all_records() {
    let records = vec![post("a", at(4, 9), 10), post("b", at(5, 10), 21)];
    let model = fit(&records).unwrap();

    let prediction = model.explain(14, "Wednesday").unwrap();

    assert_eq!(prediction.level, FallbackLevel::Global);
    assert!((prediction.mean - 15.5).abs() < 1e-9);
    assert_eq!(prediction.likes, 16);
}

#[test]
fn weekday_names_are_case_insensitive() {
    let records = vec![post("a", at(4, 9), 12)];
    let model = fit(&records).unwrap();

    assert_eq!(model.predict(9, "MONDAY").unwrap(), 12);
    assert_eq!(model.predict(9, " monday ").unwrap(), 12);
    assert_eq!(model.explain(9, "mOnDaY").unwrap().level, FallbackLevel::Bucket);
}

#[test]
fn out_of_range_hour_is_invalid_input() {
    let model = fit(&[post("a", at(4, 9), 12)]).unwrap();

    assert!(matches!(model.predict(24, "Monday"), Err(InsightsError::InvalidInput(_))));
    assert!(matches!(model.predict(-1, "Monday"), Err(InsightsError::InvalidInput(_))));
}

#[test]
fn unknown_weekday_is_invalid_input() {
    let model = fit(&[post("a", at(4, 9), 12)]).unwrap();

    assert!(matches!(model.predict(9, "Funday"), Err(InsightsError::InvalidInput(_))));
    assert!(matches!(model.predict(9, "Mon"), Err(InsightsError::InvalidInput(_))));
}

#[test]
fn empty_record_set_is_insufficient_data() {
    let model = fit(&[]).unwrap();

    assert_eq!(model.record_count(), 0);
    assert!(matches!(
        model.predict(9, "Monday"),
        Err(InsightsError::InsufficientData)
    ));
}

#[test]
fn invalid_query_is_reported_before_missing_data() {
    let model = fit(&[]).unwrap();

    assert!(matches!(model.predict(30, "Monday"), Err(InsightsError::InvalidInput(_))));
}

#[test]
fn fit_rejects_malformed_records() {
    let records = vec![post("ok", at(4, 9), 5), post("bad", at(4, 10), -7)];

    let err = fit(&records).unwrap_err();

    assert!(matches!(err, InsightsError::InvalidRecord { ref id, .. } if id == "bad"));
}

#[test]
fn predictions_are_deterministic() {
    let records = vec![
        post("a", at(4, 9), 17),
        post("b", at(6, 13), 4),
        post("c", at(8, 21), 90),
    ];

    let first = fit(&records).unwrap();
    let second = fit(&records).unwrap();

    for hour in 0..24 {
        for day in ["Monday", "Wednesday", "Sunday"] {
            assert_eq!(
                first.explain(hour, day).unwrap(),
                second.explain(hour, day).unwrap()
            );
        }
    }
    assert_eq!(first.fingerprint(), second.fingerprint());
}

#[test]
fn predictor_groups_in_configured_offset() {
    // Monday 23:00 UTC is Tuesday 01:00 at +02:00.
    let records = vec![post("a", at(4, 23), 40), post("b", at(6, 8), 2)];
    let offset = FixedOffset::east_opt(2 * 3600).unwrap();
    let model = Predictor::new(offset).fit(&records).unwrap();

    let prediction = model.explain(1, "Tuesday").unwrap();

    assert_eq!(prediction.level, FallbackLevel::Bucket);
    assert_eq!(prediction.likes, 40);
}
