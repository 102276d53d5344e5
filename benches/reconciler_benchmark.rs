use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tastetrek_api::models::User;
use tastetrek_api::services::reconciler::{apply_event, BillingEvent, EventKind, Outcome};
use tastetrek_api::time_utils::MS_PER_DAY;

fn make_event(id: u64, kind: EventKind, expiry: i64) -> BillingEvent {
    BillingEvent {
        id: format!("evt-{}", id),
        kind,
        app_user_id: "u1".to_string(),
        product_id: Some("tastetrek_personal_monthly".to_string()),
        expiration_at_ms: Some(expiry),
        original_app_user_id: None,
    }
}

fn benchmark_apply_event(c: &mut Criterion) {
    let user = User::new(
        "u1".to_string(),
        "u1@example.com".to_string(),
        String::new(),
        None,
        0,
    );

    // An out-of-order renewal storm: expiries interleaved so roughly half
    // the events are stale on arrival.
    let events: Vec<BillingEvent> = (0..100)
        .map(|i| {
            let expiry = if i % 2 == 0 { i } else { 100 - i } * MS_PER_DAY;
            let kind = if i == 0 {
                EventKind::InitialPurchase
            } else {
                EventKind::Renewal
            };
            make_event(i as u64, kind, expiry)
        })
        .collect();

    let mut group = c.benchmark_group("reconciler");

    group.bench_function("apply_single_grant", |b| {
        let event = make_event(0, EventKind::InitialPurchase, 30 * MS_PER_DAY);
        b.iter(|| apply_event(black_box(&user), black_box(&event), 0))
    });

    group.bench_function("apply_event_storm_100", |b| {
        b.iter(|| {
            let mut state = user.clone();
            for event in &events {
                if let Outcome::Applied(patch) = apply_event(&state, black_box(event), 0) {
                    state.tier = patch.tier;
                    state.subscription_type = patch.subscription_type;
                    state.subscription_end_date = Some(patch.subscription_end_date);
                }
            }
            state
        })
    });

    group.finish();
}

criterion_group!(benches, benchmark_apply_event);
criterion_main!(benches);
