//! Full message-to-notification lifecycle against a deterministic classifier.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use minder_core::DueNotification;
use minder_engine::{
    Acknowledgment, Config, Engine, FixtureClassifier, Intent, Outbound, OutboundPayload,
};

const USER: i64 = 42;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, day, hour, 0, 0).unwrap()
}

fn classifier() -> FixtureClassifier {
    FixtureClassifier::new()
        .with(
            "remind me to pay rent tomorrow at 6pm",
            Intent::CreateTask {
                description: "pay rent".to_string(),
                deadline: Some(at(11, 18)),
            },
        )
        .with(
            "paid the rent",
            Intent::CompleteTask {
                task_ref: "pay rent".to_string(),
            },
        )
        .with(
            "I want to exercise daily",
            Intent::CreateHabit {
                name: "exercise".to_string(),
                frequency: "daily".to_string(),
            },
        )
}

fn due_payloads(outbound: &mut tokio::sync::mpsc::UnboundedReceiver<Outbound>) -> Vec<DueNotification> {
    let mut out = Vec::new();
    while let Ok(ev) = outbound.try_recv() {
        if let OutboundPayload::Due(n) = ev.payload {
            out.push(n);
        }
    }
    out
}

#[tokio::test]
async fn reminder_lifecycle_without_acknowledgment_ends_missed() {
    let mut engine = Engine::start(Config::default(), Arc::new(classifier()));
    let mut outbound = engine.take_outbound().unwrap();

    let ack = engine
        .submit(USER, "remind me to pay rent tomorrow at 6pm", at(10, 12))
        .await;
    let task_id = match ack {
        Acknowledgment::TaskCreated { task_id, ref description, .. } => {
            assert_eq!(description, "pay rent");
            task_id
        }
        other => panic!("expected task created, got {other:?}"),
    };

    // Nothing fires before the lead slot.
    engine.tick_once(at(10, 17)).await;
    assert!(due_payloads(&mut outbound).is_empty());

    // Lead heads-up at deadline minus 24h.
    engine.tick_once(at(10, 18)).await;
    let due = due_payloads(&mut outbound);
    assert_eq!(
        due,
        vec![DueNotification::TaskDue {
            task_id,
            description: "pay rent".to_string(),
            deadline: at(11, 18),
            is_final: false,
        }]
    );

    // The deadline wake is final.
    engine.tick_once(at(11, 18)).await;
    let due = due_payloads(&mut outbound);
    assert_eq!(
        due,
        vec![DueNotification::TaskDue {
            task_id,
            description: "pay rent".to_string(),
            deadline: at(11, 18),
            is_final: true,
        }]
    );

    // Grace window (6h) passes with no acknowledgment.
    engine.tick_once(at(12, 0)).await;
    let due = due_payloads(&mut outbound);
    assert_eq!(
        due,
        vec![DueNotification::TaskMissed {
            task_id,
            description: "pay rent".to_string(),
        }]
    );

    // Missed is terminal; later ticks stay quiet.
    engine.tick_once(at(20, 0)).await;
    assert!(due_payloads(&mut outbound).is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn completing_within_grace_suppresses_missed() {
    let mut engine = Engine::start(Config::default(), Arc::new(classifier()));
    let mut outbound = engine.take_outbound().unwrap();

    engine
        .submit(USER, "remind me to pay rent tomorrow at 6pm", at(10, 12))
        .await;
    engine.tick_once(at(11, 18)).await;
    let _ = due_payloads(&mut outbound);

    // Acknowledged inside the grace window, fuzzy reference.
    let ack = engine.submit(USER, "paid the rent", at(11, 20)).await;
    assert!(matches!(ack, Acknowledgment::TaskCompleted { .. }));

    engine.tick_once(at(12, 12)).await;
    assert!(due_payloads(&mut outbound).is_empty());

    engine.shutdown().await;
}

#[tokio::test]
async fn habit_window_close_without_check_in_notifies_and_rearms() {
    let mut engine = Engine::start(Config::default(), Arc::new(classifier()));
    let mut outbound = engine.take_outbound().unwrap();

    let ack = engine.submit(USER, "I want to exercise daily", at(10, 9)).await;
    assert!(matches!(ack, Acknowledgment::HabitCreated { .. }));

    // First daily window closes 24h after creation.
    engine.tick_once(at(11, 9)).await;
    let due = due_payloads(&mut outbound);
    assert!(matches!(
        due.as_slice(),
        [DueNotification::HabitCheckInDue { name, .. }] if name == "exercise"
    ));

    // The window re-arms; the next close fires a day later.
    engine.tick_once(at(12, 9)).await;
    let due = due_payloads(&mut outbound);
    assert_eq!(due.len(), 1);

    engine.shutdown().await;
}
