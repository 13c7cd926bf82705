//! Engine runtime: process-scoped context with an explicit start/stop
//! lifecycle, per-user FIFO workers, and the scheduler tick loop.
//!
//! Concurrency model: users are independent, so each gets its own worker and
//! its own partition lock. Within a user, classification awaits outside the
//! lock; only the router write phase and scheduler tick hold it. Messages for
//! one user are applied strictly in arrival order.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use minder_core::{DueNotification, RecommendPolicy, evaluate};

use crate::classify::{IntentClassifier, UserContext};
use crate::config::Config;
use crate::intent::Intent;
use crate::router::{self, Acknowledgment, UserPartition};

/// Events pushed to the transport for delivery. Send/retry of the actual chat
/// message is the transport's job.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub user_id: i64,
    pub payload: OutboundPayload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundPayload {
    Due(DueNotification),
    Recommendation {
        recommendation_id: u64,
        habit_id: u64,
        message: String,
    },
}

struct Job {
    raw_text: String,
    received_at: DateTime<Utc>,
    reply: oneshot::Sender<Acknowledgment>,
}

struct Shared {
    config: Config,
    recommend_policy: RecommendPolicy,
    classifier: Arc<dyn IntentClassifier>,
    partitions: Mutex<HashMap<i64, Arc<Mutex<UserPartition>>>>,
    workers: Mutex<HashMap<i64, mpsc::UnboundedSender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

pub struct Engine {
    shared: Arc<Shared>,
    tick: JoinHandle<()>,
    outbound_rx: Option<mpsc::UnboundedReceiver<Outbound>>,
}

impl Engine {
    /// Start the engine: spawns the tick loop, nothing else until the first
    /// message arrives. Multiple engines can coexist (tests rely on this).
    pub fn start(config: Config, classifier: Arc<dyn IntentClassifier>) -> Engine {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            recommend_policy: config.recommend_policy(),
            config,
            classifier,
            partitions: Mutex::new(HashMap::new()),
            workers: Mutex::new(HashMap::new()),
            handles: Mutex::new(Vec::new()),
            outbound: outbound_tx,
        });
        let tick = tokio::spawn(tick_loop(shared.clone()));
        Engine {
            shared,
            tick,
            outbound_rx: Some(outbound_rx),
        }
    }

    /// Take the outbound event stream. Yields once; the transport owns it.
    pub fn take_outbound(&mut self) -> Option<mpsc::UnboundedReceiver<Outbound>> {
        self.outbound_rx.take()
    }

    /// Inbound from the chat transport. The user partition is created on
    /// first message; the returned acknowledgment is data for the transport
    /// to render.
    pub async fn submit(&self, user_id: i64, raw_text: &str, received_at: DateTime<Utc>) -> Acknowledgment {
        let (reply_tx, reply_rx) = oneshot::channel();
        let sender = self.shared.worker_sender(user_id).await;
        let job = Job {
            raw_text: raw_text.to_string(),
            received_at,
            reply: reply_tx,
        };
        if sender.send(job).is_err() {
            warn!(user_id, "worker channel closed");
            return transient_failure();
        }
        reply_rx.await.unwrap_or_else(|_| transient_failure())
    }

    /// Run one scheduler pass at an explicit instant. The periodic loop calls
    /// this; tests call it directly to control time.
    pub async fn tick_once(&self, now: DateTime<Utc>) {
        self.shared.run_tick(now, false).await;
    }

    /// Run the recommendation sweep over every partition.
    pub async fn sweep_recommendations(&self, now: DateTime<Utc>) {
        self.shared.run_tick(now, true).await;
    }

    pub async fn shutdown(self) {
        self.tick.abort();
        let handles = {
            let mut h = self.shared.handles.lock().await;
            std::mem::take(&mut *h)
        };
        for h in handles {
            h.abort();
        }
        info!("engine stopped");
    }
}

fn transient_failure() -> Acknowledgment {
    Acknowledgment::Clarification {
        prompt: "Something went wrong on my side; please try again in a moment.".to_string(),
        candidates: Vec::new(),
    }
}

impl Shared {
    async fn worker_sender(self: &Arc<Self>, user_id: i64) -> mpsc::UnboundedSender<Job> {
        let mut workers = self.workers.lock().await;
        if let Some(s) = workers.get(&user_id) {
            return s.clone();
        }

        let partition = {
            let mut parts = self.partitions.lock().await;
            parts
                .entry(user_id)
                .or_insert_with(|| {
                    Arc::new(Mutex::new(UserPartition::new(
                        user_id,
                        self.config.reminder_policy(),
                    )))
                })
                .clone()
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(worker_loop(self.clone(), user_id, partition, rx));
        self.handles.lock().await.push(handle);
        workers.insert(user_id, tx.clone());
        info!(user_id, "user worker started");
        tx
    }

    async fn run_tick(&self, now: DateTime<Utc>, sweep: bool) {
        let partitions: Vec<(i64, Arc<Mutex<UserPartition>>)> = {
            let parts = self.partitions.lock().await;
            parts.iter().map(|(k, v)| (*k, v.clone())).collect()
        };

        for (user_id, partition) in partitions {
            let mut guard = partition.lock().await;
            let part = &mut *guard;
            let notifications = part.scheduler.tick(&mut part.store, now);
            drop(guard);

            for n in notifications {
                let _ = self.outbound.send(Outbound {
                    user_id,
                    payload: OutboundPayload::Due(n),
                });
            }

            if sweep {
                self.evaluate_partition(user_id, &partition, now).await;
            }
        }
    }

    async fn evaluate_partition(&self, user_id: i64, partition: &Arc<Mutex<UserPartition>>, now: DateTime<Utc>) {
        let mut part = partition.lock().await;
        if let Some(rec) = evaluate(&mut part.store, now, &self.recommend_policy) {
            info!(user_id, habit_id = rec.habit_id, "recommendation emitted");
            let _ = self.outbound.send(Outbound {
                user_id,
                payload: OutboundPayload::Recommendation {
                    recommendation_id: rec.id,
                    habit_id: rec.habit_id,
                    message: rec.message,
                },
            });
        }
    }
}

async fn worker_loop(
    shared: Arc<Shared>,
    user_id: i64,
    partition: Arc<Mutex<UserPartition>>,
    mut rx: mpsc::UnboundedReceiver<Job>,
) {
    while let Some(job) = rx.recv().await {
        // Snapshot context; the classification call must not hold the lock.
        let ctx = {
            let part = partition.lock().await;
            UserContext {
                user_id,
                timezone: part.store.timezone,
                habit_names: part.store.habit_names(),
                now: job.received_at,
                raw_text: job.raw_text.clone(),
            }
        };

        let intent = shared.classifier.classify(&ctx).await;
        let is_expense = matches!(intent, Intent::LogExpense { .. });

        let ack = {
            let mut part = partition.lock().await;
            router::handle(&mut part, intent, job.received_at)
        };
        let expense_logged = is_expense && matches!(ack, Acknowledgment::ExpenseLogged { .. });

        if job.reply.send(ack).is_err() {
            warn!(user_id, "caller dropped before acknowledgment");
        }

        // Correlation check rides behind the response, never in front of it.
        if expense_logged {
            shared.evaluate_partition(user_id, &partition, job.received_at).await;
        }
    }
}

async fn tick_loop(shared: Arc<Shared>) {
    let mut interval = tokio::time::interval(shared.config.tick_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_sweep: Option<DateTime<Utc>> = None;

    loop {
        interval.tick().await;
        let now = Utc::now();
        let sweep = last_sweep
            .map(|t| now - t >= Duration::hours(24))
            .unwrap_or(true);
        if sweep {
            last_sweep = Some(now);
        }
        shared.run_tick(now, sweep).await;
    }
}
