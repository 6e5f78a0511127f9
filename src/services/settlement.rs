//! Background settlement queue
//!
//! Post-consume jobs run on a bounded worker pool, detached from the request
//! task. `shutdown` closes the intake and waits until every queued job has
//! been settled.

use crate::models::Usage;
use crate::services::quota::{QuotaAccountant, SettlementJob};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct SettlementQueue {
    sender: std::sync::Mutex<Option<mpsc::Sender<SettlementJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SettlementQueue {
    /// Start `workers` workers draining a queue of `capacity` jobs
    pub fn start(accountant: Arc<QuotaAccountant>, workers: usize, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel::<SettlementJob>(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|id| {
                let rx = rx.clone();
                let accountant = accountant.clone();
                tokio::spawn(async move {
                    loop {
                        let job = rx.lock().await.recv().await;
                        match job {
                            Some(job) => accountant.post_consume(job).await,
                            None => break,
                        }
                    }
                    debug!("Settlement worker {} stopped", id);
                })
            })
            .collect();

        info!("Settlement queue started with {} workers (capacity {})", workers.max(1), capacity.max(1));
        Self {
            sender: std::sync::Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<SettlementJob>> {
        match self.sender.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Enqueue a job without blocking the caller
    ///
    /// When the queue is full a detached task waits for capacity.
    pub fn submit(&self, job: SettlementJob) {
        let Some(sender) = self.sender() else {
            warn!(
                "Settlement queue closed; abandoning settlement of {} reserved quota for token {}",
                job.reservation.amount(),
                job.reservation.token_id()
            );
            return;
        };

        match sender.try_send(job) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(job)) => {
                debug!("Settlement queue full, deferring job");
                tokio::spawn(async move {
                    if let Err(mpsc::error::SendError(job)) = sender.send(job).await {
                        warn!("Settlement queue closed; abandoning job for token {}", job.reservation.token_id());
                    }
                });
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                warn!("Settlement queue closed; abandoning job for token {}", job.reservation.token_id());
            }
        }
    }

    /// Submit once a streamed response reports its final usage
    ///
    /// A dropped usage sender means the relay task died without reporting;
    /// `build` then receives empty usage.
    pub fn submit_when_ready<F>(self: &Arc<Self>, usage: oneshot::Receiver<Usage>, build: F)
    where
        F: FnOnce(Usage) -> SettlementJob + Send + 'static,
    {
        // Hold a sender clone so shutdown waits for this job too
        let sender = self.sender();
        let queue = self.clone();
        tokio::spawn(async move {
            let usage = match usage.await {
                Ok(usage) => usage,
                Err(_) => {
                    warn!("Stream ended without reporting usage");
                    Usage::default()
                }
            };
            let job = build(usage);
            match sender {
                Some(sender) => {
                    if let Err(mpsc::error::SendError(job)) = sender.send(job).await {
                        warn!("Settlement queue closed; abandoning job for token {}", job.reservation.token_id());
                    }
                }
                None => queue.submit(job),
            }
        });
    }

    /// Close the intake and wait for every queued job to settle
    pub async fn shutdown(&self) {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(sender);

        let handles: Vec<_> = self.workers.lock().await.drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Settlement worker failed: {}", e);
            }
        }
        info!("Settlement queue drained");
    }
}
