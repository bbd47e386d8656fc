use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};

use crate::{
    proto::{self, ReportHeader},
    report::Report,
    sender::{Delivery, ReportSender, SendReportError},
};

pub type ReportErrorHandler = Arc<dyn Fn(&SendReportError) + Send + Sync>;

pub struct BatcherOptions {
    pub header: ReportHeader,
    pub report_interval: Duration,
    pub send_reports_immediately: bool,
    pub max_uncompressed_report_size: usize,
    pub include_traces_contributing_to_stats: bool,
    pub debug_print_reports: bool,
    pub report_error: Option<ReportErrorHandler>,
}

/// Accumulates traces in one report per executable schema id and sends them on a timer, when
/// they grow too large, or right away in immediate mode.
#[derive(Clone)]
pub struct ReportBatcher {
    inner: Arc<Inner>,
}

struct Inner {
    options: BatcherOptions,
    sender: ReportSender,
    slots: Mutex<HashMap<String, Arc<ReportSlot>>>,
    stopped: AtomicBool,
    graph_might_support_traces: AtomicBool,
    timer: Mutex<Option<JoinHandle<()>>>,
    shutdown: watch::Sender<bool>,
}

struct ReportSlot {
    report: Mutex<Report>,
    /// Serializes sends of this schema's reports.
    sending: tokio::sync::Mutex<()>,
}

impl ReportBatcher {
    pub fn new(options: BatcherOptions, sender: ReportSender) -> Self {
        ReportBatcher {
            inner: Arc::new(Inner {
                options,
                sender,
                slots: Mutex::new(HashMap::new()),
                stopped: AtomicBool::new(false),
                graph_might_support_traces: AtomicBool::new(true),
                timer: Mutex::new(None),
                shutdown: watch::Sender::new(false),
            }),
        }
    }

    /// Starts the periodic flush. Does nothing in immediate mode or once stopped.
    pub fn start(&self) {
        if self.inner.options.send_reports_immediately || self.inner.stopped.load(Ordering::SeqCst) {
            return;
        }

        let mut timer = self.inner.timer.lock().unwrap_or_else(PoisonError::into_inner);
        if timer.is_some() {
            return;
        }

        let batcher = self.clone();
        let period = self.inner.options.report_interval;
        let mut shutdown = self.inner.shutdown.subscribe();

        *timer = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            // Shutdown is only observed between flushes, a report being sent is never dropped.
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = interval.tick() => batcher.flush_all().await,
                }
            }
        }));
    }

    /// Ends the timer, waiting for a flush in progress, then sends every pending report. Traces
    /// added afterwards are dropped.
    pub async fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.shutdown.send_replace(true);

        let timer = self.inner.timer.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(timer) = timer {
            if let Err(err) = timer.await {
                tracing::warn!("the usage report timer did not end cleanly: {err}");
            }
        }

        self.flush_all().await;
    }

    /// False once the ingress answered that traces are ignored. Never goes back to true.
    pub fn graph_might_support_traces(&self) -> bool {
        self.inner.graph_might_support_traces.load(Ordering::Relaxed)
    }

    pub async fn add_trace(&self, executable_schema_id: &str, stats_report_key: &str, trace: proto::Trace, as_trace: bool) {
        if self.inner.stopped.load(Ordering::SeqCst) {
            tracing::debug!("usage reporting is stopped, dropping trace");
            return;
        }

        let slot = self.slot(executable_schema_id);
        let should_send = {
            let mut report = slot.report.lock().unwrap_or_else(PoisonError::into_inner);
            report.add_trace(stats_report_key, trace, as_trace);

            self.inner.options.send_reports_immediately
                || report.size_estimate() >= self.inner.options.max_uncompressed_report_size
        };

        if should_send {
            self.flush(executable_schema_id, &slot).await;
        }
    }

    /// Number of operations waiting to be sent for a schema.
    pub fn pending_operations(&self, executable_schema_id: &str) -> u64 {
        let slots = self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(executable_schema_id)
            .map(|slot| slot.report.lock().unwrap_or_else(PoisonError::into_inner).operation_count())
            .unwrap_or_default()
    }

    pub async fn flush_all(&self) {
        let slots: Vec<_> = self
            .inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect();

        for (executable_schema_id, slot) in slots {
            self.flush(&executable_schema_id, &slot).await;
        }
    }

    fn slot(&self, executable_schema_id: &str) -> Arc<ReportSlot> {
        let mut slots = self.inner.slots.lock().unwrap_or_else(PoisonError::into_inner);

        slots
            .entry(executable_schema_id.to_string())
            .or_insert_with(|| {
                let header = ReportHeader {
                    executable_schema_id: executable_schema_id.to_string(),
                    ..self.inner.options.header.clone()
                };

                Arc::new(ReportSlot {
                    report: Mutex::new(Report::new(
                        header,
                        !self.inner.options.include_traces_contributing_to_stats,
                    )),
                    sending: tokio::sync::Mutex::new(()),
                })
            })
            .clone()
    }

    async fn flush(&self, executable_schema_id: &str, slot: &ReportSlot) {
        let _sending = slot.sending.lock().await;

        let report = {
            let mut report = slot.report.lock().unwrap_or_else(PoisonError::into_inner);
            if report.is_empty() {
                return;
            }
            let renewed = report.renewed();
            std::mem::replace(&mut *report, renewed)
        };

        let operation_count = report.operation_count();
        let report = report.into_proto();

        if self.inner.options.debug_print_reports {
            tracing::info!("usage report for schema {executable_schema_id}: {report:?}");
        }

        match self.inner.sender.send(&report).await {
            Ok(Delivery { traces_ignored }) => {
                tracing::debug!(operation_count, "sent usage report for schema {executable_schema_id}");

                if traces_ignored && self.inner.graph_might_support_traces.swap(false, Ordering::Relaxed) {
                    tracing::info!("the usage reporting ingress ignores traces, only statistics will be sent");
                }
            }
            Err(error) => match &self.inner.options.report_error {
                Some(report_error) => report_error(&error),
                None => tracing::error!("could not send usage report for schema {executable_schema_id}: {error}"),
            },
        }
    }
}
