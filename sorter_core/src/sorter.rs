//! The sort loop: WAIT_FOR_BEAN → MEASURE → CLASSIFY → ACTUATE → RECORD.
//!
//! One bean is fully processed before the next detection is accepted. Errors
//! inside a bean's cycle are contained there; only the shutdown flag or
//! exhausted sources end the loop, and teardown runs on every exit path.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use sorter_traits::{Clock, Indicator};

use crate::actuator::Actuator;
use crate::classifier::Classifier;
use crate::config::{PresenceCfg, RunnerCfg};
use crate::error::{Result, SorterError};
use crate::presence::{BeanSource, Poll};
use crate::reader::{ColorReader, WeightChannel};
use crate::stats::SessionStats;
use crate::status::{SortStatus, StopReason};
use crate::telemetry::{TelemetrySnapshot, TelemetryWorker};
use crate::types::{
    Detection, Disposition, FeatureVector, Inspection, SortEvent, Verdict, WeightSource,
};

pub(crate) enum Wait {
    Bean(Detection),
    Stop(StopReason),
}

pub struct Sorter {
    pub(crate) color: ColorReader,
    pub(crate) weight: WeightChannel,
    pub(crate) classifier: Classifier,
    pub(crate) actuator: Actuator,
    pub(crate) indicator: Option<Box<dyn Indicator + Send>>,
    pub(crate) sources: Vec<Box<dyn BeanSource>>,
    pub(crate) exhausted: Vec<bool>,
    pub(crate) telemetry: Option<TelemetryWorker>,
    pub(crate) presence: PresenceCfg,
    pub(crate) runner: RunnerCfg,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) epoch: Instant,
    pub(crate) stats: SessionStats,
    pub(crate) history: VecDeque<SortEvent>,
    pub(crate) seq: u64,
    pub(crate) last_source_error: Option<String>,
    pub(crate) torn_down: bool,
}

impl std::fmt::Debug for Sorter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sorter")
            .field("classifier", &self.classifier.name())
            .field("weight", &self.weight)
            .field("sources", &self.sources.len())
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

impl Sorter {
    pub fn builder() -> crate::builder::SorterBuilder<
        crate::builder::Missing,
        crate::builder::Missing,
        crate::builder::Missing,
    > {
        crate::builder::SorterBuilder::default()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Most recent events, oldest first, bounded by `history_len`.
    pub fn history(&self) -> &VecDeque<SortEvent> {
        &self.history
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn weight_channel(&self) -> &WeightChannel {
        &self.weight
    }

    pub fn actuator(&self) -> &Actuator {
        &self.actuator
    }

    pub fn clock(&self) -> &dyn Clock {
        &*self.clock
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    /// Block until a source fires, shutdown is requested, or every source is exhausted.
    pub(crate) fn wait_for_bean(&mut self, shutdown: &AtomicBool) -> Wait {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                return Wait::Stop(StopReason::Shutdown);
            }
            let now = self.clock.now();
            let mut live = 0usize;
            for (i, src) in self.sources.iter_mut().enumerate() {
                if self.exhausted[i] {
                    continue;
                }
                match src.poll(now) {
                    Ok(Poll::Ready) => {
                        self.last_source_error = None;
                        return Wait::Bean(Detection {
                            source: src.kind(),
                            at_ms: self.clock.ms_since(self.epoch),
                        });
                    }
                    Ok(Poll::Pending) => live += 1,
                    Ok(Poll::Exhausted) => {
                        tracing::info!(source = src.kind().as_str(), "bean source exhausted");
                        self.exhausted[i] = true;
                    }
                    Err(e) => {
                        live += 1;
                        let msg = format!("{e:#}");
                        if self.last_source_error.as_deref() != Some(msg.as_str()) {
                            tracing::warn!(source = src.kind().as_str(), error = %msg, "bean source poll failed");
                            self.last_source_error = Some(msg);
                        }
                    }
                }
            }
            if live == 0 {
                return Wait::Stop(StopReason::SourcesExhausted);
            }
            self.clock.sleep_ms(self.presence.poll_ms);
        }
    }

    /// MEASURE and CLASSIFY one bean without moving the diverter.
    pub fn inspect(&mut self) -> Result<Inspection> {
        let color = self.color.measure_rgb(&*self.clock)?;
        let weight = self.weight.read();
        let features = FeatureVector::new(color.rgb.r, color.rgb.g, color.rgb.b, weight.grams);

        let anomalous = color.anomalous || weight.source == WeightSource::Failed;
        let verdict = if anomalous {
            Verdict::Unknown
        } else {
            self.classifier.classify(&features)
        };
        let weight_ok = weight.grams.is_finite() && self.weight.cfg().accepts(weight.grams);
        Ok(Inspection {
            features,
            verdict,
            weight_ok,
            weight_source: weight.source,
            anomalous,
            disposition: Disposition::decide(verdict, weight_ok),
        })
    }

    fn show(&mut self, good: bool, bad: bool) {
        if let Some(ind) = self.indicator.as_mut()
            && let Err(e) = ind.show(good, bad)
        {
            tracing::warn!(error = %e, "indicator update failed");
        }
    }

    /// Run one detected bean through MEASURE → CLASSIFY → ACTUATE → RECORD.
    pub fn process_bean(&mut self, detection: Detection) -> Result<SortEvent> {
        let insp = self.inspect()?;

        let accept = insp.disposition == Disposition::Accept;
        self.show(accept, !accept);
        let moved = self.actuator.sort(insp.disposition, &*self.clock);
        self.show(false, false);
        let moved = moved?;

        self.seq += 1;
        let ev = SortEvent {
            seq: self.seq,
            features: insp.features,
            verdict: insp.verdict,
            weight_ok: insp.weight_ok,
            weight_source: insp.weight_source,
            anomalous: insp.anomalous,
            disposition: insp.disposition,
            trigger: detection.source,
            angle_deg: moved.angle,
            clamped: moved.clamped,
            at_ms: detection.at_ms,
            timestamp: chrono::Utc::now(),
        };
        self.record(&ev);
        Ok(ev)
    }

    fn record(&mut self, ev: &SortEvent) {
        self.stats.record(ev);
        if self.history.len() >= self.runner.history_len {
            self.history.pop_front();
        }
        self.history.push_back(ev.clone());

        tracing::info!(
            seq = ev.seq,
            verdict = %ev.verdict,
            disposition = ev.disposition.as_str(),
            r = ev.features.red,
            g = ev.features.green,
            b = ev.features.blue,
            weight_g = ev.features.weight,
            weight_ok = ev.weight_ok,
            trigger = ev.trigger.as_str(),
            "bean sorted"
        );

        if let Some(t) = &self.telemetry
            && self.stats.total % self.runner.telemetry_every_n.max(1) == 0
        {
            t.submit(TelemetrySnapshot {
                good_count: self.stats.good,
                bad_count: self.stats.bad,
                avg_weight_g: self.stats.avg_weight_g(),
            });
        }
    }

    fn cycle_complete(&mut self) {
        let now = self.clock.now();
        for src in &mut self.sources {
            src.cycle_complete(now);
        }
    }

    /// One full pass: wait for a bean and process it. Per-bean failures are
    /// contained and reported as `SortStatus::Failed`.
    ///
    /// `shutdown` is observed only while waiting; a detected bean always
    /// completes its cycle and leaves the diverter at HOME.
    pub fn step(&mut self, shutdown: &AtomicBool) -> SortStatus {
        let detection = match self.wait_for_bean(shutdown) {
            Wait::Bean(d) => d,
            Wait::Stop(reason) => return SortStatus::Stopped(reason),
        };
        tracing::debug!(source = detection.source.as_str(), at_ms = detection.at_ms, "bean detected");

        let status = match self.process_bean(detection) {
            Ok(ev) => SortStatus::Sorted(ev),
            Err(e) => {
                self.stats.record_failure();
                tracing::error!(error = %format!("{e:#}"), "bean cycle failed; continuing");
                if !self.actuator.is_home()
                    && let Err(park) = self.actuator.park(&*self.clock)
                {
                    tracing::error!(error = %format!("{park:#}"), "could not return diverter home");
                }
                let typed = e
                    .downcast_ref::<SorterError>()
                    .cloned()
                    .unwrap_or_else(|| SorterError::Hardware(format!("{e:#}")));
                SortStatus::Failed(typed)
            }
        };
        self.cycle_complete();
        status
    }

    /// Park the diverter, release the servo, switch lamps off and stop telemetry.
    ///
    /// Idempotent; also invoked on drop.
    pub fn teardown(&mut self) -> Result<()> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;
        let parked = self.actuator.park(&*self.clock);
        if let Some(ind) = self.indicator.as_mut()
            && let Err(e) = ind.clear()
        {
            tracing::warn!(error = %e, "indicator clear failed");
        }
        if let Some(mut t) = self.telemetry.take() {
            t.shutdown();
        }
        tracing::info!(
            total = self.stats.total,
            good = self.stats.good,
            bad = self.stats.bad,
            "sorter torn down"
        );
        parked
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            good_count: self.stats.good,
            bad_count: self.stats.bad,
            avg_weight_g: self.stats.avg_weight_g(),
        }
    }
}

impl Drop for Sorter {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            tracing::warn!(error = %format!("{e:#}"), "teardown on drop failed");
        }
    }
}
