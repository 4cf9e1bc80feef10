//! Intraday pull schedule derived from resolved plans.
//!
//! The schedule ticks at the finest nominal resolution across all plans, from
//! `first_cycle` to `last_cycle` (offsets from midnight, both inclusive). A plan is
//! due on every tick its own resolution divides; plans without a resolution are
//! due on every tick.

use chrono::Duration;
use pullplan_core::Resolution;
use serde::{Deserialize, Serialize};

use crate::batch::BatchReport;
use crate::config::ScheduleConfig;

/// One plan to pull on a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub document: String,
    pub template_index: usize,
    pub resolution: Option<Resolution>,
    pub units: usize,
}

impl ScheduleItem {
    fn period_ms(&self) -> Option<i64> {
        self.resolution
            .as_ref()
            .and_then(Resolution::approx_duration)
            .map(|d| d.num_milliseconds())
            .filter(|ms| *ms > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub first_cycle: Resolution,
    pub last_cycle: Resolution,
    /// The smallest nominal resolution among the plans.
    pub interval: Resolution,
    /// Ordered by (document, template index).
    pub items: Vec<ScheduleItem>,
}

impl Schedule {
    /// Build a schedule from every plan in `batch`.
    ///
    /// Returns `None` when no plan has a positive resolution to tick on.
    pub fn build(batch: &BatchReport, window: &ScheduleConfig) -> Option<Self> {
        let items: Vec<ScheduleItem> = batch
            .plans()
            .map(|(document, plan)| ScheduleItem {
                document: document.to_string(),
                template_index: plan.template_index,
                resolution: plan.expanded.resolution.clone(),
                units: plan.expanded.len(),
            })
            .collect();

        let interval = items
            .iter()
            .filter_map(|item| Some((item.period_ms()?, item.resolution.as_ref()?)))
            .min_by_key(|(ms, _)| *ms)
            .map(|(_, resolution)| resolution.clone())?;

        Some(Self {
            first_cycle: window.first_cycle.clone(),
            last_cycle: window.last_cycle.clone(),
            interval,
            items,
        })
    }

    pub fn interval_duration(&self) -> Duration {
        self.interval.approx_duration().unwrap_or_else(Duration::zero)
    }

    /// Tick offsets from midnight, `first_cycle..=last_cycle` stepping by `interval`.
    pub fn cycles(&self) -> impl Iterator<Item = Duration> {
        let first = self.first_cycle.approx_duration().unwrap_or_else(Duration::zero);
        let last = self.last_cycle.approx_duration().unwrap_or_else(Duration::zero);
        let step = self.interval_duration();
        std::iter::successors(Some(first), move |t| {
            if step <= Duration::zero() {
                None
            } else {
                t.checked_add(&step)
            }
        })
        .take_while(move |t| *t <= last)
    }

    pub fn cycle_count(&self) -> usize {
        self.cycles().count()
    }

    /// Items due on the tick at `offset`.
    pub fn due_at(&self, offset: Duration) -> impl Iterator<Item = &ScheduleItem> {
        let elapsed = offset
            .checked_sub(&self.first_cycle.approx_duration().unwrap_or_else(Duration::zero))
            .map(|d| d.num_milliseconds());
        self.items.iter().filter(move |item| match (elapsed, item.period_ms()) {
            (Some(elapsed), Some(period)) => elapsed >= 0 && elapsed % period == 0,
            (Some(elapsed), None) => elapsed >= 0,
            (None, _) => false,
        })
    }
}

/// `HH:MM:SS` rendering of a tick offset.
pub fn format_offset(offset: Duration) -> String {
    let secs = offset.num_seconds();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
