//! Stoppage history queries.
//!
//! Reconstructs intervals for a period, narrows them to one machine (by
//! full key or brand), and pages the result the way the history table does.

use std::time::Duration;

use clap::ValueEnum;
use plcwatch_sdk::{reconstruct, summarize, Engine, StoppageSummary, Window};
use plcwatch_types::{MachineKey, StatusEvent, StoppageInterval};

use crate::registry::MachineRegistry;

/// Rows per page when the caller does not ask for a size.
pub const DEFAULT_PAGE_LIMIT: usize = 10;

/// Reporting period, always ending at `now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Period {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Period {
    pub fn span(&self) -> Duration {
        const DAY: u64 = 24 * 60 * 60;
        match self {
            Period::Daily => Duration::from_secs(DAY),
            Period::Weekly => Duration::from_secs(7 * DAY),
            Period::Monthly => Duration::from_secs(30 * DAY),
        }
    }

    pub fn window(&self, now_ms: u64) -> Window {
        let span_ms = self.span().as_millis() as u64;
        Window::new(now_ms.saturating_sub(span_ms), now_ms)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoppageQuery {
    pub period: Period,
    /// Full `brand_model` key or bare brand.
    pub machine: Option<String>,
    /// 1-based.
    pub page: usize,
    pub limit: usize,
}

impl Default for StoppageQuery {
    fn default() -> Self {
        Self {
            period: Period::default(),
            machine: None,
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl StoppageQuery {
    fn selects(&self, key: &MachineKey) -> bool {
        self.machine.as_deref().map_or(true, |filter| key.matches(filter))
    }

    fn page(&self) -> usize {
        self.page.max(1)
    }

    fn limit(&self) -> usize {
        if self.limit == 0 {
            DEFAULT_PAGE_LIMIT
        } else {
            self.limit
        }
    }
}

/// One page of stoppage history plus counters over the whole selection.
#[derive(Debug, Clone, PartialEq)]
pub struct StoppageReport {
    pub rows: Vec<StoppageInterval>,
    pub page: usize,
    pub has_next_page: bool,
    /// Intervals across all pages.
    pub total: usize,
    pub summary: StoppageSummary,
    /// Selected registry machines with no stoppage in the period.
    pub machines_without_data: Vec<MachineKey>,
}

impl StoppageReport {
    /// Query the engine's live event log.
    pub fn from_engine(
        engine: &Engine,
        query: &StoppageQuery,
        now_ms: u64,
        registry: &dyn MachineRegistry,
    ) -> Self {
        let intervals = engine.stoppages(query.period.window(now_ms), now_ms);
        Self::paginate(intervals, query, now_ms, registry)
    }

    /// Query a stored status log.
    ///
    /// Events after `now_ms` are ignored; a stoppage opened before the period
    /// and still open during it is reported with its true start.
    pub fn from_events(
        events: &[StatusEvent],
        query: &StoppageQuery,
        now_ms: u64,
        registry: &dyn MachineRegistry,
    ) -> Self {
        let window = query.period.window(now_ms);
        let relevant: Vec<StatusEvent> = events
            .iter()
            .filter(|e| e.timestamp_ms <= now_ms && query.selects(&e.machine_key))
            .cloned()
            .collect();
        let mut intervals = reconstruct(&relevant, now_ms);
        intervals.retain(|i| i.overlaps(window.from_ms, window.to_ms.saturating_add(1)));
        Self::paginate(intervals, query, now_ms, registry)
    }

    fn paginate(
        mut intervals: Vec<StoppageInterval>,
        query: &StoppageQuery,
        now_ms: u64,
        registry: &dyn MachineRegistry,
    ) -> Self {
        intervals.retain(|i| query.selects(&i.machine_key));

        let seen: Vec<MachineKey> = intervals.iter().map(|i| i.machine_key.clone()).collect();
        let machines_without_data = registry
            .missing_from(&seen)
            .into_iter()
            .filter(|key| query.selects(key))
            .collect();

        let summary = summarize(&intervals, now_ms);
        let total = intervals.len();
        let page = query.page();
        let limit = query.limit();
        let rows: Vec<StoppageInterval> = intervals
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect();

        Self {
            rows,
            page,
            has_next_page: total > page.saturating_mul(limit),
            total,
            summary,
            machines_without_data,
        }
    }
}
