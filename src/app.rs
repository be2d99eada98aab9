//! Application state.

use anyhow::Result;
use plcwatch_sdk::{Engine, Output, ReplayStats};
use plcwatch_types::StatusEvent;

use crate::config::Settings;
use crate::data::{FleetData, StoppageQuery, StoppageReport};
use crate::registry::StaticRegistry;
use crate::source::SampleSource;

/// Owns the sample source, the engine and the registry, and answers the
/// three questions the CLI asks: what is running now, what stopped when,
/// and how much downtime was there.
pub struct App {
    source: Option<Box<dyn SampleSource>>,
    engine: Engine,
    registry: StaticRegistry,
    settings: Settings,
    /// Stored status logs; when present, history is read from them instead
    /// of the live log.
    status_logs: Option<Vec<StatusEvent>>,
    pub load_error: Option<String>,
    /// Totals over every batch ingested so far.
    pub stats: ReplayStats,
}

impl App {
    pub fn new(
        source: Option<Box<dyn SampleSource>>,
        settings: Settings,
        outputs: Vec<Output>,
    ) -> Result<Self> {
        let mut builder = Engine::builder()
            .thresholds(settings.thresholds()?)
            .interval(settings.tick_interval()?)
            .legacy_tracking(settings.legacy_tracking);
        for output in outputs {
            builder = builder.output(output);
        }
        let registry = settings.registry()?;

        Ok(Self {
            source,
            engine: builder.build(),
            registry,
            settings,
            status_logs: None,
            load_error: None,
            stats: ReplayStats::default(),
        })
    }

    pub fn with_status_logs(mut self, events: Vec<StatusEvent>) -> Self {
        self.status_logs = Some(events);
        self
    }

    pub fn source_description(&self) -> &str {
        self.source
            .as_ref()
            .map_or("status logs", |source| source.description())
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &StaticRegistry {
        &self.registry
    }

    /// Poll the source and feed any new samples to the engine.
    ///
    /// Returns Ok(true) if new samples were ingested.
    pub fn reload_data(&mut self, now_ms: u64) -> Result<bool> {
        let Some(source) = self.source.as_mut() else {
            return Ok(false);
        };

        let batch = source.poll();
        self.load_error = source.error().map(str::to_string);

        let Some(samples) = batch else {
            return Ok(false);
        };

        let stats = self.engine.replay(samples, now_ms);
        self.stats.accepted += stats.accepted;
        self.stats.malformed += stats.malformed;
        self.stats.out_of_order += stats.out_of_order;
        self.stats.duplicates += stats.duplicates;
        self.stats.events += stats.events;
        Ok(true)
    }

    /// Re-classify every machine at `now_ms`. Returns the number of decays logged.
    pub fn tick(&self, now_ms: u64) -> usize {
        self.engine.tick(now_ms).len()
    }

    pub fn fleet(&self, now_ms: u64) -> FleetData {
        FleetData::build(&self.engine, now_ms, &self.registry)
    }

    pub fn stoppages(&self, query: &StoppageQuery, now_ms: u64) -> StoppageReport {
        match &self.status_logs {
            Some(events) => StoppageReport::from_events(events, query, now_ms, &self.registry),
            None => StoppageReport::from_engine(&self.engine, query, now_ms, &self.registry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ChannelSource;
    use plcwatch_types::{MachineKey, MachineStatus, TelemetrySample};

    fn key() -> MachineKey {
        MachineKey::new("siemens", "s7").unwrap()
    }

    fn running(ts: u64) -> TelemetrySample {
        TelemetrySample::builder(key())
            .timestamp_ms(ts)
            .plc_running(true)
            .motor_status(1)
            .build()
    }

    fn app_with_channel(settings: Settings) -> (tokio::sync::mpsc::Sender<TelemetrySample>, App) {
        let (tx, source) = ChannelSource::create("test");
        let app = App::new(Some(Box::new(source)), settings, Vec::new()).unwrap();
        (tx, app)
    }

    #[test]
    fn reload_ingests_batches() {
        let (tx, mut app) = app_with_channel(Settings::default());

        assert!(!app.reload_data(0).unwrap());

        tx.try_send(running(0)).unwrap();
        tx.try_send(running(5_000)).unwrap();
        assert!(app.reload_data(6_000).unwrap());
        assert_eq!(app.stats.accepted, 2);
        assert_eq!(app.source_description(), "channel: test");

        let fleet = app.fleet(6_000);
        assert_eq!(fleet.machines[0].status, MachineStatus::Running);
    }

    #[test]
    fn silent_feed_becomes_a_stoppage() {
        let (tx, mut app) = app_with_channel(Settings::default());
        tx.try_send(running(0)).unwrap();
        app.reload_data(1_000).unwrap();

        app.tick(25_000);
        app.tick(40_000);
        assert_eq!(app.fleet(40_000).machines[0].status, MachineStatus::Stopped);

        let report = app.stoppages(&StoppageQuery::default(), 100_000);
        assert_eq!(report.total, 1);
        assert!(report.rows[0].is_ongoing);
        assert_eq!(report.rows[0].start_ms, 30_001);
    }

    #[test]
    fn registry_machines_appear_without_data() {
        let settings = Settings {
            machines: vec!["omron_cp1e".into()],
            ..Settings::default()
        };
        let (_tx, app) = app_with_channel(settings);

        let fleet = app.fleet(0);
        assert_eq!(fleet.len(), 1);
        assert!(!fleet.machines[0].has_data);
        assert_eq!(
            app.stoppages(&StoppageQuery::default(), 0).machines_without_data,
            vec![MachineKey::new("omron", "cp1e").unwrap()]
        );
    }

    #[test]
    fn status_logs_drive_history() {
        let events = vec![StatusEvent::initial(
            key(),
            10_000,
            MachineStatus::Stopped,
            Default::default(),
        )];
        let app = App::new(None, Settings::default(), Vec::new())
            .unwrap()
            .with_status_logs(events);

        assert_eq!(app.source_description(), "status logs");
        let report = app.stoppages(&StoppageQuery::default(), 70_000);
        assert_eq!(report.total, 1);
        assert_eq!(report.summary.total_downtime_seconds, 60);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let settings = Settings {
            idle_after: "1m".into(),
            ..Settings::default()
        };
        assert!(App::new(None, settings, Vec::new()).is_err());
    }
}
