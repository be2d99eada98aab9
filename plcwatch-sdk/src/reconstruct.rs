//! Stoppage reconstruction from the status event log.
//!
//! Reconstruction walks each machine's events in time order and pairs
//! stop-indicating events with the next start-indicating event. It is a pure
//! function of the event list and `now`: nothing is cached between calls and
//! the input order does not matter.
//!
//! Two provenances feed the log. Events from the liveness classifier
//! (`initial` and `status`) and events from the raw device flag
//! (`legacy_running_flag`) can both report the same stoppage. While an
//! interval is open:
//!
//! - a stop from the other provenance corroborates it and is ignored,
//! - a stop from the same provenance closes it and opens a fresh one,
//! - a start from either provenance closes it.
//!
//! An `initial` event never closes an interval that is already open.

use std::collections::BTreeMap;

use plcwatch_types::{
    span_seconds, EventType, MachineKey, Readings, StatusEvent, StatusType, StoppageInterval,
};

/// What an event means for stoppage tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Stop,
    Start,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provenance {
    Classifier,
    RunningFlag,
}

fn provenance(status_type: StatusType) -> Provenance {
    match status_type {
        StatusType::Initial | StatusType::Status => Provenance::Classifier,
        StatusType::LegacyRunningFlag => Provenance::RunningFlag,
    }
}

fn by_event_type(event_type: EventType) -> Signal {
    match event_type {
        EventType::Stopped => Signal::Stop,
        EventType::Started => Signal::Start,
    }
}

fn signal(event: &StatusEvent) -> Signal {
    match event.status_type {
        StatusType::Initial => {
            if event.current_status.is_stopped() || event.event_type == EventType::Stopped {
                Signal::Stop
            } else {
                Signal::Neutral
            }
        }
        StatusType::Status => match event.previous_status {
            // Running <-> Idle never starts or ends a stoppage.
            Some(previous) => match (previous.is_stopped(), event.current_status.is_stopped()) {
                (false, true) => Signal::Stop,
                (true, false) => Signal::Start,
                _ => Signal::Neutral,
            },
            None => by_event_type(event.event_type),
        },
        StatusType::LegacyRunningFlag => by_event_type(event.event_type),
    }
}

struct Open {
    start_ms: u64,
    provenance: Provenance,
    readings: Readings,
}

fn closed(key: &MachineKey, open: &Open, end_ms: u64) -> StoppageInterval {
    let span = span_seconds(open.start_ms, end_ms);
    if span.skewed {
        tracing::warn!(
            machine = %key,
            start_ms = open.start_ms,
            end_ms,
            "negative stoppage duration, using absolute value"
        );
    }
    StoppageInterval {
        machine_key: key.clone(),
        start_ms: open.start_ms,
        end_ms: Some(end_ms),
        duration_seconds: span.seconds,
        is_ongoing: false,
        clock_skew: span.skewed,
        readings: open.readings,
    }
}

fn ongoing(key: &MachineKey, open: &Open, now_ms: u64) -> StoppageInterval {
    let span = span_seconds(open.start_ms, now_ms);
    if span.skewed {
        tracing::warn!(
            machine = %key,
            start_ms = open.start_ms,
            now_ms,
            "ongoing stoppage starts in the future, using absolute value"
        );
    }
    StoppageInterval {
        machine_key: key.clone(),
        start_ms: open.start_ms,
        end_ms: None,
        duration_seconds: span.seconds,
        is_ongoing: true,
        clock_skew: span.skewed,
        readings: open.readings,
    }
}

fn reconstruct_machine(
    key: &MachineKey,
    mut events: Vec<&StatusEvent>,
    now_ms: u64,
    out: &mut Vec<StoppageInterval>,
) {
    let out_of_order = events
        .windows(2)
        .filter(|pair| pair[1].timestamp_ms < pair[0].timestamp_ms)
        .count();
    if out_of_order > 0 {
        tracing::debug!(machine = %key, out_of_order, "events arrived out of order");
    }

    // Stable, so same-instant events keep their log order.
    events.sort_by_key(|e| e.timestamp_ms);

    let mut open: Option<Open> = None;
    for event in events {
        let source = provenance(event.status_type);
        match signal(event) {
            Signal::Stop => match &open {
                None => {
                    open = Some(Open {
                        start_ms: event.timestamp_ms,
                        provenance: source,
                        readings: event.readings,
                    });
                }
                Some(_) if event.status_type == StatusType::Initial => {}
                Some(current) if current.provenance != source => {}
                Some(current) => {
                    tracing::debug!(machine = %key, ts = event.timestamp_ms, "duplicate stop");
                    if event.timestamp_ms > current.start_ms {
                        out.push(closed(key, current, event.timestamp_ms));
                    }
                    open = Some(Open {
                        start_ms: event.timestamp_ms,
                        provenance: source,
                        readings: event.readings,
                    });
                }
            },
            Signal::Start => {
                if let Some(current) = open.take() {
                    out.push(closed(key, &current, event.timestamp_ms));
                }
            }
            Signal::Neutral => {}
        }
    }

    if let Some(current) = open {
        out.push(ongoing(key, &current, now_ms));
    }
}

/// Rebuild stoppage intervals from status events.
///
/// Events may belong to any number of machines and arrive in any order.
/// Machines are processed independently. Output is sorted by start time,
/// newest first.
pub fn reconstruct(events: &[StatusEvent], now_ms: u64) -> Vec<StoppageInterval> {
    let mut by_machine: BTreeMap<&MachineKey, Vec<&StatusEvent>> = BTreeMap::new();
    for event in events {
        by_machine.entry(&event.machine_key).or_default().push(event);
    }

    let mut intervals = Vec::new();
    for (key, group) in by_machine {
        reconstruct_machine(key, group, now_ms, &mut intervals);
    }

    intervals.sort_by(|a, b| {
        b.start_ms
            .cmp(&a.start_ms)
            .then_with(|| a.machine_key.cmp(&b.machine_key))
    });
    intervals
}
