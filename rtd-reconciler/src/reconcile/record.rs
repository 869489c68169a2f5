//! The reconciled, persisted representation of one stop.

use chrono::NaiveDateTime;
use tracing::debug;

use crate::domain::{NaturalKey, StopId, parse_feed_time};
use crate::feed::{RawEvent, RawMessage, RawPlanStop, RawTrainLabel, split_path};

/// Parse an optional feed time, treating garbage as absent.
fn parse_time(field: &'static str, value: Option<&str>) -> Option<NaiveDateTime> {
    let value = value?;
    match parse_feed_time(value) {
        Ok(t) => Some(t),
        Err(e) => {
            debug!(field, value, error = %e, "Ignoring unparseable time");
            None
        }
    }
}

/// Message history, one entry per message in every array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageLog {
    pub id: Vec<Option<String>>,
    pub t: Vec<Option<String>>,
    pub ts: Vec<Option<NaiveDateTime>>,
    pub c: Vec<Option<i32>>,
}

impl MessageLog {
    /// Append one message.
    pub fn push(&mut self, message: &RawMessage) {
        self.id.push(message.id.clone());
        self.t.push(message.t.clone());
        self.ts.push(parse_time("m.ts", message.ts.as_deref()));
        self.c.push(message.c);
    }

    pub fn len(&self) -> usize {
        self.id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }
}

/// Arrival or departure of a stop.
///
/// `p*` fields are as planned, `c*` fields are the current state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopEvent {
    pub pp: Option<String>,
    pub cp: Option<String>,
    pub pt: Option<NaiveDateTime>,
    pub ct: Option<NaiveDateTime>,
    pub ps: Option<String>,
    pub cs: Option<String>,
    pub hi: Option<i32>,
    pub clt: Option<NaiveDateTime>,
    pub wings: Option<String>,
    pub tra: Option<String>,
    pub pde: Option<String>,
    pub cde: Option<String>,
    pub dc: Option<i32>,
    pub l: Option<String>,
    /// Planned path. Only kept until route annotation.
    pub ppth: Option<Vec<String>>,
    /// Current path. Only kept until route annotation.
    pub cpth: Option<Vec<String>>,
    pub messages: MessageLog,
}

impl StopEvent {
    /// Build the event from its plan entry, with current values equal to
    /// the planned ones.
    pub fn planned(raw: Option<&RawEvent>) -> Self {
        let mut event = Self::default();
        if let Some(raw) = raw {
            event.overwrite(raw);
        }
        event.cp = event.cp.take().or_else(|| event.pp.clone());
        event.ct = event.ct.or(event.pt);
        event.cs = event.cs.take().or_else(|| event.ps.clone());
        event.cpth = event.cpth.take().or_else(|| event.ppth.clone());
        event
    }

    /// Overwrite every attribute present in `raw` and append its messages.
    pub fn overwrite(&mut self, raw: &RawEvent) {
        fn set<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
            if let Some(v) = value {
                *slot = Some(v.clone());
            }
        }

        set(&mut self.pp, &raw.pp);
        set(&mut self.cp, &raw.cp);
        set(&mut self.ps, &raw.ps);
        set(&mut self.cs, &raw.cs);
        set(&mut self.hi, &raw.hi);
        set(&mut self.wings, &raw.wings);
        set(&mut self.tra, &raw.tra);
        set(&mut self.pde, &raw.pde);
        set(&mut self.cde, &raw.cde);
        set(&mut self.dc, &raw.dc);
        set(&mut self.l, &raw.l);

        if let Some(t) = parse_time("pt", raw.pt.as_deref()) {
            self.pt = Some(t);
        }
        if let Some(t) = parse_time("ct", raw.ct.as_deref()) {
            self.ct = Some(t);
        }
        if let Some(t) = parse_time("clt", raw.clt.as_deref()) {
            self.clt = Some(t);
        }
        if let Some(path) = &raw.ppth {
            self.ppth = Some(split_path(path));
        }
        if let Some(path) = &raw.cpth {
            self.cpth = Some(split_path(path));
        }

        for message in &raw.m {
            self.messages.push(message);
        }
    }

    /// Drop the path fields, which are not persisted.
    pub fn clear_paths(&mut self) {
        self.ppth = None;
        self.cpth = None;
    }
}

/// Train category, owner and number.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainLabel {
    pub f: Option<String>,
    pub t: Option<String>,
    pub o: Option<String>,
    pub c: Option<String>,
    pub n: Option<String>,
}

impl From<&RawTrainLabel> for TrainLabel {
    fn from(raw: &RawTrainLabel) -> Self {
        Self {
            f: raw.f.clone(),
            t: raw.t.clone(),
            o: raw.o.clone(),
            c: raw.c.clone(),
            n: raw.n.clone(),
        }
    }
}

/// Position of the stop along its route, in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RouteDistances {
    /// Along the arrival path from its first station to this stop.
    pub to_start: f64,
    /// Along the departure path from this stop to its last station.
    pub to_end: f64,
    /// From the previous station to this stop.
    pub to_last: f64,
    /// From this stop to the next station.
    pub to_next: f64,
}

/// Obstacle priority scores. Not derived here; persisted as null for
/// downstream enrichment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ObstaclePriorities {
    pub priority_24: Option<f64>,
    pub priority_37: Option<f64>,
    pub priority_63: Option<f64>,
    pub priority_65: Option<f64>,
    pub priority_70: Option<f64>,
    pub priority_80: Option<f64>,
}

/// One physical stop after plan and changes are reconciled.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalStopRecord {
    pub hash_id: StopId,
    pub key: NaturalKey,
    pub station: String,
    pub label: TrainLabel,
    pub ar: StopEvent,
    pub dp: StopEvent,
    /// Messages about the stop as a whole.
    pub messages: MessageLog,
    /// Set by route annotation.
    pub distances: Option<RouteDistances>,
    pub obstacles: ObstaclePriorities,
    pub attributes: PlanAttributes,
}

/// Plan attributes stored as published, without interpretation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanAttributes {
    pub hd: Option<serde_json::Value>,
    pub hdc: Option<serde_json::Value>,
    pub conn: Option<serde_json::Value>,
    pub rtr: Option<serde_json::Value>,
}

impl From<&RawPlanStop> for PlanAttributes {
    fn from(stop: &RawPlanStop) -> Self {
        Self {
            hd: stop.hd.clone(),
            hdc: stop.hdc.clone(),
            conn: stop.conn.clone(),
            rtr: stop.rtr.clone(),
        }
    }
}

impl CanonicalStopRecord {
    /// Planned time of the stop: arrival if there is one, else departure.
    pub fn planned_time(&self) -> Option<NaiveDateTime> {
        self.ar.pt.or(self.dp.pt)
    }
}
