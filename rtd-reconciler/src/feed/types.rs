//! Timetable feed DTOs.
//!
//! These types map directly to the per-hour plan and change documents.
//! Every field is optional because the feed omits attributes rather than
//! sending nulls. Arrival (`ar`), departure (`dp`) and train label (`tl`)
//! arrive as single-element lists.

use serde::{Deserialize, Serialize};

/// A scheduled stop from an hourly plan document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPlanStop {
    /// Natural key `dailyId-yyMMddHHmm-sequence`.
    pub id: String,

    /// Train label.
    #[serde(default)]
    pub tl: Vec<RawTrainLabel>,

    /// Arrival event.
    #[serde(default)]
    pub ar: Vec<RawEvent>,

    /// Departure event.
    #[serde(default)]
    pub dp: Vec<RawEvent>,

    /// Historic delay, kept as published.
    #[serde(default)]
    pub hd: Option<serde_json::Value>,

    /// Historic change, kept as published.
    #[serde(default)]
    pub hdc: Option<serde_json::Value>,

    /// Connection.
    #[serde(default)]
    pub conn: Option<serde_json::Value>,

    /// Reference trip relation.
    #[serde(default)]
    pub rtr: Option<serde_json::Value>,
}

impl RawPlanStop {
    pub fn train_label(&self) -> Option<&RawTrainLabel> {
        self.tl.first()
    }

    pub fn arrival(&self) -> Option<&RawEvent> {
        self.ar.first()
    }

    pub fn departure(&self) -> Option<&RawEvent> {
        self.dp.first()
    }
}

/// A realtime revision of one stop from an hourly change document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChangeEvent {
    /// Natural key of the stop this change applies to.
    pub id: String,

    #[serde(default)]
    pub ar: Vec<RawEvent>,

    #[serde(default)]
    pub dp: Vec<RawEvent>,

    /// Messages about the stop as a whole.
    #[serde(default)]
    pub m: Vec<RawMessage>,
}

impl RawChangeEvent {
    pub fn arrival(&self) -> Option<&RawEvent> {
        self.ar.first()
    }

    pub fn departure(&self) -> Option<&RawEvent> {
        self.dp.first()
    }
}

/// Train category, owner and number.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTrainLabel {
    /// Filter flag (`F` long distance, `N` regional, `S` suburban).
    pub f: Option<String>,
    /// Trip type.
    pub t: Option<String>,
    /// Owner.
    pub o: Option<String>,
    /// Category, e.g. `ICE`.
    pub c: Option<String>,
    /// Train number.
    pub n: Option<String>,
}

/// Arrival or departure event.
///
/// `p*` attributes are planned, `c*` attributes are changed values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Planned platform.
    pub pp: Option<String>,
    /// Changed platform.
    pub cp: Option<String>,
    /// Planned time (`yyMMddHHmm`).
    pub pt: Option<String>,
    /// Changed time.
    pub ct: Option<String>,
    /// Planned status.
    pub ps: Option<String>,
    /// Changed status (`c` cancelled, `a` added, `p` planned).
    pub cs: Option<String>,
    /// Planned path, `|`-separated station names.
    pub ppth: Option<String>,
    /// Changed path.
    pub cpth: Option<String>,
    /// Hidden flag.
    pub hi: Option<i32>,
    /// Cancellation time.
    pub clt: Option<String>,
    pub wings: Option<String>,
    /// Transition (trip continues as another trip).
    pub tra: Option<String>,
    /// Planned distant endpoint.
    pub pde: Option<String>,
    /// Changed distant endpoint.
    pub cde: Option<String>,
    /// Distant change.
    pub dc: Option<i32>,
    /// Line label.
    pub l: Option<String>,
    /// Messages scoped to this event.
    #[serde(default)]
    pub m: Vec<RawMessage>,
}

/// A realtime message fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: Option<String>,
    /// Message type, e.g. `d` delay, `q` quality.
    pub t: Option<String>,
    /// Timestamp (`yyMMddHHmm`).
    pub ts: Option<String>,
    /// Code.
    pub c: Option<i32>,
}

/// Split a `|`-separated feed path into station names.
///
/// An empty string is an empty path.
pub fn split_path(path: &str) -> Vec<String> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split('|').map(str::to_string).collect()
}
