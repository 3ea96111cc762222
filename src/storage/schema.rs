//! Sample schema and row parsing
//!
//! ## Row Layout
//!
//! Every sample written by the ingestion worker is a point in the kind's
//! measurement, tagged with `ContainerName` and carrying the snapshot
//! attributes as fields. Read queries come back as series of untyped
//! value rows. Sink adapters reorder those rows into one canonical
//! positional layout:
//!
//! ```text
//! [time, ContainerID, ContainerName, ContainerNetwork, ContainerState, ContainerStatus, ImageName, Status]
//! ```
//!
//! Consumers index rows positionally against [`COLUMNS`]. All
//! missing-or-mistyped value handling lives in [`SampleRow::parse`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{trace, warn};

use crate::actors::messages::LifecycleEvent;
use crate::{LifecycleStatus, UNKNOWN_KIND, UNKNOWN_MEASUREMENT, WorkloadSnapshot};

use super::backend::{FieldValue, Point};

pub const TAG_CONTAINER_NAME: &str = "ContainerName";
pub const FIELD_CONTAINER_ID: &str = "ContainerID";
pub const FIELD_CONTAINER_NETWORK: &str = "ContainerNetwork";
pub const FIELD_CONTAINER_STATE: &str = "ContainerState";
pub const FIELD_CONTAINER_STATUS: &str = "ContainerStatus";
pub const FIELD_CONTAINER_CREATED: &str = "ContainerCreated";
pub const FIELD_IMAGE_NAME: &str = "ImageName";
pub const FIELD_STATUS: &str = "Status";

/// Canonical positional column order of a sample row
pub const COLUMNS: [&str; 8] = [
    "time",
    FIELD_CONTAINER_ID,
    TAG_CONTAINER_NAME,
    FIELD_CONTAINER_NETWORK,
    FIELD_CONTAINER_STATE,
    FIELD_CONTAINER_STATUS,
    FIELD_IMAGE_NAME,
    FIELD_STATUS,
];

const COL_TIME: usize = 0;
const COL_ID: usize = 1;
const COL_NAME: usize = 2;
const COL_NETWORK: usize = 3;
const COL_STATE: usize = 4;
const COL_STATUS_TEXT: usize = 5;
const COL_IMAGE: usize = 6;
const COL_LIFECYCLE: usize = 7;

/// Result of a read query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub series: Vec<Series>,
}

impl QueryResponse {
    pub fn first_series(&self) -> Option<&Series> {
        self.series.first()
    }
}

/// One named series of value rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<Vec<Value>>,
}

impl Series {
    /// Reorder the rows into the canonical [`COLUMNS`] layout.
    ///
    /// Columns the series does not carry become `null`; extra columns are
    /// dropped.
    pub fn canonicalize(self) -> Series {
        let positions: Vec<Option<usize>> = COLUMNS
            .iter()
            .map(|wanted| self.columns.iter().position(|c| c == wanted))
            .collect();

        let values = self
            .values
            .into_iter()
            .map(|row| {
                positions
                    .iter()
                    .map(|pos| pos.and_then(|i| row.get(i).cloned()).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Series {
            name: self.name,
            columns: COLUMNS.iter().map(|c| c.to_string()).collect(),
            values,
        }
    }

    /// Parse every row, skipping rows without a recognizable status.
    pub fn rows(&self) -> Vec<SampleRow> {
        self.values
            .iter()
            .filter_map(|values| SampleRow::parse(values))
            .collect()
    }
}

/// A parsed sample: when it was written and what it observed
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    pub time: DateTime<Utc>,
    pub snapshot: WorkloadSnapshot,
}

impl SampleRow {
    /// Best-effort positional parse of a canonical row.
    ///
    /// A value that is missing or not a string becomes the empty string; an
    /// unparseable time becomes the unix epoch. Returns `None` only when the
    /// `Status` column is neither `start` nor `stop`, since such a row
    /// carries no lifecycle information.
    pub fn parse(values: &[Value]) -> Option<SampleRow> {
        let text = |index: usize| -> String {
            match values.get(index) {
                Some(Value::String(s)) => s.clone(),
                _ => String::new(),
            }
        };

        let raw_time = text(COL_TIME);
        let time = DateTime::parse_from_rfc3339(&raw_time)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|e| {
                warn!("unparseable sample time {raw_time:?}: {e}");
                DateTime::<Utc>::UNIX_EPOCH
            });

        let status = text(COL_LIFECYCLE);
        let Some(lifecycle_status) = LifecycleStatus::parse(&status) else {
            warn!("skipping sample row with unknown status {status:?}");
            return None;
        };

        Some(SampleRow {
            time,
            snapshot: WorkloadSnapshot {
                name: text(COL_NAME),
                id: text(COL_ID),
                image_name: text(COL_IMAGE),
                created_at: None,
                network: text(COL_NETWORK),
                runtime_state: text(COL_STATE),
                runtime_status_text: text(COL_STATUS_TEXT),
                lifecycle_status,
            },
        })
    }
}

/// Build the point the ingestion worker writes for `event`.
pub fn point_for_event(event: &LifecycleEvent, timestamp: DateTime<Utc>) -> Point {
    let (tag, measurement) = match event.kind {
        Some(kind) => (kind.name(), kind.measurement()),
        None => (UNKNOWN_KIND, UNKNOWN_MEASUREMENT),
    };

    let snapshot = &event.snapshot;
    let mut fields = BTreeMap::from([
        (FIELD_CONTAINER_ID.to_string(), FieldValue::from(snapshot.id.as_str())),
        (FIELD_IMAGE_NAME.to_string(), FieldValue::from(snapshot.image_name.as_str())),
        (FIELD_STATUS.to_string(), FieldValue::from(snapshot.lifecycle_status.as_str())),
    ]);

    let optional = [
        (FIELD_CONTAINER_NETWORK, &snapshot.network),
        (FIELD_CONTAINER_STATE, &snapshot.runtime_state),
        (FIELD_CONTAINER_STATUS, &snapshot.runtime_status_text),
    ];
    for (key, value) in optional {
        if !value.is_empty() {
            fields.insert(key.to_string(), FieldValue::from(value.as_str()));
        }
    }
    if let Some(created) = snapshot.created_at {
        fields.insert(FIELD_CONTAINER_CREATED.to_string(), FieldValue::Integer(created));
    }

    trace!("built point for {measurement} with {} fields", fields.len());

    Point {
        measurement: measurement.to_string(),
        tags: BTreeMap::from([(TAG_CONTAINER_NAME.to_string(), tag.to_string())]),
        fields,
        timestamp,
    }
}

/// Render a point back into a canonical row (used by in-process sinks).
pub fn row_for_point(point: &Point) -> Vec<Value> {
    let field = |key: &str| -> Value {
        match point.fields.get(key) {
            Some(FieldValue::String(s)) => Value::String(s.clone()),
            Some(FieldValue::Integer(i)) => Value::from(*i),
            Some(FieldValue::Float(f)) => Value::from(*f),
            Some(FieldValue::Boolean(b)) => Value::Bool(*b),
            None => Value::Null,
        }
    };

    vec![
        Value::String(point.timestamp.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)),
        field(FIELD_CONTAINER_ID),
        point
            .tags
            .get(TAG_CONTAINER_NAME)
            .map(|name| Value::String(name.clone()))
            .unwrap_or(Value::Null),
        field(FIELD_CONTAINER_NETWORK),
        field(FIELD_CONTAINER_STATE),
        field(FIELD_CONTAINER_STATUS),
        field(FIELD_IMAGE_NAME),
        field(FIELD_STATUS),
    ]
}
