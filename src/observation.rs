// src/observation.rs
//! One capture of every listed hospital's wait time for one city.

use chrono::{Local, NaiveDateTime};
use mongodb::bson::{Bson, Document};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Field name of the capture time in every persisted record.
pub const TIMESTAMP_FIELD: &str = "time_stamp";

/// e.g. `Tue Oct 14 2025 - 09:00:03`
pub const DATE_TIME_FORMAT: &str = "%a %b %d %Y - %H:%M:%S";

pub fn format_timestamp(dt: &NaiveDateTime) -> String {
    dt.format(DATE_TIME_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, DATE_TIME_FORMAT)
}

/// Storage field names may not contain `.`, so dots become `*`.
pub fn sanitize_hospital_name(name: &str) -> String {
    name.replace('.', "*")
}

/// Inverse of [`sanitize_hospital_name`] for readers of stored records.
pub fn display_hospital_name(key: &str) -> String {
    key.replace('*', ".")
}

/// `None` marks a hospital listed without a usable wait time.
pub type WaitMinutes = Option<u32>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    timestamp: String,
    waits: Vec<(String, WaitMinutes)>,
}

impl Observation {
    /// Builds an observation from raw (unsanitized) hospital names in page order.
    /// A repeated name keeps its first position and takes the later value.
    pub fn from_entries<I, S>(captured_at: NaiveDateTime, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, WaitMinutes)>,
        S: AsRef<str>,
    {
        let mut waits: Vec<(String, WaitMinutes)> = Vec::new();
        for (name, wait) in entries {
            let key = sanitize_hospital_name(name.as_ref());
            match waits.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = wait,
                None => waits.push((key, wait)),
            }
        }
        Self {
            timestamp: format_timestamp(&captured_at),
            waits,
        }
    }

    /// Same as [`Observation::from_entries`], stamped with the local wall clock.
    pub fn captured_now<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, WaitMinutes)>,
        S: AsRef<str>,
    {
        Self::from_entries(Local::now().naive_local(), entries)
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Sanitized hospital keys with their waits, in page order.
    pub fn waits(&self) -> &[(String, WaitMinutes)] {
        &self.waits
    }

    /// `None` if the hospital is absent, `Some(None)` if listed as unknown.
    pub fn wait_for(&self, key: &str) -> Option<WaitMinutes> {
        self.waits.iter().find(|(k, _)| k == key).map(|(_, w)| *w)
    }

    pub fn hospital_count(&self) -> usize {
        self.waits.len()
    }

    pub fn unknown_count(&self) -> usize {
        self.waits.iter().filter(|(_, w)| w.is_none()).count()
    }

    /// Timestamp field first, then hospitals in page order.
    pub fn field_names(&self) -> Vec<&str> {
        std::iter::once(TIMESTAMP_FIELD)
            .chain(self.waits.iter().map(|(k, _)| k.as_str()))
            .collect()
    }

    /// Value of `field` as a CSV cell: minutes, or empty for unknown/absent.
    pub fn csv_cell(&self, field: &str) -> String {
        if field == TIMESTAMP_FIELD {
            return self.timestamp.clone();
        }
        match self.wait_for(field) {
            Some(Some(minutes)) => minutes.to_string(),
            _ => String::new(),
        }
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert(TIMESTAMP_FIELD, self.timestamp.clone());
        for (key, wait) in &self.waits {
            let value = match wait {
                Some(m) => i32::try_from(*m)
                    .map(Bson::Int32)
                    .unwrap_or(Bson::Int64(i64::from(*m))),
                None => Bson::Null,
            };
            doc.insert(key.clone(), value);
        }
        doc
    }
}

impl Serialize for Observation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.waits.len() + 1))?;
        map.serialize_entry(TIMESTAMP_FIELD, &self.timestamp)?;
        for (key, wait) in &self.waits {
            map.serialize_entry(key, wait)?;
        }
        map.end()
    }
}
