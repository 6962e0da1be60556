//! # AEMP Fleet Telemetry Decoder
//!
//! Decodes the ISO 15143-3 (AEMP 2.0) XML fleet snapshot into flat
//! [`FleetTelemetry`] records.
//!
//! ## Feed Shape
//! ```text
//! <Fleet>
//!   <Links><rel>next</rel><href>https://aemp.example/Fleet/2</href></Links>
//!   <Equipment>
//!     <EquipmentHeader>
//!       <OEMName>Deere</OEMName> <Model>8R 410</Model>
//!       <EquipmentID>1234</EquipmentID> <SerialNumber>1RW...</SerialNumber>
//!     </EquipmentHeader>
//!     <Location> <Latitude/> <Longitude/> <DateTime/> </Location>
//!     <CumulativeOperatingHours><Hour>1520.5</Hour></CumulativeOperatingHours>
//!     <FuelRemaining><Percent>42</Percent></FuelRemaining>
//!     ...
//!   </Equipment>
//! </Fleet>
//! ```
//!
//! ## Decoding
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  for each <Equipment> block                                             │
//! │      for each row of FLEET_FIELD_MAP (tag path → target → parser)       │
//! │          text  = element_text(block, path)      (elements only)         │
//! │          value = parser.parse(text)             (never fails)           │
//! │          record.assign(target, value)                                   │
//! │                                                                         │
//! │  next page?  any href containing /Fleet/{k} with k > current            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The decoder never fails on content: missing or unparseable numbers read
//! as 0, strings as "", timestamps as absent.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::vendor::parse_timestamp;

// =============================================================================
// Decoded Record
// =============================================================================

/// One machine's telemetry snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FleetTelemetry {
    pub equipment_id: String,
    pub make: String,
    pub model: String,
    pub serial_number: String,
    pub latitude: f64,
    pub longitude: f64,
    pub location_at: Option<DateTime<Utc>>,
    pub operating_hours: f64,
    pub idle_hours: f64,
    pub fuel_used: f64,
    /// In [0, 1].
    pub fuel_remaining_ratio: f64,
    /// In [0, 1].
    pub def_remaining_ratio: f64,
    pub distance: f64,
}

impl FleetTelemetry {
    /// Display name for machines first seen through the feed.
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.make, self.model).trim().to_string();
        if name.is_empty() {
            self.equipment_id.clone()
        } else {
            name
        }
    }

    fn assign(&mut self, target: Target, value: ParsedValue) {
        match target {
            Target::EquipmentId => self.equipment_id = value.into_text(),
            Target::Make => self.make = value.into_text(),
            Target::Model => self.model = value.into_text(),
            Target::SerialNumber => self.serial_number = value.into_text(),
            Target::Latitude => self.latitude = value.number(),
            Target::Longitude => self.longitude = value.number(),
            Target::LocationAt => self.location_at = value.timestamp(),
            Target::OperatingHours => self.operating_hours = value.number(),
            Target::IdleHours => self.idle_hours = value.number(),
            Target::FuelUsed => self.fuel_used = value.number(),
            Target::FuelRemaining => self.fuel_remaining_ratio = value.number(),
            Target::DefRemaining => self.def_remaining_ratio = value.number(),
            Target::Distance => self.distance = value.number(),
        }
    }
}

// =============================================================================
// Field Mapping Table
// =============================================================================

/// Column of [`FleetTelemetry`] a mapping writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    EquipmentId,
    Make,
    Model,
    SerialNumber,
    Latitude,
    Longitude,
    LocationAt,
    OperatingHours,
    IdleHours,
    FuelUsed,
    FuelRemaining,
    DefRemaining,
    Distance,
}

/// How an element's text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parser {
    Text,
    Number,
    /// 0–100 percent read as a [0, 1] ratio, clamped.
    Percent,
    Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
enum ParsedValue {
    Text(String),
    Number(f64),
    Timestamp(Option<DateTime<Utc>>),
}

impl ParsedValue {
    fn into_text(self) -> String {
        match self {
            ParsedValue::Text(s) => s,
            ParsedValue::Number(n) => n.to_string(),
            ParsedValue::Timestamp(ts) => ts.map(|t| t.to_rfc3339()).unwrap_or_default(),
        }
    }

    fn number(&self) -> f64 {
        match self {
            ParsedValue::Number(n) => *n,
            ParsedValue::Text(s) => s.parse().unwrap_or(0.0),
            ParsedValue::Timestamp(_) => 0.0,
        }
    }

    fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            ParsedValue::Timestamp(ts) => *ts,
            ParsedValue::Text(s) => parse_timestamp(s),
            ParsedValue::Number(_) => None,
        }
    }
}

impl Parser {
    fn parse(self, text: Option<&str>) -> ParsedValue {
        let text = text.unwrap_or("");
        match self {
            Parser::Text => ParsedValue::Text(text.to_string()),
            Parser::Number => ParsedValue::Number(parse_number(text)),
            Parser::Percent => ParsedValue::Number(clamp_ratio(parse_number(text) / 100.0)),
            Parser::Timestamp => ParsedValue::Timestamp(parse_timestamp(text)),
        }
    }
}

/// One row of the mapping table.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    /// Nested element names below `<Equipment>`.
    pub path: &'static [&'static str],
    pub target: Target,
    pub parser: Parser,
}

const fn map(path: &'static [&'static str], target: Target, parser: Parser) -> FieldMapping {
    FieldMapping { path, target, parser }
}

/// Where each telemetry column comes from in an `<Equipment>` block.
pub const FLEET_FIELD_MAP: &[FieldMapping] = &[
    map(&["EquipmentHeader", "EquipmentID"], Target::EquipmentId, Parser::Text),
    map(&["EquipmentHeader", "OEMName"], Target::Make, Parser::Text),
    map(&["EquipmentHeader", "Model"], Target::Model, Parser::Text),
    map(&["EquipmentHeader", "SerialNumber"], Target::SerialNumber, Parser::Text),
    map(&["Location", "Latitude"], Target::Latitude, Parser::Number),
    map(&["Location", "Longitude"], Target::Longitude, Parser::Number),
    map(&["Location", "DateTime"], Target::LocationAt, Parser::Timestamp),
    map(&["CumulativeOperatingHours", "Hour"], Target::OperatingHours, Parser::Number),
    map(&["CumulativeIdleHours", "Hour"], Target::IdleHours, Parser::Number),
    map(&["FuelUsed", "FuelConsumed"], Target::FuelUsed, Parser::Number),
    map(&["FuelRemaining", "Percent"], Target::FuelRemaining, Parser::Percent),
    map(&["DEFRemaining", "Percent"], Target::DefRemaining, Parser::Percent),
    map(&["Distance", "Odometer"], Target::Distance, Parser::Number),
];

// =============================================================================
// Decoding
// =============================================================================

/// Decodes every `<Equipment>` block of one feed page.
pub fn decode_fleet_page(xml: &str) -> Vec<FleetTelemetry> {
    elements(xml, "Equipment")
        .into_iter()
        .map(decode_equipment)
        .collect()
}

/// Applies [`FLEET_FIELD_MAP`] to one `<Equipment>` block.
pub fn decode_equipment(block: &str) -> FleetTelemetry {
    let mut record = FleetTelemetry::default();
    for mapping in FLEET_FIELD_MAP {
        let text = element_text(block, mapping.path);
        record.assign(mapping.target, mapping.parser.parse(text.as_deref()));
    }
    record
}

/// True when the page links to any `/Fleet/{k}` with `k > current`.
pub fn has_later_page(xml: &str, current: u32) -> bool {
    static PAGE_LINK: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(pattern) = PAGE_LINK
        .get_or_init(|| Regex::new(r"/Fleet/(\d+)").ok())
        .as_ref()
    else {
        return false;
    };
    pattern
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .any(|page| page > current)
}

/// Clamps a ratio into [0, 1]; NaN reads as 0.
pub fn clamp_ratio(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn parse_number(text: &str) -> f64 {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

// =============================================================================
// Element Scanner
// =============================================================================

/// Trimmed, unescaped text of the element at `path`, if present and non-empty.
pub fn element_text(xml: &str, path: &[&str]) -> Option<String> {
    let mut scope = xml;
    for tag in path {
        scope = first_element(scope, tag)?;
    }
    let text = unescape(scope.trim());
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Inner content of every top-level occurrence of `<tag>` in `xml`.
pub fn elements<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let mut found = Vec::new();
    let mut rest = xml;
    while let Some((inner, after)) = next_element(rest, tag) {
        found.push(inner);
        rest = after;
    }
    found
}

fn first_element<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    next_element(xml, tag).map(|(inner, _)| inner)
}

/// Finds the next `<tag ...>...</tag>` (or `<tag/>`), returning its inner
/// content and the remainder after it. `<Equipment` never matches
/// `<EquipmentHeader`: the name must end at `>`, `/`, or whitespace.
fn next_element<'a>(xml: &'a str, tag: &str) -> Option<(&'a str, &'a str)> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let mut search_from = 0;
    loop {
        let start = search_from + xml[search_from..].find(&open)?;
        let name_end = start + open.len();
        match xml[name_end..].chars().next() {
            Some(c) if c == '>' || c == '/' || c.is_whitespace() => {
                let tag_end = name_end + xml[name_end..].find('>')?;
                if xml[..tag_end].ends_with('/') {
                    return Some(("", &xml[tag_end + 1..]));
                }
                let content_start = tag_end + 1;
                let content_end = content_start + xml[content_start..].find(&close)?;
                return Some((
                    &xml[content_start..content_end],
                    &xml[content_end + close.len()..],
                ));
            }
            _ => search_from = name_end,
        }
    }
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
