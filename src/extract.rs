// src/extract.rs
//! Wait-data extraction: one rendered wait-times page in, one `Observation` out.
//!
//! Page layout relied on:
//! - `div.cityContent-<city>` holds the city's hospitals
//! - `.hospitalName` nodes carry the display name inside an `<a>`
//! - `.wt-times` nodes hold either no `<strong>` (no posted wait) or exactly
//!   two (hours, minutes)
//!
//! Names and wait blocks are paired by position only.

use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::city::City;
use crate::error::ExtractError;
use crate::observation::{Observation, WaitMinutes};

pub const MINUTES_PER_HOUR: u32 = 60;

fn static_selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

static HOSPITAL_NAME: Lazy<Selector> = Lazy::new(|| static_selector(".hospitalName"));
static WAIT_TIMES: Lazy<Selector> = Lazy::new(|| static_selector(".wt-times"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| static_selector("a"));
static STRONG: Lazy<Selector> = Lazy::new(|| static_selector("strong"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Parses rendered page text. A blank page is the only unparsable input;
/// html5ever recovers from everything else.
pub fn parse_document(html: &str) -> Result<Html, ExtractError> {
    if html.trim().is_empty() {
        return Err(ExtractError::EmptyDocument);
    }
    Ok(Html::parse_document(html))
}

/// Outcome of reading one `.wt-times` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitBlock {
    Minutes(u32),
    /// Not exactly two `<strong>` children: no wait posted right now.
    NotPosted(usize),
    /// Two children, but not both non-negative integers.
    Malformed(String),
}

impl WaitBlock {
    pub fn minutes(&self) -> WaitMinutes {
        match self {
            WaitBlock::Minutes(m) => Some(*m),
            _ => None,
        }
    }
}

pub fn read_wait_block(block: ElementRef<'_>) -> WaitBlock {
    let parts: Vec<String> = block.select(&STRONG).map(element_text).collect();
    if parts.len() != 2 {
        return WaitBlock::NotPosted(parts.len());
    }
    let (Ok(hours), Ok(minutes)) = (parts[0].parse::<u32>(), parts[1].parse::<u32>()) else {
        return WaitBlock::Malformed(format!("{:?}", parts));
    };
    match hours
        .checked_mul(MINUTES_PER_HOUR)
        .and_then(|h| h.checked_add(minutes))
    {
        Some(total) => WaitBlock::Minutes(total),
        None => WaitBlock::Malformed(format!("{:?}", parts)),
    }
}

/// Display name from the node's anchor, whitespace collapsed.
pub fn read_hospital_name(node: ElementRef<'_>) -> Option<String> {
    let anchor = node.select(&ANCHOR).next()?;
    let name = element_text(anchor);
    (!name.is_empty()).then_some(name)
}

fn element_text(el: ElementRef<'_>) -> String {
    let raw: String = el.text().collect();
    RE_WS.replace_all(raw.trim(), " ").into_owned()
}

pub fn extract(doc: &Html, city: City, captured_at: NaiveDateTime) -> Result<Observation, ExtractError> {
    let css = city.section_selector();
    let section_sel = Selector::parse(&css).map_err(|_| ExtractError::Selector(css.clone()))?;

    let mut sections = doc.select(&section_sel);
    let section = sections
        .next()
        .ok_or_else(|| ExtractError::MissingSection(css.clone()))?;
    if sections.next().is_some() {
        warn!(target: "capture", %city, selector = %css, "multiple city sections, using the first");
    }

    let names: Vec<ElementRef<'_>> = section.select(&HOSPITAL_NAME).collect();
    let blocks: Vec<ElementRef<'_>> = section.select(&WAIT_TIMES).collect();
    if names.len() != blocks.len() {
        return Err(ExtractError::Misaligned {
            names: names.len(),
            waits: blocks.len(),
        });
    }
    if names.is_empty() {
        warn!(target: "capture", %city, "city section lists no hospitals");
    }

    let mut entries: Vec<(String, WaitMinutes)> = Vec::with_capacity(names.len());
    for (position, (name_node, block)) in names.into_iter().zip(blocks).enumerate() {
        let Some(name) = read_hospital_name(name_node) else {
            // The paired wait block is consumed with it.
            warn!(target: "capture", %city, position, "hospital name unreadable, skipping entry");
            continue;
        };

        let wait = read_wait_block(block);
        match &wait {
            WaitBlock::Minutes(_) => {}
            WaitBlock::NotPosted(n) => {
                debug!(target: "capture", %city, hospital = %name, parts = n, "no wait posted");
            }
            WaitBlock::Malformed(raw) => {
                warn!(target: "capture", %city, hospital = %name, raw = %raw, "unreadable wait time");
            }
        }
        entries.push((name, wait.minutes()));
    }

    Ok(Observation::from_entries(captured_at, entries))
}

/// Parse + extract in one step. `Html` is not `Send`, so callers on the
/// async side go through this and never hold the document across an await.
pub fn extract_from_html(
    html: &str,
    city: City,
    captured_at: NaiveDateTime,
) -> Result<Observation, ExtractError> {
    let doc = parse_document(html)?;
    extract(&doc, city, captured_at)
}
