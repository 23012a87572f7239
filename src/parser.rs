//! Normalizes upstream payloads into canonical [`Draw`] records.

use serde_json::Value;
use std::collections::HashMap;

use crate::error::ParseError;
use crate::types::{Draw, DrawIndexEntry, IndexEnvelope, RawNumberGroup, RecordEnvelope, Source};
use crate::utils::parse_thai_date;

const FIRST_PLACEHOLDER: &str = "------";
const THREE_PLACEHOLDER: &str = "---";
const TWO_PLACEHOLDER: &str = "--";

fn group_map(groups: Vec<RawNumberGroup>) -> HashMap<String, Vec<String>> {
    groups.into_iter().map(|g| (g.id, g.number)).collect()
}

fn placeholder_pair(value: &str) -> Vec<String> {
    vec![value.to_string(), value.to_string()]
}

/// Parses a single-record payload (`{response: {date, prizes, runningNumbers}}`).
pub fn parse_draw(payload: &Value) -> Result<Draw, ParseError> {
    if payload.get("response").is_none_or(Value::is_null) {
        return Err(ParseError::MissingEnvelope);
    }

    let envelope: RecordEnvelope =
        serde_json::from_value(payload.clone()).map_err(|e| ParseError::Malformed(e.to_string()))?;
    let record = envelope.response.ok_or(ParseError::MissingEnvelope)?;

    let date = parse_thai_date(&record.date).ok_or_else(|| ParseError::BadDate(record.date.clone()))?;

    let mut prizes = group_map(record.prizes);
    let mut running = group_map(record.running_numbers);

    let first = prizes
        .remove("prizeFirst")
        .and_then(|n| n.into_iter().next())
        .unwrap_or_else(|| FIRST_PLACEHOLDER.to_string());
    let last2 = running
        .remove("runningNumberBackTwo")
        .and_then(|n| n.into_iter().next())
        .unwrap_or_else(|| TWO_PLACEHOLDER.to_string());

    Ok(Draw {
        date,
        first,
        near1: prizes
            .remove("prizeFirstNear")
            .unwrap_or_else(|| placeholder_pair(FIRST_PLACEHOLDER)),
        prize2: prizes.remove("prizeSecond").unwrap_or_default(),
        prize3: prizes.remove("prizeThird").unwrap_or_default(),
        // upstream spells the fourth tier this way
        prize4: prizes.remove("prizeForth").unwrap_or_default(),
        prize5: prizes.remove("prizeFifth").unwrap_or_default(),
        front3: running
            .remove("runningNumberFrontThree")
            .unwrap_or_else(|| placeholder_pair(THREE_PLACEHOLDER)),
        back3: running
            .remove("runningNumberBackThree")
            .unwrap_or_else(|| placeholder_pair(THREE_PLACEHOLDER)),
        last2,
        source: Source::Api,
    })
}

/// Parses one page of the draw index. Entries whose date cannot be read are skipped.
pub fn parse_index_page(payload: &Value) -> Result<Vec<DrawIndexEntry>, ParseError> {
    let envelope: IndexEnvelope =
        serde_json::from_value(payload.clone()).map_err(|e| ParseError::Malformed(e.to_string()))?;
    let items = envelope.response.unwrap_or_default();

    Ok(items
        .into_iter()
        .filter_map(|item| {
            let date = parse_thai_date(&item.date)?;
            Some(DrawIndexEntry { id: item.id, date })
        })
        .collect())
}
