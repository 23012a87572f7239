use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Where a [`Draw`] came from. `Api` always wins a merge tie against `Bundled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    #[serde(alias = "static")]
    Bundled,
    Api,
}

/// One published result set, keyed by its draw date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    pub date: NaiveDate,
    pub first: String,
    #[serde(default)]
    pub near1: Vec<String>,
    #[serde(default)]
    pub prize2: Vec<String>,
    #[serde(default)]
    pub prize3: Vec<String>,
    #[serde(default)]
    pub prize4: Vec<String>,
    #[serde(default)]
    pub prize5: Vec<String>,
    #[serde(default)]
    pub front3: Vec<String>,
    #[serde(default)]
    pub back3: Vec<String>,
    #[serde(default)]
    pub last2: String,
    #[serde(default)]
    pub source: Source,
}

/// Pairs an opaque upstream identifier with the draw date it resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawIndexEntry {
    pub id: String,
    pub date: NaiveDate,
}

// Upstream wire format

#[derive(Deserialize, Debug)]
pub struct RecordEnvelope {
    pub response: Option<RawRecord>,
}

#[derive(Deserialize, Debug, Default)]
pub struct RawRecord {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub prizes: Vec<RawNumberGroup>,
    #[serde(default, rename = "runningNumbers")]
    pub running_numbers: Vec<RawNumberGroup>,
}

#[derive(Deserialize, Debug)]
pub struct RawNumberGroup {
    pub id: String,
    #[serde(default)]
    pub number: Vec<String>,
}

#[derive(Deserialize, Debug)]
pub struct IndexEnvelope {
    pub response: Option<Vec<RawIndexItem>>,
}

#[derive(Deserialize, Debug)]
pub struct RawIndexItem {
    pub id: String,
    #[serde(default)]
    pub date: String,
}

// Persisted blobs

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StoreSnapshot {
    pub timestamp: i64,
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    pub draws: Vec<Draw>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IndexSnapshot {
    pub timestamp: i64,
    pub ids: Vec<DrawIndexEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadingProgress {
    pub loaded: usize,
    pub total: usize,
}

// Number search

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Match first, second, third and near-first prizes.
    pub exact: bool,
    pub front3: bool,
    pub back3: bool,
    pub last2: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            exact: true,
            front3: false,
            back3: false,
            last2: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NumberMatch {
    pub tier: &'static str,
    pub number: String,
    pub prize: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub date: NaiveDate,
    pub matches: Vec<NumberMatch>,
}

// Analysis projections

/// How many draws a projection covers: the whole combined view, or the newest
/// `n` of the main window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCount {
    All,
    Recent(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    #[default]
    First,
    Last2,
    Front3,
    Back3,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FirstPrizeRow {
    pub date: NaiveDate,
    pub first: String,
    pub front3: Vec<String>,
    pub back3: Vec<String>,
    pub last2: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DigitRow {
    pub date: NaiveDate,
    pub number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisRow {
    pub date: NaiveDate,
    pub numbers: Vec<String>,
}
