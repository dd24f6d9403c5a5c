// 🔍 Deduplication Engine - Coalesce rows sharing a natural key
// List fields merge by set union, scalar fields keep the most informative value

use crate::parser::{parse_list, RawCell, RawRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Source column holding the natural key
pub const NATURAL_KEY_COLUMN: &str = "pk_unique_id";

/// Columns merged by set union instead of longest value
pub const MERGED_LIST_COLUMNS: [&str; 7] = [
    "specialties",
    "procedure",
    "equipment",
    "capability",
    "phone_numbers",
    "websites",
    "affiliationTypeIds",
];

// ============================================================================
// DUPLICATE GROUP
// ============================================================================

/// A natural key that appeared on more than one row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub key: String,

    /// Source rows folded into the merged record, in file order
    pub row_numbers: Vec<usize>,
}

/// Output of a deduplication pass
#[derive(Debug, Clone)]
pub struct DeduplicationResult {
    /// (natural key, record) in first-occurrence order
    pub records: Vec<(String, RawRecord)>,

    /// Only the groups that actually merged
    pub merged_groups: Vec<DuplicateGroup>,

    pub input_rows: usize,
}

impl DeduplicationResult {
    pub fn duplicates_removed(&self) -> usize {
        self.input_rows - self.records.len()
    }
}

// ============================================================================
// DEDUPLICATION ENGINE
// ============================================================================

pub struct DeduplicationEngine {
    /// Column whose value identifies a facility
    pub key_column: String,

    /// Columns merged by union
    pub list_columns: HashSet<String>,
}

impl DeduplicationEngine {
    /// Engine with the export's natural key and list columns
    pub fn new() -> Self {
        DeduplicationEngine {
            key_column: NATURAL_KEY_COLUMN.to_string(),
            list_columns: MERGED_LIST_COLUMNS.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Natural key of a row; None when blank
    pub fn natural_key(&self, row: &RawRecord) -> Option<String> {
        row.text(&self.key_column)
    }

    /// Group rows by natural key and merge each group into one record
    ///
    /// Rows with a blank key stay out of the grouping and get a synthetic
    /// `row-<n>` id, suffixed until it differs from every real key.
    pub fn deduplicate(&self, rows: Vec<RawRecord>) -> DeduplicationResult {
        let input_rows = rows.len();
        let real_keys: HashSet<String> = rows.iter().filter_map(|r| self.natural_key(r)).collect();

        let mut order: Vec<Slot> = Vec::new();
        let mut groups: HashMap<String, Vec<RawRecord>> = HashMap::new();
        for row in rows {
            match self.natural_key(&row) {
                Some(key) => {
                    let group = groups.entry(key.clone()).or_insert_with(|| {
                        order.push(Slot::Keyed(key));
                        Vec::new()
                    });
                    group.push(row);
                }
                None => {
                    let key = synthetic_key(row.row_number, &real_keys);
                    order.push(Slot::Blank(key, row));
                }
            }
        }

        let mut records = Vec::with_capacity(order.len());
        let mut merged_groups = Vec::new();
        for slot in order {
            let key = match slot {
                Slot::Blank(key, row) => {
                    records.push((key, row));
                    continue;
                }
                Slot::Keyed(key) => key,
            };
            let mut group = groups.remove(&key).unwrap_or_default();
            if group.len() == 1 {
                if let Some(row) = group.pop() {
                    records.push((key, row));
                }
                continue;
            }

            merged_groups.push(DuplicateGroup {
                key: key.clone(),
                row_numbers: group.iter().map(|r| r.row_number).collect(),
            });
            records.push((key, self.merge_group(&group)));
        }

        DeduplicationResult {
            records,
            merged_groups,
            input_rows,
        }
    }

    /// Merge rows field-by-field
    ///
    /// Panics never; an empty group yields an empty record.
    pub fn merge_group(&self, group: &[RawRecord]) -> RawRecord {
        let first = match group.first() {
            Some(row) => row,
            None => return RawRecord::default(),
        };

        let columns: BTreeSet<&String> = group.iter().flat_map(|r| r.columns()).collect();

        let mut merged = RawRecord::new(first.row_number);
        for column in columns {
            let cell = if self.list_columns.contains(column.as_str()) {
                union_lists(group, column)
            } else {
                longest_value(group, column).unwrap_or_else(|| first.get(column).clone())
            };
            merged.set(column, cell);
        }

        merged
    }
}

impl Default for DeduplicationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Position of one output record in first-occurrence order
enum Slot {
    Keyed(String),
    Blank(String, RawRecord),
}

fn synthetic_key(row_number: usize, real_keys: &HashSet<String>) -> String {
    let base = format!("row-{}", row_number);
    let mut key = base.clone();
    let mut suffix = 2;
    while real_keys.contains(&key) {
        key = format!("{}-{}", base, suffix);
        suffix += 1;
    }
    key
}

/// Set union of every row's list, first-seen order kept
fn union_lists(group: &[RawRecord], column: &str) -> RawCell {
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for row in group {
        for item in parse_list(row.get(column)) {
            if seen.insert(item.clone()) {
                items.push(item);
            }
        }
    }
    RawCell::List(items)
}

/// Longest non-blank string representation; ties keep the first occurrence
fn longest_value(group: &[RawRecord], column: &str) -> Option<RawCell> {
    let mut best: Option<(usize, &RawCell)> = None;
    for row in group {
        let cell = row.get(column);
        let len = match cell.display() {
            Some(s) if !s.trim().is_empty() => s.chars().count(),
            _ => continue,
        };
        if best.map_or(true, |(best_len, _)| len > best_len) {
            best = Some((len, cell));
        }
    }
    best.map(|(_, cell)| cell.clone())
}

// ============================================================================
// TESTS
// ============================================================================
