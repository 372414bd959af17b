//! Panel store: the immutable (entity, date) OHLCV dataset every formula reads.
//!
//! Rows are held in long format sorted by entity then date. Each column is a
//! plain `Vec<f64>` aligned with the row order, so operators work on slices
//! and use the [`PanelIndex`] to find entity runs and date groups.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Range;

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{DatasetHash, PanelRow, BASE_COLUMNS};
use crate::expr::EvalScope;
use crate::operators::OperatorRegistry;

/// Errors raised while building a panel. These are the only fatal data errors;
/// they surface before any scoring starts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PanelError {
    #[error("panel has no rows")]
    Empty,

    #[error("duplicate row for entity '{entity}' on {date}")]
    DuplicateKey { entity: String, date: NaiveDate },

    #[error("negative {column} for entity '{entity}' on {date}")]
    NegativeValue {
        entity: String,
        date: NaiveDate,
        column: &'static str,
    },

    #[error("infinite {column} for entity '{entity}' on {date}")]
    InfiniteValue {
        entity: String,
        date: NaiveDate,
        column: &'static str,
    },

    #[error("invalid column name '{0}'")]
    InvalidColumnName(String),

    #[error("column '{0}' already exists")]
    DuplicateColumn(String),

    #[error("column name '{0}' is reserved for an operator")]
    ReservedColumnName(String),

    #[error("schema error: {0}")]
    Schema(String),
}

/// Row layout of a panel: which entity and date each row belongs to.
#[derive(Debug, Clone)]
pub struct PanelIndex {
    entities: Vec<String>,
    dates: Vec<NaiveDate>,
    row_entity: Vec<usize>,
    row_date: Vec<usize>,
    entity_spans: Vec<Range<usize>>,
    date_rows: Vec<Vec<usize>>,
}

impl PanelIndex {
    /// Build the index from `(entity, date)` keys already sorted by entity then date.
    fn from_sorted_keys(keys: &[(&str, NaiveDate)]) -> Self {
        let dates: Vec<NaiveDate> = keys
            .iter()
            .map(|(_, d)| *d)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let date_pos: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        let mut entities: Vec<String> = Vec::new();
        let mut entity_spans: Vec<Range<usize>> = Vec::new();
        let mut row_entity = Vec::with_capacity(keys.len());
        let mut row_date = Vec::with_capacity(keys.len());
        let mut date_rows = vec![Vec::new(); dates.len()];

        for (row, (entity, date)) in keys.iter().enumerate() {
            if entities.last().map(String::as_str) != Some(*entity) {
                if let Some(span) = entity_spans.last_mut() {
                    span.end = row;
                }
                entities.push(entity.to_string());
                entity_spans.push(row..keys.len());
            }
            let d = date_pos[date];
            row_entity.push(entities.len() - 1);
            row_date.push(d);
            date_rows[d].push(row);
        }

        Self {
            entities,
            dates,
            row_entity,
            row_date,
            entity_spans,
            date_rows,
        }
    }

    /// Build an index from explicit keys; rows must already be sorted by
    /// entity then date. Intended for operator tests and benches.
    pub fn from_keys(keys: &[(&str, NaiveDate)]) -> Self {
        Self::from_sorted_keys(keys)
    }

    /// Single-entity index over `n` consecutive days.
    pub fn single_entity(entity: &str, n: usize) -> Self {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default();
        let keys: Vec<(&str, NaiveDate)> = (0..n)
            .map(|i| (entity, start + chrono::Duration::days(i as i64)))
            .collect();
        Self::from_sorted_keys(&keys)
    }

    pub fn len(&self) -> usize {
        self.row_entity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_entity.is_empty()
    }

    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Contiguous row range of each entity, in entity order.
    pub fn entity_spans(&self) -> &[Range<usize>] {
        &self.entity_spans
    }

    /// Row numbers sharing each date, in date order.
    pub fn date_groups(&self) -> &[Vec<usize>] {
        &self.date_rows
    }

    pub fn entity_of(&self, row: usize) -> &str {
        &self.entities[self.row_entity[row]]
    }

    pub fn date_of(&self, row: usize) -> NaiveDate {
        self.dates[self.row_date[row]]
    }
}

/// Immutable OHLCV panel plus any extra numeric columns attached at build time.
#[derive(Debug, Clone)]
pub struct PanelStore {
    index: PanelIndex,
    columns: BTreeMap<String, Vec<f64>>,
    dataset_hash: DatasetHash,
}

impl PanelStore {
    /// Build a panel from rows in any order.
    ///
    /// Rows are sorted by entity then date. Duplicate keys, negative values
    /// and infinities are rejected; NaN is accepted as a missing value.
    pub fn from_rows(mut rows: Vec<PanelRow>) -> Result<Self, PanelError> {
        if rows.is_empty() {
            return Err(PanelError::Empty);
        }
        rows.sort_by(|a, b| a.entity.cmp(&b.entity).then(a.date.cmp(&b.date)));

        for pair in rows.windows(2) {
            if pair[0].entity == pair[1].entity && pair[0].date == pair[1].date {
                return Err(PanelError::DuplicateKey {
                    entity: pair[1].entity.clone(),
                    date: pair[1].date,
                });
            }
        }
        for row in &rows {
            if let Some(column) = row.negative_field() {
                return Err(PanelError::NegativeValue {
                    entity: row.entity.clone(),
                    date: row.date,
                    column,
                });
            }
            for column in BASE_COLUMNS {
                if row.field(column).is_some_and(f64::is_infinite) {
                    return Err(PanelError::InfiniteValue {
                        entity: row.entity.clone(),
                        date: row.date,
                        column,
                    });
                }
            }
        }

        let keys: Vec<(&str, NaiveDate)> =
            rows.iter().map(|r| (r.entity.as_str(), r.date)).collect();
        let index = PanelIndex::from_sorted_keys(&keys);

        let mut columns = BTreeMap::new();
        for column in BASE_COLUMNS {
            let values: Vec<f64> = rows
                .iter()
                .map(|r| r.field(column).unwrap_or(f64::NAN))
                .collect();
            columns.insert(column.to_string(), values);
        }

        let dataset_hash = compute_dataset_hash(&rows);
        debug!(
            rows = index.len(),
            entities = index.entities().len(),
            dates = index.dates().len(),
            void_rows = rows.iter().filter(|r| r.is_void()).count(),
            hash = dataset_hash.short(),
            "panel built"
        );

        Ok(Self {
            index,
            columns,
            dataset_hash,
        })
    }

    /// Attach a per-entity attribute (e.g. an industry code) as a numeric
    /// column. Entities absent from `values` get NaN.
    pub fn with_entity_attribute(
        mut self,
        name: &str,
        values: &HashMap<String, f64>,
    ) -> Result<Self, PanelError> {
        if !is_identifier(name) {
            return Err(PanelError::InvalidColumnName(name.to_string()));
        }
        if self.columns.contains_key(name) {
            return Err(PanelError::DuplicateColumn(name.to_string()));
        }
        if OperatorRegistry::standard().contains(name) {
            return Err(PanelError::ReservedColumnName(name.to_string()));
        }
        let column: Vec<f64> = (0..self.index.len())
            .map(|row| {
                values
                    .get(self.index.entity_of(row))
                    .copied()
                    .unwrap_or(f64::NAN)
            })
            .collect();
        self.columns.insert(name.to_string(), column);
        Ok(self)
    }

    pub fn index(&self) -> &PanelIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn dataset_hash(&self) -> &DatasetHash {
        &self.dataset_hash
    }

    /// Read-only view handed to the expression sandbox.
    pub fn scope(&self) -> EvalScope<'_> {
        EvalScope {
            index: &self.index,
            columns: &self.columns,
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// BLAKE3 over the sorted rows. NaN payloads are canonicalized so two panels
/// with the same missing cells hash identically.
fn compute_dataset_hash(rows: &[PanelRow]) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    for row in rows {
        hasher.update(row.entity.as_bytes());
        hasher.update(&[0]);
        hasher.update(row.date.to_string().as_bytes());
        for v in [row.open, row.high, row.low, row.close, row.volume] {
            let bits = if v.is_nan() { f64::NAN.to_bits() } else { v.to_bits() };
            hasher.update(&bits.to_le_bytes());
        }
    }
    DatasetHash(hasher.finalize().to_hex().to_string())
}
