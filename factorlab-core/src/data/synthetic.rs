//! Deterministic synthetic panels for tests, benches and offline runs.
//!
//! Each entity gets a random walk from 100.0 seeded from BLAKE3 of the master
//! seed and the entity name, so adding an entity never perturbs the others.

use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::panel::{PanelError, PanelStore};
use crate::domain::PanelRow;

/// Shape of a generated panel.
#[derive(Debug, Clone)]
pub struct SyntheticPanel {
    pub entities: usize,
    pub days: usize,
    pub start: NaiveDate,
    pub seed: u64,
    /// Skip Saturdays and Sundays when laying out dates.
    pub business_days: bool,
}

impl Default for SyntheticPanel {
    fn default() -> Self {
        Self {
            entities: 5,
            days: 250,
            start: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap_or_default(),
            seed: 42,
            business_days: true,
        }
    }
}

impl SyntheticPanel {
    pub fn new(entities: usize, days: usize) -> Self {
        Self {
            entities,
            days,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn entity_name(i: usize) -> String {
        format!("SYN{i:03}")
    }

    pub fn rows(&self) -> Vec<PanelRow> {
        let dates = self.dates();
        let mut rows = Vec::with_capacity(self.entities * dates.len());
        for e in 0..self.entities {
            let entity = Self::entity_name(e);
            let mut hasher = blake3::Hasher::new();
            hasher.update(&self.seed.to_le_bytes());
            hasher.update(entity.as_bytes());
            let mut rng = StdRng::from_seed(*hasher.finalize().as_bytes());

            let mut price = 100.0_f64;
            for date in &dates {
                let daily_return: f64 = rng.gen_range(-0.03..0.03);
                let open = price;
                let close = price * (1.0 + daily_return);
                let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
                let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
                let volume = rng.gen_range(500_000..5_000_000u64) as f64;
                rows.push(PanelRow {
                    entity: entity.clone(),
                    date: *date,
                    open,
                    high,
                    low,
                    close,
                    volume,
                });
                price = close;
            }
        }
        rows
    }

    pub fn build(&self) -> Result<PanelStore, PanelError> {
        PanelStore::from_rows(self.rows())
    }

    fn dates(&self) -> Vec<NaiveDate> {
        let mut out = Vec::with_capacity(self.days);
        let mut current = self.start;
        while out.len() < self.days {
            let weekday = current.weekday();
            let weekend = weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun;
            if !(self.business_days && weekend) {
                out.push(current);
            }
            current += chrono::Duration::days(1);
        }
        out
    }
}
