//! Restaurant records keyed by source URL.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::types::{PriceTier, RestaurantRecord};

/// Insertion-ordered records, at most one per source URL.
///
/// Serializes as a plain JSON array of records.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Vec<RestaurantRecord>")]
pub struct RecordCollection {
    records: IndexMap<String, RestaurantRecord>,
}

impl RecordCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing one with the same URL in place.
    ///
    /// Returns the replaced record, if any.
    pub fn upsert(&mut self, record: RestaurantRecord) -> Option<RestaurantRecord> {
        let previous = self.records.insert(record.source_url.clone(), record);
        if let Some(old) = &previous {
            tracing::debug!("Replaced earlier record for {}", old.source_url);
        }
        previous
    }

    /// Fold another collection in; its records win on URL clashes.
    pub fn merge(&mut self, other: RecordCollection) {
        for record in other.records.into_values() {
            self.upsert(record);
        }
    }

    pub fn get(&self, url: &str) -> Option<&RestaurantRecord> {
        self.records.get(url)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RestaurantRecord> {
        self.records.values()
    }

    /// Records with at least one item.
    pub fn reportable(&self) -> impl Iterator<Item = &RestaurantRecord> {
        self.iter().filter(|r| r.is_reportable())
    }

    /// Counts over the reportable records.
    pub fn summary(&self) -> CollectionSummary {
        let mut summary = CollectionSummary {
            restaurants: self.len(),
            ..CollectionSummary::default()
        };
        for tier in PriceTier::ORDERED.iter().chain([PriceTier::Unknown].iter()) {
            summary.by_tier.insert(tier.to_string(), 0);
        }

        for record in self.reportable() {
            summary.reportable += 1;
            summary.items += record.items.len();
            summary.priced_items += record.priced_item_count();
            for tag in &record.types {
                *summary.by_type.entry(tag.clone()).or_default() += 1;
            }
            *summary.by_tier.entry(record.price_tier.to_string()).or_default() += 1;
        }

        summary.by_type.sort_by(|a_tag, a, b_tag, b| b.cmp(a).then_with(|| a_tag.cmp(b_tag)));
        summary
    }

    pub fn into_records(self) -> Vec<RestaurantRecord> {
        self.records.into_values().collect()
    }
}

impl From<Vec<RestaurantRecord>> for RecordCollection {
    fn from(records: Vec<RestaurantRecord>) -> Self {
        let mut collection = Self::new();
        for record in records {
            collection.upsert(record);
        }
        collection
    }
}

impl Extend<RestaurantRecord> for RecordCollection {
    fn extend<T: IntoIterator<Item = RestaurantRecord>>(&mut self, iter: T) {
        for record in iter {
            self.upsert(record);
        }
    }
}

impl Serialize for RecordCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.records.values())
    }
}

/// What a batch produced, as counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSummary {
    /// All records, including ones without items.
    pub restaurants: usize,
    pub reportable: usize,
    pub items: usize,
    pub priced_items: usize,
    /// Most common first.
    pub by_type: IndexMap<String, usize>,
    /// Cheapest tier first, `unknown` last.
    pub by_tier: IndexMap<String, usize>,
}

impl std::fmt::Display for CollectionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} restaurants ({} with menus), {} items, {} priced",
            self.restaurants, self.reportable, self.items, self.priced_items
        )?;
        for (tag, count) in &self.by_type {
            writeln!(f, "  {tag}: {count}")?;
        }
        for (tier, count) in self.by_tier.iter().filter(|(_, c)| **c > 0) {
            writeln!(f, "  [{tier}] {count}")?;
        }
        Ok(())
    }
}
