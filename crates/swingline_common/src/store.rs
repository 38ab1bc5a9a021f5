//! Append-only event dataset
//!
//! Events are appended during ingestion and never mutated or removed.
//! Nothing here deduplicates: appending the same line twice stores it twice.
//! `distinct_sorted` is the de-duplicated view used for export.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::event::{Category, Event, EventId, Field};

#[derive(Debug, Clone, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: Event) -> EventId {
        self.events.push(event);
        EventId(self.events.len() - 1)
    }

    /// Append every event of `other`, preserving its order
    pub fn merge(&mut self, other: EventStore) {
        self.events.extend(other.events);
    }

    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.category == category)
    }

    pub fn count_by_category(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for event in &self.events {
            *counts.entry(event.category).or_insert(0) += 1;
        }
        counts
    }

    /// Unique events ordered by date, time, then host
    pub fn distinct_sorted(&self) -> Vec<&Event> {
        let mut seen = HashSet::new();
        let mut unique: Vec<&Event> = self.events.iter().filter(|e| seen.insert(*e)).collect();
        unique.sort_by(|a, b| {
            (a.date.as_str(), a.time.as_str(), a.host.as_str())
                .cmp(&(b.date.as_str(), b.time.as_str(), b.host.as_str()))
        });
        unique
    }

    /// Most frequent values of `field` among `category` events.
    ///
    /// Ordered by count descending, then value ascending; events where the
    /// field is not populated are not counted.
    pub fn top_values(&self, category: Category, field: Field, limit: usize) -> Vec<(String, usize)> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for event in self.by_category(category) {
            if let Some(value) = event.value(field) {
                *counts.entry(value).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::World;

    fn event(category: Category, time: &str, host: &str, dev: &str) -> Event {
        Event {
            category,
            date: "2016-05-02".to_string(),
            hour: time[..2].to_string(),
            time: time.to_string(),
            host: host.to_string(),
            fname: "vmkernel.log".to_string(),
            dev: dev.to_string(),
            dsname: "N/A".to_string(),
            latency: None,
            lavg: None,
            world: Some(World::Vmkernel),
            cmd: None,
            t10: None,
            sense: None,
            asense: None,
            raw: format!("{} {} {}", time, host, dev),
        }
    }

    #[test]
    fn test_append_returns_sequential_ids() {
        let mut store = EventStore::new();
        let a = store.append(event(Category::ApdPdl, "10:00:00.000", "h1", "naa.1"));
        let b = store.append(event(Category::ApdPdl, "10:00:01.000", "h1", "naa.1"));
        assert_eq!(a, EventId(0));
        assert_eq!(b, EventId(1));
        assert_eq!(store.get(b).unwrap().time, "10:00:01.000");
        assert!(store.get(EventId(2)).is_none());
    }

    #[test]
    fn test_no_deduplication_on_append() {
        let mut store = EventStore::new();
        let e = event(Category::IoFailure, "10:00:00.000", "h1", "naa.1");
        store.append(e.clone());
        store.append(e);
        assert_eq!(store.len(), 2);
        assert_eq!(store.distinct_sorted().len(), 1);
    }

    #[test]
    fn test_distinct_sorted_order() {
        let mut store = EventStore::new();
        store.append(event(Category::Latency, "12:00:00.000", "h1", "naa.1"));
        store.append(event(Category::Latency, "09:00:00.000", "h2", "naa.1"));
        store.append(event(Category::Latency, "09:00:00.000", "h1", "naa.2"));

        let sorted = store.distinct_sorted();
        let keys: Vec<(&str, &str)> = sorted.iter().map(|e| (e.time.as_str(), e.host.as_str())).collect();
        assert_eq!(
            keys,
            vec![("09:00:00.000", "h1"), ("09:00:00.000", "h2"), ("12:00:00.000", "h1")]
        );
    }

    #[test]
    fn test_counts_and_category_view() {
        let mut store = EventStore::new();
        store.append(event(Category::Latency, "12:00:00.000", "h1", "naa.1"));
        store.append(event(Category::ApdPdl, "12:00:00.000", "h1", "naa.1"));
        store.append(event(Category::Latency, "13:00:00.000", "h1", "naa.1"));

        let counts = store.count_by_category();
        assert_eq!(counts.get(&Category::Latency), Some(&2));
        assert_eq!(counts.get(&Category::ApdPdl), Some(&1));
        assert_eq!(counts.get(&Category::IoFailure), None);
        assert_eq!(store.by_category(Category::Latency).count(), 2);
    }

    #[test]
    fn test_top_values() {
        let mut store = EventStore::new();
        for dev in ["naa.2", "naa.1", "naa.2", "naa.3", "naa.1", "naa.2"] {
            store.append(event(Category::IoFailure, "10:00:00.000", "h1", dev));
        }
        store.append(event(Category::Latency, "10:00:00.000", "h1", "naa.9"));

        let top = store.top_values(Category::IoFailure, Field::Dev, 2);
        assert_eq!(
            top,
            vec![("naa.2".to_string(), 3), ("naa.1".to_string(), 2)]
        );

        // cmd is never populated on these events
        assert!(store.top_values(Category::IoFailure, Field::Cmd, 10).is_empty());
    }

    #[test]
    fn test_merge_appends_in_order() {
        let mut first = EventStore::new();
        first.append(event(Category::Latency, "10:00:00.000", "h1", "naa.1"));
        let mut second = EventStore::new();
        second.append(event(Category::ApdPdl, "09:00:00.000", "h2", "naa.2"));

        first.merge(second);
        assert_eq!(first.len(), 2);
        assert_eq!(first.events()[1].host, "h2");
    }
}
