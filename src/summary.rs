use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::host::EntityDirectory;

struct CachedSummary {
    text: String,
    generated_at: Instant,
}

/// Textual snapshot of every entity, cached for a configurable interval.
pub struct EntitiesSummarizer {
    directory: Arc<dyn EntityDirectory>,
    cache: Mutex<Option<CachedSummary>>,
}

impl EntitiesSummarizer {
    pub fn new(directory: Arc<dyn EntityDirectory>) -> Self {
        Self {
            directory,
            cache: Mutex::new(None),
        }
    }

    /// Return the cached summary if younger than `refresh_rate`, else rebuild it.
    pub fn summary(&self, refresh_rate: Duration) -> String {
        self.summary_at(Instant::now(), refresh_rate)
    }

    pub(crate) fn summary_at(&self, now: Instant, refresh_rate: Duration) -> String {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(cached) = cache.as_ref() {
            if now.saturating_duration_since(cached.generated_at) < refresh_rate {
                return cached.text.clone();
            }
        }

        debug!("Generating entities summary for Perplexity context");
        let text = self.build();
        *cache = Some(CachedSummary {
            text: text.clone(),
            generated_at: now,
        });
        text
    }

    fn build(&self) -> String {
        let states = self.directory.all_states();
        let mut summary = format!("The Home Assistant instance has {} entities.", states.len());

        for entity in &states {
            let room = self
                .directory
                .device_of(&entity.entity_id)
                .and_then(|device_id| self.directory.area_of(&device_id));
            let room = room.as_deref().unwrap_or("None");
            summary.push_str(&format!("\n- {}: {} (in room: {})", entity.entity_id, entity.state, room));
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::{EntitySnapshot, SnapshotEntity, StaticEntityDirectory};
    use std::collections::HashMap;

    fn create_directory() -> Arc<StaticEntityDirectory> {
        let mut devices = HashMap::new();
        devices.insert("dev-kitchen".to_string(), Some("kitchen".to_string()));
        devices.insert("dev-orphan".to_string(), None);

        Arc::new(StaticEntityDirectory::new(EntitySnapshot {
            entities: vec![
                SnapshotEntity {
                    entity_id: "light.kitchen".to_string(),
                    state: "on".to_string(),
                    device_id: Some("dev-kitchen".to_string()),
                },
                SnapshotEntity {
                    entity_id: "sensor.orphan".to_string(),
                    state: "3".to_string(),
                    device_id: Some("dev-orphan".to_string()),
                },
                SnapshotEntity {
                    entity_id: "sun.sun".to_string(),
                    state: "above_horizon".to_string(),
                    device_id: None,
                },
            ],
            devices,
        }))
    }

    #[test]
    fn test_summary_format() {
        let summarizer = EntitiesSummarizer::new(create_directory());
        let summary = summarizer.summary(Duration::from_secs(10));
        assert_eq!(
            summary,
            "The Home Assistant instance has 3 entities.\n\
             - light.kitchen: on (in room: kitchen)\n\
             - sensor.orphan: 3 (in room: None)\n\
             - sun.sun: above_horizon (in room: None)"
        );
    }

    #[test]
    fn test_summary_cached_within_window() {
        let directory = create_directory();
        let summarizer = EntitiesSummarizer::new(directory.clone());
        let start = Instant::now();
        let refresh = Duration::from_secs(10);

        let first = summarizer.summary_at(start, refresh);
        directory.set_state("light.kitchen", "off");
        let second = summarizer.summary_at(start + Duration::from_secs(9), refresh);

        assert_eq!(first, second);
    }

    #[test]
    fn test_summary_recomputed_after_window() {
        let directory = create_directory();
        let summarizer = EntitiesSummarizer::new(directory.clone());
        let start = Instant::now();
        let refresh = Duration::from_secs(10);

        let first = summarizer.summary_at(start, refresh);
        directory.set_state("light.kitchen", "off");
        let second = summarizer.summary_at(start + Duration::from_secs(10), refresh);

        assert_ne!(first, second);
        assert!(second.contains("light.kitchen: off"));
    }

    #[test]
    fn test_empty_directory() {
        let summarizer = EntitiesSummarizer::new(Arc::new(StaticEntityDirectory::default()));
        assert_eq!(
            summarizer.summary(Duration::from_secs(10)),
            "The Home Assistant instance has 0 entities."
        );
    }
}
