//! Monthly and lifetime spend counters.
//!
//! Both counters are restored from the host's state store on startup and
//! written back after every increment, so a restart resumes from the last
//! known total.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::host::{StateStore, StoredState};

pub const UNIT_OF_MEASUREMENT: &str = "$";
const LAST_RESET_ATTRIBUTE: &str = "last_reset";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterKind {
    Monthly,
    AllTime,
}

impl CounterKind {
    pub fn name(&self) -> &'static str {
        match self {
            CounterKind::Monthly => "Perplexity Monthly Bill",
            CounterKind::AllTime => "Perplexity Bill",
        }
    }

    fn unique_id_suffix(&self) -> &'static str {
        match self {
            CounterKind::Monthly => "perplexity_monthly_bill",
            CounterKind::AllTime => "perplexity_bill",
        }
    }
}

/// First day of the month containing `date`
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// One running total
#[derive(Debug, Clone)]
pub struct CostCounter {
    kind: CounterKind,
    unique_id: String,
    value: f64,
    last_reset: NaiveDate,
}

impl CostCounter {
    pub fn new(kind: CounterKind, entry_id: &str, today: NaiveDate) -> Self {
        Self {
            kind,
            unique_id: format!("{}_{}", entry_id, kind.unique_id_suffix()),
            value: 0.0,
            last_reset: month_start(today),
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Reported value, rounded to 4 decimals
    pub fn native_value(&self) -> f64 {
        (self.value * 10_000.0).round() / 10_000.0
    }

    pub fn last_reset(&self) -> NaiveDate {
        self.last_reset
    }

    /// Adopt a previously persisted state.
    ///
    /// Missing, `unknown`, `unavailable` or non-numeric states start from zero.
    /// An unparseable reset marker keeps the current one.
    pub fn restore(&mut self, stored: Option<&StoredState>) {
        let Some(stored) = stored else {
            self.value = 0.0;
            return;
        };

        self.value = match stored.state.as_str() {
            "" | "unknown" | "unavailable" => 0.0,
            raw => match raw.parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => v,
                _ => {
                    warn!(unique_id = %self.unique_id, state = raw, "Ignoring invalid stored cost");
                    0.0
                }
            },
        };

        if self.kind == CounterKind::Monthly {
            if let Some(raw) = stored.attributes.get(LAST_RESET_ATTRIBUTE).and_then(Value::as_str) {
                match parse_reset_marker(raw) {
                    Some(date) => self.last_reset = month_start(date),
                    None => warn!(unique_id = %self.unique_id, marker = raw, "Failed to parse last_reset marker"),
                }
            }
        }
    }

    /// Add `delta`, first resetting the monthly counter when `today` is in a
    /// later month than the stored marker.
    pub fn increment(&mut self, delta: f64, today: NaiveDate) {
        let delta = if delta.is_finite() && delta > 0.0 { delta } else { 0.0 };

        if self.kind == CounterKind::Monthly && month_start(today) != self.last_reset {
            debug!(unique_id = %self.unique_id, "Resetting Perplexity monthly cost");
            self.value = 0.0;
            self.last_reset = month_start(today);
        }

        self.value += delta;
    }

    /// State to hand to the store
    pub fn to_stored(&self) -> StoredState {
        let mut attributes = Map::new();
        attributes.insert(
            "unit_of_measurement".to_string(),
            Value::String(UNIT_OF_MEASUREMENT.to_string()),
        );
        if self.kind == CounterKind::Monthly {
            attributes.insert(
                LAST_RESET_ATTRIBUTE.to_string(),
                Value::String(self.last_reset.format("%Y-%m-%d").to_string()),
            );
        }
        StoredState {
            state: self.value.to_string(),
            attributes,
        }
    }
}

fn parse_reset_marker(raw: &str) -> Option<NaiveDate> {
    raw.parse::<NaiveDate>()
        .ok()
        .or_else(|| raw.parse::<NaiveDateTime>().ok().map(|dt| dt.date()))
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Point-in-time view of both counters
#[derive(Debug, Clone, Serialize)]
pub struct CostSnapshot {
    pub monthly: f64,
    pub monthly_since: NaiveDate,
    pub all_time: f64,
}

/// Both counters plus their persistence
pub struct CostTracker {
    monthly: Mutex<CostCounter>,
    all_time: Mutex<CostCounter>,
    store: Arc<dyn StateStore>,
}

impl CostTracker {
    /// Build both counters and restore them from the store
    pub async fn restore(store: Arc<dyn StateStore>, entry_id: &str) -> Self {
        let today = Local::now().date_naive();
        let mut monthly = CostCounter::new(CounterKind::Monthly, entry_id, today);
        let mut all_time = CostCounter::new(CounterKind::AllTime, entry_id, today);

        monthly.restore(store.last_state(monthly.unique_id()).await.as_ref());
        all_time.restore(store.last_state(all_time.unique_id()).await.as_ref());

        debug!(
            monthly = monthly.native_value(),
            all_time = all_time.native_value(),
            "Cost counters restored"
        );

        Self {
            monthly: Mutex::new(monthly),
            all_time: Mutex::new(all_time),
            store,
        }
    }

    /// Add the cost of one call to both counters and persist them
    pub async fn record(&self, cost: f64) {
        self.record_at(cost, Local::now().date_naive()).await
    }

    pub(crate) async fn record_at(&self, cost: f64, today: NaiveDate) {
        let updates = [&self.monthly, &self.all_time].map(|counter| {
            let mut counter = counter.lock().unwrap_or_else(|e| e.into_inner());
            counter.increment(cost, today);
            (counter.unique_id().to_string(), counter.to_stored())
        });

        crate::metrics::record_cost(cost);

        for (unique_id, state) in updates {
            if let Err(e) = self.store.write_state(&unique_id, state).await {
                warn!(unique_id = %unique_id, error = %e, "Failed to persist cost counter");
            }
        }
    }

    pub fn monthly_total(&self) -> f64 {
        self.monthly.lock().unwrap_or_else(|e| e.into_inner()).native_value()
    }

    pub fn all_time_total(&self) -> f64 {
        self.all_time.lock().unwrap_or_else(|e| e.into_inner()).native_value()
    }

    pub fn snapshot(&self) -> CostSnapshot {
        let monthly = self.monthly.lock().unwrap_or_else(|e| e.into_inner());
        let all_time = self.all_time.lock().unwrap_or_else(|e| e.into_inner());
        CostSnapshot {
            monthly: monthly.native_value(),
            monthly_since: monthly.last_reset(),
            all_time: all_time.native_value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::JsonStateStore;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_monthly_sum_within_month() {
        let mut counter = CostCounter::new(CounterKind::Monthly, "entry", date(2025, 5, 3));
        let deltas = [0.005, 0.0125, 0.0, 0.3];
        let mut previous = 0.0;
        for (i, delta) in deltas.iter().enumerate() {
            counter.increment(*delta, date(2025, 5, 3 + i as u32));
            assert!(counter.value >= previous);
            previous = counter.value;
        }
        assert!((counter.value - deltas.iter().sum::<f64>()).abs() < 1e-12);
        assert_eq!(counter.last_reset(), date(2025, 5, 1));
    }

    #[test]
    fn test_monthly_reset_keeps_only_latest_delta() {
        let mut counter = CostCounter::new(CounterKind::Monthly, "entry", date(2025, 5, 20));
        counter.increment(1.5, date(2025, 5, 20));
        counter.increment(0.25, date(2025, 6, 2));
        assert_eq!(counter.value, 0.25);
        assert_eq!(counter.last_reset(), date(2025, 6, 1));
    }

    #[test]
    fn test_monthly_reset_same_month_next_year() {
        let mut counter = CostCounter::new(CounterKind::Monthly, "entry", date(2024, 5, 20));
        counter.increment(1.0, date(2024, 5, 20));
        counter.increment(0.5, date(2025, 5, 20));
        assert_eq!(counter.value, 0.5);
    }

    #[test]
    fn test_all_time_never_resets() {
        let mut counter = CostCounter::new(CounterKind::AllTime, "entry", date(2025, 1, 31));
        counter.increment(1.0, date(2025, 1, 31));
        counter.increment(2.0, date(2025, 2, 1));
        assert_eq!(counter.value, 3.0);
    }

    #[test]
    fn test_negative_and_nan_deltas_ignored() {
        let mut counter = CostCounter::new(CounterKind::AllTime, "entry", date(2025, 1, 1));
        counter.increment(1.0, date(2025, 1, 1));
        counter.increment(-0.5, date(2025, 1, 1));
        counter.increment(f64::NAN, date(2025, 1, 1));
        assert_eq!(counter.value, 1.0);
    }

    #[test]
    fn test_restore_invalid_states() {
        let mut counter = CostCounter::new(CounterKind::AllTime, "entry", date(2025, 1, 1));
        for raw in ["unknown", "unavailable", "abc", "-3"] {
            counter.value = 9.0;
            counter.restore(Some(&StoredState {
                state: raw.to_string(),
                attributes: Map::new(),
            }));
            assert_eq!(counter.value, 0.0, "state {:?}", raw);
        }
        counter.value = 9.0;
        counter.restore(None);
        assert_eq!(counter.value, 0.0);
    }

    #[test]
    fn test_restore_monthly_marker() {
        let mut counter = CostCounter::new(CounterKind::Monthly, "entry", date(2025, 7, 9));
        let attributes = json!({"last_reset": "2025-06-01T00:00:00"});
        counter.restore(Some(&StoredState {
            state: "0.42".to_string(),
            attributes: attributes.as_object().unwrap().clone(),
        }));
        assert_eq!(counter.value, 0.42);
        assert_eq!(counter.last_reset(), date(2025, 6, 1));

        // Stored in June, first July increment resets
        counter.increment(0.1, date(2025, 7, 9));
        assert_eq!(counter.value, 0.1);
    }

    #[test]
    fn test_native_value_rounding() {
        let mut counter = CostCounter::new(CounterKind::AllTime, "entry", date(2025, 1, 1));
        counter.increment(0.123456, date(2025, 1, 1));
        assert_eq!(counter.native_value(), 0.1235);
    }

    #[test]
    fn test_snapshot_serialization() {
        let snapshot = CostSnapshot {
            monthly: 0.25,
            monthly_since: date(2025, 6, 1),
            all_time: 1.5,
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["monthly_since"], "2025-06-01");
        assert_eq!(value["monthly"], 0.25);
        assert_eq!(value["all_time"], 1.5);
    }

    #[test]
    fn test_unique_ids() {
        let monthly = CostCounter::new(CounterKind::Monthly, "abc", date(2025, 1, 1));
        let all_time = CostCounter::new(CounterKind::AllTime, "abc", date(2025, 1, 1));
        assert_eq!(monthly.unique_id(), "abc_perplexity_monthly_bill");
        assert_eq!(all_time.unique_id(), "abc_perplexity_bill");
    }

    #[tokio::test]
    async fn test_tracker_persists_and_restores() {
        let store = Arc::new(JsonStateStore::in_memory());
        let tracker = CostTracker::restore(store.clone(), "entry").await;
        let today = Local::now().date_naive();

        tracker.record_at(0.25, today).await;
        tracker.record_at(0.5, today).await;
        assert_eq!(tracker.monthly_total(), 0.75);
        assert_eq!(tracker.all_time_total(), 0.75);

        let restored = CostTracker::restore(store, "entry").await;
        let snapshot = restored.snapshot();
        assert_eq!(snapshot.monthly, 0.75);
        assert_eq!(snapshot.all_time, 0.75);
        assert_eq!(snapshot.monthly_since, month_start(today));
    }
}
