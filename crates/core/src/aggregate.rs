//! Per-polygon incident statistics

use crate::model::{Assignment, IncidentPayload, PointRecord, Severity};
use crate::observer::{RunObserver, Stage};
use crate::polygons::PolygonSet;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Counts and extrema for the incidents linked to one polygon
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PolygonStats {
    pub total: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    pub categories: BTreeMap<String, u64>,
    pub weekdays: BTreeMap<String, u64>,
    pub parts_of_day: BTreeMap<String, u64>,
    pub weekend: u64,
    pub payday: u64,
    pub first_seen: Option<NaiveDateTime>,
    pub last_seen: Option<NaiveDateTime>,
}

impl PolygonStats {
    fn add(&mut self, payload: &IncidentPayload) {
        self.total += 1;
        match payload.severity {
            Some(Severity::High) => self.high += 1,
            Some(Severity::Medium) => self.medium += 1,
            Some(Severity::Low) => self.low += 1,
            None => {}
        }
        if let Some(category) = non_blank(payload.category.as_deref()) {
            *self.categories.entry(category.to_string()).or_default() += 1;
        }
        if let Some(weekday) = weekday_of(payload) {
            *self.weekdays.entry(weekday).or_default() += 1;
        }
        if let Some(part) = non_blank(payload.part_of_day.as_deref()) {
            *self.parts_of_day.entry(part.to_string()).or_default() += 1;
        }
        if payload.weekend {
            self.weekend += 1;
        }
        if payload.payday {
            self.payday += 1;
        }
        if let Some(ts) = payload.timestamp {
            self.first_seen = Some(self.first_seen.map_or(ts, |t| t.min(ts)));
            self.last_seen = Some(self.last_seen.map_or(ts, |t| t.max(ts)));
        }
    }

    /// `3*high + 2*medium + low`
    pub fn weighted_severity(&self) -> u64 {
        self.high * Severity::High.weight()
            + self.medium * Severity::Medium.weight()
            + self.low * Severity::Low.weight()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Weekday label from the payload, else the English name of the timestamp's day
fn weekday_of(payload: &IncidentPayload) -> Option<String> {
    non_blank(payload.weekday.as_deref())
        .map(str::to_string)
        .or_else(|| payload.timestamp.map(|ts| ts.format("%A").to_string()))
}

/// One stats row per polygon slot, zeros where nothing is linked
pub fn aggregate(
    polygons: &PolygonSet,
    points: &[PointRecord<IncidentPayload>],
    assignments: &[Assignment],
    observer: &mut dyn RunObserver,
) -> Vec<PolygonStats> {
    observer.stage_started(Stage::Aggregation, assignments.len());

    let mut stats = vec![PolygonStats::default(); polygons.len()];
    for assignment in assignments {
        if let Some(slot) = assignment.polygon {
            stats[slot].add(&points[assignment.record].payload);
        }
    }

    let with_incidents = stats.iter().filter(|s| s.total > 0).count();
    info!(
        "Aggregated incidents into {} of {} polygons",
        with_incidents,
        polygons.len()
    );
    observer.stage_finished(Stage::Aggregation, stats.len());
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinkMethod;
    use crate::observer::SilentObserver;
    use crate::polygons::tests::square_polygon;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn incident(row: usize, severity: Severity, category: &str, ts: NaiveDateTime) -> PointRecord {
        PointRecord::new(
            row,
            None,
            None,
            IncidentPayload {
                timestamp: Some(ts),
                severity: Some(severity),
                category: Some(category.to_string()),
                part_of_day: Some("Noche".to_string()),
                weekday: None,
                weekend: row % 2 == 0,
                payday: false,
            },
        )
    }

    #[test]
    fn test_counts_and_extrema() {
        let set = PolygonSet::new(vec![
            square_polygon("A", "Centro", -110.96, 29.08, 0.01),
            square_polygon("B", "Pitic", -110.90, 29.00, 0.01),
        ])
        .unwrap();
        let points = vec![
            incident(0, Severity::High, "Robo", at(4, 22)),
            incident(1, Severity::Low, "Robo", at(2, 1)),
            incident(2, Severity::Medium, "Riña", at(9, 13)),
            incident(3, Severity::High, "Robo", at(5, 8)),
        ];
        let assignments = vec![
            Assignment::linked(0, 0, LinkMethod::Exact),
            Assignment::linked(1, 0, LinkMethod::Buffered),
            Assignment::linked(2, 0, LinkMethod::NameFallback),
            Assignment::unresolved(3),
        ];

        let stats = aggregate(&set, &points, &assignments, &mut SilentObserver);
        assert_eq!(stats.len(), 2);

        let a = &stats[0];
        assert_eq!(a.total, 3);
        assert_eq!((a.high, a.medium, a.low), (1, 1, 1));
        assert_eq!(a.categories["Robo"], 2);
        assert_eq!(a.categories["Riña"], 1);
        assert_eq!(a.parts_of_day["Noche"], 3);
        assert_eq!(a.weekend, 2);
        assert_eq!(a.first_seen, Some(at(2, 1)));
        assert_eq!(a.last_seen, Some(at(9, 13)));
        assert_eq!(a.weighted_severity(), 6);
        // 2024-03-02 was a Saturday
        assert_eq!(a.weekdays["Saturday"], 1);

        assert_eq!(stats[1], PolygonStats::default());
    }

    #[test]
    fn test_total_matches_assignments() {
        let set =
            PolygonSet::new(vec![square_polygon("A", "Centro", -110.96, 29.08, 0.01)]).unwrap();
        let points: Vec<PointRecord> = (0..5)
            .map(|i| PointRecord::new(i, None, None, IncidentPayload::default()))
            .collect();
        let assignments: Vec<Assignment> = (0..5)
            .map(|i| {
                if i < 3 {
                    Assignment::linked(i, 0, LinkMethod::Exact)
                } else {
                    Assignment::unresolved(i)
                }
            })
            .collect();

        let stats = aggregate(&set, &points, &assignments, &mut SilentObserver);
        let linked = assignments.iter().filter(|a| a.polygon == Some(0)).count() as u64;
        assert_eq!(stats[0].total, linked);
        assert!(stats[0].categories.is_empty());
        assert_eq!(stats[0].first_seen, None);
    }

    #[test]
    fn test_explicit_weekday_label_wins() {
        let payload = IncidentPayload {
            timestamp: Some(at(2, 1)),
            weekday: Some("Sábado".to_string()),
            ..Default::default()
        };
        assert_eq!(weekday_of(&payload).as_deref(), Some("Sábado"));
        assert_eq!(weekday_of(&IncidentPayload::default()), None);
    }
}
