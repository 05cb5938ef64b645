use chrono::{DateTime, Utc};

use crate::db::models::{GeoSample, Place, PlaceSection};
use crate::segmentation::{config::SegmentationConfig, matcher::closest_containing_place};

/// Position of `timestamp` within the half-open `window`, as a fraction
/// clamped to [0, 1]. The window is one calendar day, which is not always
/// 24 hours long in a local zone.
pub fn time_of_day_fraction(
    window: (DateTime<Utc>, DateTime<Utc>),
    timestamp: DateTime<Utc>,
) -> f64 {
    let (start, end) = window;
    let length_ms = (end - start).num_milliseconds();
    if length_ms <= 0 {
        return 0.0;
    }
    let elapsed_ms = (timestamp - start).num_milliseconds();
    (elapsed_ms as f64 / length_ms as f64).clamp(0.0, 1.0)
}

/// Turns one day's samples into contiguous place sections covering [0, 1].
///
/// `window` is the day's `[start, end)` interval. `samples` must fall inside
/// it and be in ascending time order. Consecutive samples that resolve to the
/// same place (or to no place) share one section; each section ends where the
/// next one starts, and the last one is stretched to midnight.
pub fn segments_for_day(
    window: (DateTime<Utc>, DateTime<Utc>),
    samples: &[GeoSample],
    places: &[Place],
    config: &SegmentationConfig,
) -> Vec<PlaceSection> {
    let mut sections: Vec<PlaceSection> = Vec::new();

    for sample in samples {
        let time = time_of_day_fraction(window, sample.timestamp);
        let place = closest_containing_place(places, sample.latitude, sample.longitude);

        let switched = match sections.last_mut() {
            None => true,
            Some(current) => {
                current.end_time = time;
                !Place::is_same_place(current.place.as_ref(), place)
            }
        };

        if switched {
            sections.push(PlaceSection {
                place: place.cloned(),
                start_time: time,
                end_time: time,
            });
        }
    }

    let Some(last) = sections.last_mut() else {
        return vec![PlaceSection::unknown(0.0, 1.0)];
    };
    last.end_time = 1.0;

    let first = &mut sections[0];
    if first.start_time > config.min_leading_gap && first.place.is_some() {
        let gap_end = first.start_time;
        sections.insert(0, PlaceSection::unknown(0.0, gap_end));
    } else {
        // Short gaps, and gaps in front of an unknown section, belong to the
        // first section so that adjacent sections never share a place.
        first.start_time = 0.0;
    }

    sections
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    const HOME: (f64, f64) = (47.3769, 8.5417);
    const WORK: (f64, f64) = (47.4000, 8.6000);
    const NOWHERE: (f64, f64) = (46.0000, 7.0000);

    fn places() -> Vec<Place> {
        vec![
            Place {
                name: "Home".into(),
                color: "Green".into(),
                latitude: HOME.0,
                longitude: HOME.1,
                radius: 200.0,
            },
            Place {
                name: "Work".into(),
                color: "Blue".into(),
                latitude: WORK.0,
                longitude: WORK.1,
                radius: 200.0,
            },
        ]
    }

    const SECONDS_PER_DAY: f64 = 86_400.0;

    fn day_start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn day() -> (DateTime<Utc>, DateTime<Utc>) {
        (day_start(), day_start() + Duration::days(1))
    }

    /// Sample at a fraction of the day, on a whole second.
    fn sample(fraction: f64, at: (f64, f64)) -> GeoSample {
        let secs = (fraction * SECONDS_PER_DAY).round() as i64;
        GeoSample::new(day_start() + Duration::seconds(secs), at.0, at.1)
    }

    fn run(samples: &[GeoSample]) -> Vec<PlaceSection> {
        segments_for_day(day(), samples, &places(), &SegmentationConfig::default())
    }

    fn names(sections: &[PlaceSection]) -> Vec<Option<&str>> {
        sections.iter().map(|s| s.place_name()).collect()
    }

    fn assert_covers_day(sections: &[PlaceSection]) {
        assert_eq!(sections[0].start_time, 0.0);
        assert_eq!(sections.last().unwrap().end_time, 1.0);
        for pair in sections.windows(2) {
            assert_eq!(pair[0].end_time, pair[1].start_time);
            assert!(
                !Place::is_same_place(pair[0].place.as_ref(), pair[1].place.as_ref()),
                "adjacent sections share a place: {pair:?}"
            );
        }
    }

    #[test]
    fn empty_day_is_one_unknown_section() {
        let sections = run(&[]);
        assert_eq!(sections, vec![PlaceSection::unknown(0.0, 1.0)]);
    }

    #[test]
    fn single_place_day_reports_leading_gap() {
        let sections = run(&[sample(0.1, HOME), sample(0.3, HOME), sample(0.5, HOME)]);

        assert_eq!(names(&sections), vec![None, Some("Home")]);
        assert_eq!(sections[0].end_time, sections[1].start_time);
        assert!((sections[1].start_time - 0.1).abs() < 1e-9);
        assert_eq!(sections[1].end_time, 1.0);
        assert_covers_day(&sections);
    }

    #[test]
    fn place_switches_open_new_sections() {
        let sections = run(&[sample(0.2, HOME), sample(0.4, WORK), sample(0.6, HOME)]);

        assert_eq!(names(&sections), vec![None, Some("Home"), Some("Work"), Some("Home")]);
        let bounds: Vec<(f64, f64)> = sections
            .iter()
            .map(|s| (s.start_time, s.end_time))
            .collect();
        let expected = [(0.0, 0.2), (0.2, 0.4), (0.4, 0.6), (0.6, 1.0)];
        for ((start, end), (want_start, want_end)) in bounds.iter().zip(expected) {
            assert!((start - want_start).abs() < 1e-9);
            assert!((end - want_end).abs() < 1e-9);
        }
        assert_covers_day(&sections);
    }

    #[test]
    fn gap_under_a_minute_is_absorbed() {
        let sections = run(&[sample(30.0 / SECONDS_PER_DAY, HOME), sample(0.5, HOME)]);
        assert_eq!(names(&sections), vec![Some("Home")]);
        assert_covers_day(&sections);
    }

    #[test]
    fn all_one_place_from_midnight_is_a_single_section() {
        let sections = run(&[sample(0.0, WORK), sample(0.25, WORK), sample(0.9, WORK)]);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].place_name(), Some("Work"));
        assert_covers_day(&sections);
    }

    #[test]
    fn unmatched_runs_merge_and_absorb_leading_gap() {
        let sections = run(&[
            sample(0.3, NOWHERE),
            sample(0.35, NOWHERE),
            sample(0.5, HOME),
            sample(0.7, NOWHERE),
            sample(0.8, NOWHERE),
        ]);

        assert_eq!(names(&sections), vec![None, Some("Home"), None]);
        assert!((sections[0].end_time - 0.5).abs() < 1e-9);
        assert_covers_day(&sections);
    }

    #[test]
    fn only_unmatched_samples_yield_one_unknown_section() {
        let sections = run(&[sample(0.4, NOWHERE), sample(0.6, NOWHERE)]);
        assert_eq!(sections, vec![PlaceSection::unknown(0.0, 1.0)]);
    }

    #[test]
    fn fraction_is_clamped_to_the_day() {
        let start = day_start();
        assert_eq!(time_of_day_fraction(day(), start - Duration::hours(1)), 0.0);
        assert_eq!(time_of_day_fraction(day(), start + Duration::hours(12)), 0.5);
        assert_eq!(time_of_day_fraction(day(), start + Duration::hours(30)), 1.0);
    }

    #[test]
    fn long_day_keeps_its_last_hour_inside_the_day() {
        // A 25-hour local day, as when clocks fall back.
        let start = day_start();
        let window = (start, start + Duration::hours(25));
        let samples = [
            GeoSample::new(start + Duration::hours(1), HOME.0, HOME.1),
            GeoSample::new(start + Duration::minutes(24 * 60 + 10), NOWHERE.0, NOWHERE.1),
            GeoSample::new(start + Duration::minutes(24 * 60 + 40), HOME.0, HOME.1),
        ];
        let sections =
            segments_for_day(window, &samples, &places(), &SegmentationConfig::default());

        assert_eq!(names(&sections), vec![None, Some("Home"), None, Some("Home")]);
        let day_minutes = 25.0 * 60.0;
        assert!((sections[1].start_time - 60.0 / day_minutes).abs() < 1e-9);
        assert!((sections[2].start_time - 1450.0 / day_minutes).abs() < 1e-9);
        assert!((sections[3].start_time - 1480.0 / day_minutes).abs() < 1e-9);
        assert!(sections.iter().all(|s| s.start_time < 1.0));
        assert_covers_day(&sections);
    }

    #[test]
    fn short_day_scales_to_its_length() {
        // A 23-hour local day, as when clocks spring forward.
        let start = day_start();
        let window = (start, start + Duration::hours(23));
        assert_eq!(
            time_of_day_fraction(window, start + Duration::minutes(23 * 30)),
            0.5
        );
    }
}
