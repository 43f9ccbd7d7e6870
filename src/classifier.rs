//! Heuristic place classification.
//!
//! [`PlaceClassifier::classify`] is an ordered decision list, first match wins:
//!
//! 1. POI name keyword match (case-insensitive substring) => HIGH confidence
//! 2. Visit-pattern inference over the place's history => MEDIUM / LOW
//! 3. Fallback => `(OTHER, LOW)`
//!
//! [`determine_significance`] ranks a place by frequency and recency.
//!
//! Keyword lists, pattern thresholds and significance tiers are plain data,
//! so tuning them never touches control flow. Nothing here can fail.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Offset, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{PlaceMapError, Result};
use crate::{CategoryConfidence, PlaceCategory, PlaceSignificance, PlaceVisitRecord};

// ============================================================================
// Lookup Tables
// ============================================================================

/// Keyword lists, checked top to bottom. Earlier categories win, so more
/// specific phrases ("gas station", "barber") sit above the generic ones
/// they would otherwise collide with ("station", "shop").
pub const CATEGORY_KEYWORDS: &[(PlaceCategory, &[&str])] = &[
    (
        PlaceCategory::Food,
        &[
            "restaurant", "cafe", "café", "coffee", "bakery", "bistro", "diner", "pizza",
            "burger", "sushi", "grill", "kitchen", "eatery", "steakhouse", "buffet", "ramen",
            "taqueria", "food",
        ],
    ),
    (
        PlaceCategory::Service,
        &[
            "bank", "salon", "barber", "laundry", "post office", "repair", "car wash",
            "gas station", "dry clean", "parking", "mechanic",
        ],
    ),
    (
        PlaceCategory::Shopping,
        &[
            "supermarket", "market", "mall", "store", "shop", "boutique", "outlet", "grocery",
        ],
    ),
    (
        PlaceCategory::Fitness,
        &[
            "gym", "fitness", "yoga", "pilates", "crossfit", "sports club", "swimming",
            "climbing", "martial arts",
        ],
    ),
    (
        PlaceCategory::Entertainment,
        &[
            "cinema", "theater", "theatre", "museum", "concert", "stadium", "arena", "bowling",
            "casino", "gallery", "zoo", "amusement", "opera",
        ],
    ),
    (
        PlaceCategory::Travel,
        &[
            "airport", "station", "terminal", "hotel", "hostel", "motel", "resort", "railway",
            "ferry",
        ],
    ),
    (
        PlaceCategory::Healthcare,
        &[
            "hospital", "clinic", "pharmacy", "doctor", "dental", "dentist", "medical",
            "health", "physio",
        ],
    ),
    (
        PlaceCategory::Education,
        &[
            "school", "university", "college", "academy", "library", "campus", "kindergarten",
            "institute",
        ],
    ),
    (
        PlaceCategory::Religious,
        &[
            "church", "mosque", "temple", "synagogue", "cathedral", "chapel", "shrine",
            "monastery",
        ],
    ),
    (
        PlaceCategory::Outdoor,
        &[
            "park", "garden", "beach", "trail", "forest", "lake", "mountain", "campground",
            "nature reserve", "playground",
        ],
    ),
    (
        PlaceCategory::Social,
        &[
            "pub", "nightclub", "night club", "lounge", "tavern", "brewery", "wine bar",
            "cocktail", "karaoke", "community center",
        ],
    ),
    (
        PlaceCategory::Work,
        &[
            "office", "headquarters", "coworking", "co-working", "corporate", "factory",
            "warehouse",
        ],
    ),
    (
        PlaceCategory::Home,
        &["home", "residence", "apartment", "my house"],
    ),
];

/// One significance tier: reached with at least `min_visits` visits and a
/// last visit no more than `max_days_since_last` days ago (inclusive).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignificanceTier {
    pub significance: PlaceSignificance,
    pub min_visits: u32,
    pub max_days_since_last: f64,
}

/// Tiers, checked top to bottom. Anything below the last one is RARE.
pub const SIGNIFICANCE_TIERS: &[SignificanceTier] = &[
    SignificanceTier {
        significance: PlaceSignificance::Primary,
        min_visits: 20,
        max_days_since_last: 7.0,
    },
    SignificanceTier {
        significance: PlaceSignificance::Frequent,
        min_visits: 10,
        max_days_since_last: 30.0,
    },
    SignificanceTier {
        significance: PlaceSignificance::Occasional,
        min_visits: 3,
        max_days_since_last: 90.0,
    },
];

// ============================================================================
// Configuration
// ============================================================================

/// Thresholds for pattern-based inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternThresholds {
    /// HOME: minimum number of visits.
    /// Default: 10
    pub home_min_visits: usize,
    /// HOME: mean visit duration must exceed this many hours.
    /// Default: 4.0
    pub home_min_mean_hours: f64,

    /// WORK: share of visits starting on a weekday during working hours
    /// must exceed this. Default: 0.6
    pub work_min_fraction: f64,
    /// WORK: minimum number of visits.
    /// Default: 5
    pub work_min_visits: usize,
    /// WORK: mean visit duration must exceed this many hours.
    /// Default: 2.0
    pub work_min_mean_hours: f64,
    /// First working hour (inclusive). Default: 9
    pub work_start_hour: u32,
    /// Last working hour (inclusive). Default: 17
    pub work_end_hour: u32,

    /// SOCIAL/ENTERTAINMENT: share of visits in the evening or at the weekend
    /// must exceed this. Default: 0.6
    pub leisure_min_fraction: f64,
    /// SOCIAL/ENTERTAINMENT: minimum number of visits.
    /// Default: 3
    pub leisure_min_visits: usize,
    /// Visits starting at or after this hour count as evening. Default: 18
    pub evening_start_hour: u32,
    /// Leisure visits longer than this (mean, hours) are SOCIAL, otherwise
    /// ENTERTAINMENT. Default: 2.0
    pub social_min_mean_hours: f64,
}

impl Default for PatternThresholds {
    fn default() -> Self {
        Self {
            home_min_visits: 10,
            home_min_mean_hours: 4.0,
            work_min_fraction: 0.6,
            work_min_visits: 5,
            work_min_mean_hours: 2.0,
            work_start_hour: 9,
            work_end_hour: 17,
            leisure_min_fraction: 0.6,
            leisure_min_visits: 3,
            evening_start_hour: 18,
            social_min_mean_hours: 2.0,
        }
    }
}

/// Configuration for [`PlaceClassifier`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub thresholds: PatternThresholds,
    /// Offset applied to visit start times before hour/weekday checks, so
    /// "evening" means the user's evening. Default: 0 (UTC)
    pub utc_offset_seconds: i32,
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        for (name, fraction) in [
            ("work_min_fraction", t.work_min_fraction),
            ("leisure_min_fraction", t.leisure_min_fraction),
        ] {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(PlaceMapError::config(format!(
                    "classifier.thresholds.{} must be within 0..=1",
                    name
                )));
            }
        }
        if t.work_start_hour > t.work_end_hour || t.work_end_hour > 23 || t.evening_start_hour > 23 {
            return Err(PlaceMapError::config("classifier hour thresholds must be within 0..=23"));
        }
        if FixedOffset::east_opt(self.utc_offset_seconds).is_none() {
            return Err(PlaceMapError::config(format!(
                "classifier.utc_offset_seconds {} is out of range",
                self.utc_offset_seconds
            )));
        }
        Ok(())
    }

    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_seconds).unwrap_or_else(|| Utc.fix())
    }
}

// ============================================================================
// Classifier
// ============================================================================

/// Aggregate view of a place's visit history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryStats {
    pub visit_count: usize,
    pub mean_duration_hours: f64,
    /// Share of visits starting Monday-Friday within working hours
    pub weekday_daytime_fraction: f64,
    /// Share of visits starting in the evening or on a weekend
    pub evening_weekend_fraction: f64,
}

/// Assigns a category and confidence to place visits.
#[derive(Debug, Clone, Default)]
pub struct PlaceClassifier {
    config: ClassifierConfig,
}

impl PlaceClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify a visit, using every recorded visit to the same place as history.
    pub fn classify(
        &self,
        visit: &PlaceVisitRecord,
        history: &[PlaceVisitRecord],
    ) -> (PlaceCategory, CategoryConfidence) {
        if let Some(category) = visit.poi_name.as_deref().and_then(match_keywords) {
            return (category, CategoryConfidence::High);
        }

        if let Some(result) = self.infer_from_pattern(history) {
            return result;
        }

        (PlaceCategory::Other, CategoryConfidence::Low)
    }

    /// Pattern-based inference alone. `None` for empty or inconclusive history.
    pub fn infer_from_pattern(
        &self,
        history: &[PlaceVisitRecord],
    ) -> Option<(PlaceCategory, CategoryConfidence)> {
        let stats = self.history_stats(history)?;
        let t = &self.config.thresholds;

        if stats.visit_count >= t.home_min_visits && stats.mean_duration_hours > t.home_min_mean_hours {
            return Some((PlaceCategory::Home, CategoryConfidence::Medium));
        }

        if stats.weekday_daytime_fraction > t.work_min_fraction
            && stats.visit_count >= t.work_min_visits
            && stats.mean_duration_hours > t.work_min_mean_hours
        {
            return Some((PlaceCategory::Work, CategoryConfidence::Medium));
        }

        if stats.evening_weekend_fraction > t.leisure_min_fraction
            && stats.visit_count >= t.leisure_min_visits
        {
            let category = if stats.mean_duration_hours > t.social_min_mean_hours {
                PlaceCategory::Social
            } else {
                PlaceCategory::Entertainment
            };
            return Some((category, CategoryConfidence::Low));
        }

        None
    }

    /// Summarize a visit history in local time. `None` when empty.
    pub fn history_stats(&self, history: &[PlaceVisitRecord]) -> Option<HistoryStats> {
        if history.is_empty() {
            return None;
        }
        let t = &self.config.thresholds;
        let offset = self.config.offset();

        let mut total_seconds = 0i64;
        let mut weekday_daytime = 0usize;
        let mut evening_weekend = 0usize;

        for visit in history {
            total_seconds += visit.duration().num_seconds();

            let local = visit.start_time.with_timezone(&offset);
            let hour = local.hour();
            let weekend = matches!(local.weekday(), Weekday::Sat | Weekday::Sun);

            if !weekend && hour >= t.work_start_hour && hour <= t.work_end_hour {
                weekday_daytime += 1;
            }
            if weekend || hour >= t.evening_start_hour {
                evening_weekend += 1;
            }
        }

        let n = history.len() as f64;
        Some(HistoryStats {
            visit_count: history.len(),
            mean_duration_hours: total_seconds as f64 / n / 3600.0,
            weekday_daytime_fraction: weekday_daytime as f64 / n,
            evening_weekend_fraction: evening_weekend as f64 / n,
        })
    }
}

/// First category whose keyword list matches `name` (case-insensitive substring).
pub fn match_keywords(name: &str) -> Option<PlaceCategory> {
    let name = name.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| name.contains(k)))
        .map(|(category, _)| *category)
}

/// Importance tier of a place from its visit count and last visit.
///
/// Tiers come from [`SIGNIFICANCE_TIERS`]; the day bound is inclusive. The
/// total duration is accepted alongside the other place aggregates but the
/// tiers only look at frequency and recency.
pub fn determine_significance(
    visit_count: u32,
    _total_duration: Duration,
    last_visit: DateTime<Utc>,
    now: DateTime<Utc>,
) -> PlaceSignificance {
    let days_since = (now - last_visit).num_seconds() as f64 / 86_400.0;
    SIGNIFICANCE_TIERS
        .iter()
        .find(|tier| visit_count >= tier.min_visits && days_since <= tier.max_days_since_last)
        .map(|tier| tier.significance)
        .unwrap_or(PlaceSignificance::Rare)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Coordinate;
    use chrono::TimeZone;

    /// 2024-01-01 is a Monday.
    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn visit(day: u32, hour: u32, hours: i64) -> PlaceVisitRecord {
        let start = at(day, hour);
        PlaceVisitRecord::new("v", Coordinate::new(0.0, 0.0), start, start + Duration::hours(hours))
    }

    #[test]
    fn test_keyword_table() {
        let cases = [
            ("Central Perk Cafe", PlaceCategory::Food),
            ("Blue Bottle Coffee", PlaceCategory::Food),
            ("Chase Bank", PlaceCategory::Service),
            ("Tony's Barber Shop", PlaceCategory::Service),
            ("Shell Gas Station", PlaceCategory::Service),
            ("Westfield Mall", PlaceCategory::Shopping),
            ("Planet Fitness", PlaceCategory::Fitness),
            ("AMC Cinema", PlaceCategory::Entertainment),
            ("JFK Airport", PlaceCategory::Travel),
            ("St. Mary's Hospital", PlaceCategory::Healthcare),
            ("Stanford University", PlaceCategory::Education),
            ("Notre-Dame Cathedral", PlaceCategory::Religious),
            ("Golden Gate Park", PlaceCategory::Outdoor),
            ("The Crown Pub", PlaceCategory::Social),
            ("Acme Corp Office", PlaceCategory::Work),
            ("HOME", PlaceCategory::Home),
        ];
        for (name, expected) in cases {
            assert_eq!(match_keywords(name), Some(expected), "{}", name);
        }
        assert_eq!(match_keywords("Zzyzx"), None);
    }

    #[test]
    fn test_poi_beats_history() {
        let classifier = PlaceClassifier::default();
        // Twelve long weekday-daytime visits would otherwise be HOME
        let history: Vec<_> = (1..=12).map(|d| visit(d, 10, 6)).collect();
        let poi = visit(1, 10, 6).with_poi_name("Mario's Restaurant");
        assert_eq!(
            classifier.classify(&poi, &history),
            (PlaceCategory::Food, CategoryConfidence::High)
        );
    }

    #[test]
    fn test_home_pattern() {
        let classifier = PlaceClassifier::default();
        let history: Vec<_> = (1..=12).map(|d| visit(d, 20, 6)).collect();
        assert_eq!(
            classifier.classify(&history[0], &history),
            (PlaceCategory::Home, CategoryConfidence::Medium)
        );
    }

    #[test]
    fn test_work_pattern() {
        let classifier = PlaceClassifier::default();
        // Mon-Fri, 09:00 starts, 3 hours each
        let history: Vec<_> = (1..=5).map(|d| visit(d, 9, 3)).collect();
        assert_eq!(
            classifier.classify(&history[0], &history),
            (PlaceCategory::Work, CategoryConfidence::Medium)
        );
    }

    #[test]
    fn test_leisure_patterns() {
        let classifier = PlaceClassifier::default();
        // Saturday/Sunday and an evening, short stays
        let short = vec![visit(6, 14, 1), visit(7, 15, 1), visit(2, 19, 1)];
        assert_eq!(
            classifier.classify(&short[0], &short),
            (PlaceCategory::Entertainment, CategoryConfidence::Low)
        );

        let long = vec![visit(6, 14, 3), visit(7, 15, 3), visit(2, 19, 3)];
        assert_eq!(
            classifier.classify(&long[0], &long),
            (PlaceCategory::Social, CategoryConfidence::Low)
        );
    }

    #[test]
    fn test_fallback() {
        let classifier = PlaceClassifier::default();
        let lone = visit(1, 10, 1);
        assert_eq!(
            classifier.classify(&lone, &[]),
            (PlaceCategory::Other, CategoryConfidence::Low)
        );
        // Two weekday visits: too few for any pattern
        let history = vec![visit(1, 10, 1), visit(2, 10, 1)];
        assert_eq!(
            classifier.classify(&history[0], &history),
            (PlaceCategory::Other, CategoryConfidence::Low)
        );
    }

    #[test]
    fn test_utc_offset_shifts_hours() {
        // 16:00 UTC Monday is 19:00 at UTC+3: evening, not working hours
        let history: Vec<_> = (0..3).map(|_| visit(1, 16, 1)).collect();
        let utc = PlaceClassifier::default().history_stats(&history).unwrap();
        assert_eq!(utc.weekday_daytime_fraction, 1.0);
        assert_eq!(utc.evening_weekend_fraction, 0.0);

        let shifted = PlaceClassifier::new(ClassifierConfig {
            utc_offset_seconds: 3 * 3600,
            ..Default::default()
        })
        .history_stats(&history)
        .unwrap();
        assert_eq!(shifted.weekday_daytime_fraction, 0.0);
        assert_eq!(shifted.evening_weekend_fraction, 1.0);
    }

    #[test]
    fn test_significance_table() {
        let now = at(31, 12);
        let zero = Duration::zero();
        let cases = [
            (25, now, PlaceSignificance::Primary),
            (20, now - Duration::days(7), PlaceSignificance::Primary),
            (20, now - Duration::days(8), PlaceSignificance::Frequent),
            (10, now - Duration::days(30), PlaceSignificance::Frequent),
            (10, now - Duration::days(31), PlaceSignificance::Occasional),
            (3, now - Duration::days(90), PlaceSignificance::Occasional),
            (3, now - Duration::days(91), PlaceSignificance::Rare),
            (2, now, PlaceSignificance::Rare),
            (1, now - Duration::days(400), PlaceSignificance::Rare),
        ];
        for (count, last, expected) in cases {
            assert_eq!(determine_significance(count, zero, last, now), expected, "{} visits", count);
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(ClassifierConfig::default().validate().is_ok());
        let mut config = ClassifierConfig::default();
        config.thresholds.work_min_fraction = 1.5;
        assert!(config.validate().is_err());

        let config = ClassifierConfig {
            utc_offset_seconds: 90_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
