use chrono::{DateTime, Utc};
use serde::Serialize;

pub const POINTS_PER_PERSON: u64 = 10;
pub const POINTS_PER_RELATION: u64 = 5;
pub const POINTS_PER_VERIFIED_SOURCE: u64 = 20;

pub const COLLECTOR_MIN_PEOPLE: u64 = 10;
pub const VERIFIER_MIN_SOURCES: u64 = 5;
pub const EXPERT_MIN_POINTS: u64 = 100;

pub fn total_points(people: u64, relations: u64, verified: u64) -> u64 {
    people * POINTS_PER_PERSON
        + relations * POINTS_PER_RELATION
        + verified * POINTS_PER_VERIFIED_SOURCE
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum Badge {
    Collector,
    Verifier,
    Expert,
}

impl Badge {
    pub fn title(self) -> &'static str {
        match self {
            Badge::Collector => "Collector",
            Badge::Verifier => "Verifier",
            Badge::Expert => "Expert",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Badge::Collector => "10 personnes ajoutées",
            Badge::Verifier => "5 sources vérifiées",
            Badge::Expert => "100 points atteints",
        }
    }
}

/// Derived contribution counters. Never stored.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct UserStats {
    pub people_added: u64,
    pub relations_created: u64,
    pub sources_verified: u64,
    pub total_points: u64,
    pub member_since: Option<DateTime<Utc>>,
}

impl UserStats {
    pub fn from_counts(people: u64, relations: u64, verified: u64) -> Self {
        Self {
            people_added: people,
            relations_created: relations,
            sources_verified: verified,
            total_points: total_points(people, relations, verified),
            member_since: None,
        }
    }

    pub fn badges(&self) -> Vec<Badge> {
        let mut badges = Vec::new();
        if self.people_added >= COLLECTOR_MIN_PEOPLE {
            badges.push(Badge::Collector);
        }
        if self.sources_verified >= VERIFIER_MIN_SOURCES {
            badges.push(Badge::Verifier);
        }
        if self.total_points >= EXPERT_MIN_POINTS {
            badges.push(Badge::Expert);
        }
        badges
    }

    /// Nothing contributed yet.
    pub fn is_newcomer(&self) -> bool {
        self.people_added == 0 && self.sources_verified == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_formula() {
        for p in 0..12 {
            for r in 0..12 {
                for v in 0..12 {
                    assert_eq!(total_points(p, r, v), 10 * p + 5 * r + 20 * v);
                }
            }
        }
        assert_eq!(total_points(u32::MAX as u64, 0, 0), 10 * u32::MAX as u64);
    }

    #[test]
    fn test_collector_threshold_is_inclusive() {
        assert!(!UserStats::from_counts(9, 0, 0).badges().contains(&Badge::Collector));
        assert!(UserStats::from_counts(10, 0, 0).badges().contains(&Badge::Collector));
    }

    #[test]
    fn test_verifier_and_expert_thresholds() {
        let stats = UserStats::from_counts(0, 0, 5);
        assert_eq!(stats.total_points, 100);
        assert_eq!(stats.badges(), vec![Badge::Verifier, Badge::Expert]);

        let stats = UserStats::from_counts(0, 19, 0);
        assert_eq!(stats.total_points, 95);
        assert!(stats.badges().is_empty());
    }
}
