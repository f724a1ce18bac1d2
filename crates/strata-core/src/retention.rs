//! Retention-rule grammar and bucket algorithm:
//! `latestN,hoursN,daysN,weeksN,monthsN,yearsN`.
//!
//! Versions are sorted youngest-first. Any `latest` rule claims the first N
//! unconditionally. Every remaining version is then tested against the
//! other categories from finest to coarsest grain; the first category whose
//! window it still falls inside claims it, bucketed by
//! `age // category_unit_seconds`. Only the oldest version in each bucket
//! survives: every bucket's full membership is tracked as it fills, and
//! since versions arrive youngest-first, the last member pushed into a
//! bucket is its oldest — every other member is dismissed.

use crate::model::Version;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl Category {
    /// Ordered finest to coarsest; `latest` is handled separately.
    const ORDER: [Category; 5] = [
        Category::Hours,
        Category::Days,
        Category::Weeks,
        Category::Months,
        Category::Years,
    ];

    fn unit_seconds(self) -> i64 {
        match self {
            Category::Hours => 3_600,
            Category::Days => 86_400,
            Category::Weeks => 604_800,
            Category::Months => 2_592_000,
            Category::Years => 31_536_000,
        }
    }

}

/// A parsed retention policy: an optional `latest` count plus per-category
/// window counts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub latest: Option<u32>,
    pub hours: Option<u32>,
    pub days: Option<u32>,
    pub weeks: Option<u32>,
    pub months: Option<u32>,
    pub years: Option<u32>,
}

impl RetentionPolicy {
    fn category_count(&self, category: Category) -> Option<u32> {
        match category {
            Category::Hours => self.hours,
            Category::Days => self.days,
            Category::Weeks => self.weeks,
            Category::Months => self.months,
            Category::Years => self.years,
        }
    }
}

/// Parse a retention-rule string such as `"latest3,hours24,days30,months6"`.
pub fn parse_rules(spec: &str) -> Result<RetentionPolicy, String> {
    let mut policy = RetentionPolicy::default();
    let mut seen = HashSet::new();

    for rule in spec.split(',') {
        let rule = rule.trim();
        if rule.is_empty() {
            continue;
        }
        let split_at = rule
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| format!("malformed retention rule '{rule}'"))?;
        let (category_name, count_str) = rule.split_at(split_at);
        let count: u32 = count_str
            .parse()
            .map_err(|_| format!("malformed retention rule '{rule}': invalid count"))?;
        if count == 0 {
            return Err(format!("retention rule '{rule}' must have a positive count"));
        }
        if !seen.insert(category_name.to_string()) {
            return Err(format!("duplicate retention category '{category_name}'"));
        }

        match category_name {
            "latest" => policy.latest = Some(count),
            "hours" => policy.hours = Some(count),
            "days" => policy.days = Some(count),
            "weeks" => policy.weeks = Some(count),
            "months" => policy.months = Some(count),
            "years" => policy.years = Some(count),
            other => return Err(format!("unknown retention category '{other}'")),
        }
    }

    Ok(policy)
}

/// Apply a retention policy to a set of versions for one volume. Returns the
/// ids of versions to dismiss (everything not in the returned set is kept).
pub fn versions_to_dismiss(
    versions: &[Version],
    policy: &RetentionPolicy,
    reference_time: i64,
) -> HashSet<u64> {
    let mut sorted: Vec<&Version> = versions.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));

    let mut kept: HashSet<u64> = HashSet::new();
    let mut buckets: HashMap<(Category, i64), Vec<u64>> = HashMap::new();
    let mut unmatched: HashSet<u64> = HashSet::new();

    let latest_n = policy.latest.unwrap_or(0) as usize;
    for version in sorted.iter().take(latest_n) {
        kept.insert(version.id);
    }

    for version in sorted.iter().skip(latest_n) {
        let age = reference_time - version.date;
        if age < 0 {
            // Future-dated version: err on the safe side and keep it.
            kept.insert(version.id);
            continue;
        }

        let mut matched = false;
        for category in Category::ORDER {
            let Some(count) = policy.category_count(category) else {
                continue;
            };
            let timecount = age / category.unit_seconds();
            if timecount < count as i64 {
                buckets.entry((category, timecount)).or_default().push(version.id);
                matched = true;
                break;
            }
        }
        if !matched {
            unmatched.insert(version.id);
        }
    }

    // Versions are visited youngest-first, so within a populated bucket the
    // last-pushed member is the oldest; keep it and dismiss the rest.
    let mut dismissed = unmatched;
    for mut members in buckets.into_values() {
        members.pop();
        dismissed.extend(members);
    }
    dismissed
}

/// Expand a dismissal set: for every dismissed version that carries
/// `group_label`, also dismiss every other version in `versions` sharing
/// that label's value (step 6 of retention enforcement).
pub fn expand_by_label(dismissed: HashSet<u64>, versions: &[Version], group_label: &str) -> HashSet<u64> {
    let mut group_values: HashSet<&Option<String>> = HashSet::new();
    for version in versions {
        if dismissed.contains(&version.id) {
            if let Some(value) = version.labels.get(group_label) {
                group_values.insert(value);
            }
        }
    }
    if group_values.is_empty() {
        return dismissed;
    }

    let mut expanded = dismissed;
    for version in versions {
        if let Some(value) = version.labels.get(group_label) {
            if group_values.contains(value) {
                expanded.insert(version.id);
            }
        }
    }
    expanded
}
