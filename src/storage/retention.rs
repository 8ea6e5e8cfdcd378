use chrono::{DateTime, Days, Months, TimeDelta, Utc};
use std::cmp::Reverse;
use std::fmt;

use super::backup::Backup;
use crate::error::{BackupError, Result};

/// A calendar-aware duration such as `1D`, `2W`, `1M`, `1Y` or `T12H`.
/// A leading `P` as in ISO 8601 periods is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepInterval {
    spec: String,
    months: u32,
    days: u64,
    seconds: i64,
}

impl KeepInterval {
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = |reason: &str| BackupError::RetentionConfig { spec: spec.to_string(), reason: reason.to_string() };

        let body = spec.trim();
        let body = body.strip_prefix('P').unwrap_or(body);
        if body.is_empty() {
            return Err(invalid("empty interval"));
        }

        let (mut months, mut days, mut seconds) = (0u32, 0u64, 0i64);
        let mut in_time = false;
        let mut time_units = 0;
        let mut digits = String::new();
        for c in body.chars() {
            match c {
                '0'..='9' => digits.push(c),
                'T' if !in_time && digits.is_empty() => in_time = true,
                unit => {
                    if digits.is_empty() {
                        return Err(invalid("expected a number before each unit"));
                    }
                    let n: u32 = digits.parse().map_err(|_| invalid("number out of range"))?;
                    digits.clear();
                    if in_time {
                        time_units += 1;
                    }
                    match (in_time, unit) {
                        (false, 'Y') => months = months.saturating_add(n.saturating_mul(12)),
                        (false, 'M') => months = months.saturating_add(n),
                        (false, 'W') => days += u64::from(n) * 7,
                        (false, 'D') => days += u64::from(n),
                        (true, 'H') => seconds += i64::from(n) * 3600,
                        (true, 'M') => seconds += i64::from(n) * 60,
                        (true, 'S') => seconds += i64::from(n),
                        _ => return Err(invalid(&format!("unknown unit '{unit}'"))),
                    }
                }
            }
        }
        if !digits.is_empty() {
            return Err(invalid("missing unit after number"));
        }
        if in_time && time_units == 0 {
            return Err(invalid("expected a time component after 'T'"));
        }
        if months == 0 && days == 0 && seconds == 0 {
            return Err(invalid("interval must be longer than zero"));
        }

        Ok(Self { spec: spec.to_string(), months, days, seconds })
    }

    /// `instant + self`, saturating at the end of representable time.
    pub fn after(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        instant
            .checked_add_months(Months::new(self.months))
            .and_then(|t| t.checked_add_days(Days::new(self.days)))
            .and_then(|t| t.checked_add_signed(TimeDelta::seconds(self.seconds)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    pub fn spec(&self) -> &str {
        &self.spec
    }
}

impl fmt::Display for KeepInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}

/// Decides which backups survive a tidy-up.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    keep_max: usize,
    keep_intervals: Vec<KeepInterval>,
}

impl RetentionPolicy {
    /// `keep_max == 0` disables the count limit. Intervals are validated here,
    /// not when the policy is applied.
    pub fn new<S: AsRef<str>>(keep_max: usize, keep_intervals: &[S]) -> Result<Self> {
        let mut intervals = keep_intervals
            .iter()
            .map(|s| KeepInterval::parse(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        let reference = Utc::now();
        intervals.sort_by_key(|i| i.after(reference));
        intervals.dedup_by(|a, b| a.after(reference) == b.after(reference));

        Ok(Self { keep_max, keep_intervals: intervals })
    }

    pub fn keep_max(&self) -> usize {
        self.keep_max
    }

    pub fn keep_intervals(&self) -> &[KeepInterval] {
        &self.keep_intervals
    }

    /// Returns the backups to keep, newest first. `latest` is always the first
    /// entry unless `keep_max` is 0 and there are no intervals, in which case
    /// everything is kept.
    pub fn apply(&self, latest: &Backup, all: &[Backup]) -> Vec<Backup> {
        let mut kept: Vec<Backup> = vec![latest.clone()];

        if self.keep_intervals.is_empty() {
            kept.extend(all.iter().filter(|b| *b != latest).cloned());
        } else {
            let reference = latest.created_at();
            let mut older: Vec<&Backup> = all.iter().filter(|b| *b != latest).collect();
            // Oldest first: the first hit in a bucket is the one closest to its boundary.
            older.sort_by_key(|b| b.created_at());

            for interval in &self.keep_intervals {
                let boundary = interval.after(reference);
                let hit = older.iter().find(|b| {
                    let age = reference - b.created_at();
                    reference.checked_add_signed(age).is_some_and(|t| t < boundary)
                });
                if let Some(backup) = hit {
                    if !kept.contains(backup) {
                        kept.push((*backup).clone());
                    }
                }
            }
        }

        kept.sort_by_key(|b| Reverse(b.created_at()));
        if self.keep_max > 0 {
            kept.truncate(self.keep_max);
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(latest: DateTime<Utc>, hours_ago: i64) -> Backup {
        let t = latest - TimeDelta::hours(hours_ago);
        Backup::new(format!("/b/backup__{}.sql.gz", t.format("%Y%m%d%H%M%S"))).unwrap()
    }

    fn latest_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 11, 1, 12, 0, 0).unwrap()
    }

    fn names(backups: &[Backup]) -> Vec<String> {
        backups.iter().map(|b| b.filename().to_string()).collect()
    }

    #[test]
    fn parses_interval_specs() {
        let reference = latest_time();
        let one_day = KeepInterval::parse("1D").unwrap();
        assert_eq!(one_day.after(reference), reference + TimeDelta::days(1));
        assert_eq!(KeepInterval::parse("P2W").unwrap().after(reference), reference + TimeDelta::days(14));
        assert_eq!(
            KeepInterval::parse("1M").unwrap().after(reference),
            Utc.with_ymd_and_hms(2021, 12, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(
            KeepInterval::parse("1Y").unwrap().after(reference),
            Utc.with_ymd_and_hms(2022, 11, 1, 12, 0, 0).unwrap()
        );
        assert_eq!(
            KeepInterval::parse("1DT6H30M").unwrap().after(reference),
            reference + TimeDelta::hours(30) + TimeDelta::minutes(30)
        );
        assert_eq!(one_day.to_string(), "1D");
    }

    #[test]
    fn rejects_malformed_specs_eagerly() {
        for spec in ["", "P", "D", "1", "1X", "1H", "T1D", "0D", "1DT"] {
            let result = RetentionPolicy::new(5, &[spec]);
            assert!(matches!(result, Err(BackupError::RetentionConfig { .. })), "{spec:?} accepted");
        }
    }

    #[test]
    fn sorts_intervals_by_effective_duration() {
        let policy = RetentionPolicy::new(0, &["1M", "1D", "T12H", "7D", "1Y"]).unwrap();
        let specs: Vec<_> = policy.keep_intervals().iter().map(KeepInterval::spec).collect();
        assert_eq!(specs, ["T12H", "1D", "7D", "1M", "1Y"]);
    }

    #[test]
    fn count_cap_keeps_the_newest() {
        let latest = latest_time();
        let all: Vec<Backup> = (0..6).map(|h| at(latest, h)).collect();
        let policy = RetentionPolicy::new(3, &[] as &[&str]).unwrap();

        let kept = policy.apply(&all[0], &all);
        assert_eq!(kept, all[..3].to_vec());

        let policy = RetentionPolicy::new(10, &[] as &[&str]).unwrap();
        assert_eq!(policy.apply(&all[0], &all).len(), 6);
    }

    #[test]
    fn zero_keep_max_without_intervals_keeps_everything() {
        let latest = latest_time();
        let all: Vec<Backup> = (0..4).map(|h| at(latest, h * 100)).collect();
        let policy = RetentionPolicy::new(0, &[] as &[&str]).unwrap();
        assert_eq!(policy.apply(&all[0], &all), all);
    }

    #[test]
    fn interval_buckets_keep_one_backup_each() {
        let latest = latest_time();
        let all = vec![at(latest, 0), at(latest, 2), at(latest, 48), at(latest, 40 * 24)];
        let policy = RetentionPolicy::new(0, &["1D", "7D", "1M"]).unwrap();

        let kept = policy.apply(&all[0], &all);
        assert_eq!(names(&kept), names(&all[..3]));
    }

    #[test]
    fn buckets_prefer_the_backup_closest_to_the_boundary() {
        let latest = latest_time();
        let all = vec![
            at(latest, 0),
            at(latest, 2),
            at(latest, 5),
            at(latest, 48),
            at(latest, 72),
            at(latest, 240),
            at(latest, 960),
        ];
        let policy = RetentionPolicy::new(0, &["1D", "7D", "1M"]).unwrap();

        let kept = policy.apply(&all[0], &all);
        assert_eq!(names(&kept), names(&[all[0].clone(), all[2].clone(), all[4].clone(), all[5].clone()]));
    }

    #[test]
    fn count_cap_wins_over_intervals_but_keeps_latest() {
        let latest = latest_time();
        let all = vec![at(latest, 0), at(latest, 5), at(latest, 72), at(latest, 240)];
        let policy = RetentionPolicy::new(2, &["1D", "7D", "1M"]).unwrap();

        let kept = policy.apply(&all[0], &all);
        assert_eq!(names(&kept), names(&all[..2]));
    }

    #[test]
    fn latest_is_always_kept() {
        let latest = latest_time();
        for keep_max in 1..4 {
            for intervals in [vec![], vec!["1D"], vec!["T1H", "1Y"]] {
                let all: Vec<Backup> = [0, 3, 30, 300].iter().map(|h| at(latest, *h)).collect();
                let policy = RetentionPolicy::new(keep_max, intervals.as_slice()).unwrap();
                let kept = policy.apply(&all[0], &all);
                assert_eq!(kept.first(), Some(&all[0]));
            }
        }
    }
}
