//! Sampling-cadence inference.
//!
//! Consecutive deltas are bucketed into calendar-aware classes. The bucket
//! with the most exact hits is the candidate; deltas that span a whole number
//! of its periods (missing observations) also count toward it, up to a
//! multiplier limit that keeps e.g. weekly gaps from passing as monthly.

use chrono::{Datelike, Months, NaiveDate};
use tracing::{debug, warn};

use crate::domain::{Frequency, FrequencyConfig, FrequencyLabel};

const MIN_POINTS: usize = 3;

/// Infer the cadence of a set of dates. Order and duplicates do not matter.
pub fn infer(dates: &[NaiveDate], config: &FrequencyConfig) -> FrequencyLabel {
    let mut sorted = dates.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let n_points = sorted.len();

    if n_points < MIN_POINTS {
        return FrequencyLabel::irregular(
            n_points,
            format!("need at least {MIN_POINTS} distinct dates, got {n_points}"),
        );
    }

    let steps: Vec<Step> = sorted
        .windows(2)
        .map(|w| Step {
            from: w[0],
            to: w[1],
            days: (w[1] - w[0]).num_days(),
        })
        .collect();
    let total = steps.len();
    let median_delta_days = median(steps.iter().map(|s| s.days).collect());

    let tallies: Vec<Tally> = Frequency::REGULAR
        .iter()
        .map(|&frequency| tally(frequency, &steps, config.max_multiplier))
        .collect();
    for t in &tallies {
        debug!(frequency = ?t.frequency, exact = t.exact, gaps = t.gaps, "cadence tally");
    }

    // Most exact hits, then most total hits, then the finer cadence.
    let dominant = tallies
        .iter()
        .filter(|t| t.exact > 0)
        .fold(None, |best: Option<&Tally>, t| match best {
            Some(b) if (b.exact, b.exact + b.gaps) >= (t.exact, t.exact + t.gaps) => Some(b),
            _ => Some(t),
        });

    let Some(dominant) = dominant else {
        warn!(n_points, ?median_delta_days, "no delta matches a known cadence");
        return FrequencyLabel {
            median_delta_days,
            ..FrequencyLabel::irregular(n_points, "no delta matches a known cadence")
        };
    };

    let hits = dominant.exact + dominant.gaps;
    let share = hits as f64 / total as f64;

    if share >= config.threshold {
        let notes = (dominant.gaps > 0).then(|| {
            format!(
                "{} of {total} deltas span missing {} periods",
                dominant.gaps,
                dominant.frequency.display_name()
            )
        });
        FrequencyLabel {
            frequency: dominant.frequency,
            confidence: share,
            dominant_interval: dominant.frequency.interval(),
            n_points,
            median_delta_days,
            gap_count: dominant.gaps,
            notes,
        }
    } else {
        warn!(
            candidate = ?dominant.frequency,
            share,
            threshold = config.threshold,
            "cadence below threshold"
        );
        FrequencyLabel {
            frequency: Frequency::Irregular,
            confidence: share,
            dominant_interval: dominant.frequency.interval(),
            n_points,
            median_delta_days,
            gap_count: dominant.gaps,
            notes: Some(format!(
                "best cadence {} explains {hits} of {total} deltas, below {:.0}%",
                dominant.frequency.display_name(),
                config.threshold * 100.0
            )),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Step {
    from: NaiveDate,
    to: NaiveDate,
    days: i64,
}

#[derive(Debug, Clone, Copy)]
struct Tally {
    frequency: Frequency,
    exact: usize,
    gaps: usize,
}

fn tally(frequency: Frequency, steps: &[Step], max_multiplier: u32) -> Tally {
    let mut out = Tally {
        frequency,
        exact: 0,
        gaps: 0,
    };
    for step in steps {
        match multiplier(frequency, step, max_multiplier) {
            Some(1) => out.exact += 1,
            Some(_) => out.gaps += 1,
            None => {}
        }
    }
    out
}

/// How many periods of `frequency` the step spans, if it spans a whole number
/// below `max_multiplier`.
fn multiplier(frequency: Frequency, step: &Step, max_multiplier: u32) -> Option<u32> {
    let within = |k: i64| (2..i64::from(max_multiplier)).contains(&k);
    match frequency {
        Frequency::Daily => match step.days {
            1 => Some(1),
            k if within(k) => u32::try_from(k).ok(),
            _ => None,
        },
        Frequency::Weekly => match step.days {
            6..=8 => Some(1),
            d if d % 7 == 0 && within(d / 7) => u32::try_from(d / 7).ok(),
            _ => None,
        },
        Frequency::Monthly => {
            let months = aligned_months(step.from, step.to)?;
            match months {
                1 if (28..=31).contains(&step.days) => Some(1),
                m if within(i64::from(m)) => Some(m),
                _ => None,
            }
        }
        Frequency::Quarterly => {
            if (89..=92).contains(&step.days) {
                return Some(1);
            }
            calendar_multiple(step, 3, &within)
        }
        Frequency::Yearly => {
            if (365..=366).contains(&step.days) {
                return Some(1);
            }
            calendar_multiple(step, 12, &within)
        }
        Frequency::Irregular => None,
    }
}

fn calendar_multiple(step: &Step, period_months: u32, within: &dyn Fn(i64) -> bool) -> Option<u32> {
    let months = aligned_months(step.from, step.to)?;
    if months % period_months != 0 {
        return None;
    }
    let k = months / period_months;
    within(i64::from(k)).then_some(k)
}

/// Whole calendar months from `from` to `to` when both fall on the same
/// anchor day of month, clamped to month end.
///
/// A month-end `from` may itself be clamped (Feb 29 for an anchor of 30), so
/// any later day in `to` up to its own month end is a valid anchor.
fn aligned_months(from: NaiveDate, to: NaiveDate) -> Option<u32> {
    let diff = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    let months = u32::try_from(diff).ok().filter(|m| *m > 0)?;
    let shifted = from.checked_add_months(Months::new(months))?;
    (shifted == to || (is_month_end(from) && to.day() >= shifted.day())).then_some(months)
}

fn is_month_end(date: NaiveDate) -> bool {
    date.succ_opt().is_none_or(|next| next.month() != date.month())
}

fn median(mut values: Vec<i64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 1 {
        values[mid] as f64
    } else {
        (values[mid - 1] + values[mid]) as f64 / 2.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Interval;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn every(start: NaiveDate, step_days: i64, n: usize) -> Vec<NaiveDate> {
        (0..n)
            .map(|i| start + chrono::Duration::days(step_days * i as i64))
            .collect()
    }

    fn monthly(start: NaiveDate, step_months: u32, n: u32) -> Vec<NaiveDate> {
        (0..n)
            .map(|i| start.checked_add_months(Months::new(i * step_months)).unwrap())
            .collect()
    }

    fn run(dates: &[NaiveDate]) -> FrequencyLabel {
        infer(dates, &FrequencyConfig::default())
    }

    #[test]
    fn weekly_exact() {
        let label = run(&every(ymd(2024, 1, 1), 7, 4));
        assert_eq!(label.frequency, Frequency::Weekly);
        assert_eq!(label.confidence, 1.0);
        assert_eq!(label.dominant_interval, Some(Interval::Days(7)));
        assert_eq!(label.median_delta_days, Some(7.0));
    }

    #[test]
    fn daily() {
        let label = run(&every(ymd(2024, 1, 1), 1, 20));
        assert_eq!(label.frequency, Frequency::Daily);
        assert_eq!(label.confidence, 1.0);
    }

    #[test]
    fn monthly_first_of_month() {
        let label = run(&monthly(ymd(2024, 1, 1), 1, 12));
        assert_eq!(label.frequency, Frequency::Monthly);
        assert_eq!(label.confidence, 1.0);
    }

    #[test]
    fn monthly_month_ends() {
        let dates = [ymd(2024, 1, 31), ymd(2024, 2, 29), ymd(2024, 3, 31), ymd(2024, 4, 30)];
        let label = run(&dates);
        assert_eq!(label.frequency, Frequency::Monthly);
        assert_eq!(label.confidence, 1.0);
    }

    #[test]
    fn monthly_anchor_survives_february_clamp() {
        let dates = [ymd(2024, 1, 30), ymd(2024, 2, 29), ymd(2024, 3, 30), ymd(2024, 4, 30)];
        let label = run(&dates);
        assert_eq!(label.frequency, Frequency::Monthly);
        assert_eq!(label.confidence, 1.0);
    }

    #[test]
    fn month_end_then_earlier_day_is_not_aligned() {
        assert_eq!(aligned_months(ymd(2024, 2, 29), ymd(2024, 3, 15)), None);
        assert_eq!(aligned_months(ymd(2024, 1, 31), ymd(2024, 3, 1)), None);
        assert_eq!(aligned_months(ymd(2023, 2, 28), ymd(2023, 3, 29)), Some(1));
    }

    #[test]
    fn quarterly_beats_monthly_multiples() {
        let label = run(&monthly(ymd(2023, 1, 1), 3, 8));
        assert_eq!(label.frequency, Frequency::Quarterly);
        assert_eq!(label.gap_count, 0);
    }

    #[test]
    fn yearly() {
        let label = run(&monthly(ymd(2010, 1, 1), 12, 10));
        assert_eq!(label.frequency, Frequency::Yearly);
        assert_eq!(label.confidence, 1.0);
    }

    #[test]
    fn weekly_gaps_count_through_multiplier() {
        let mut dates = every(ymd(2024, 1, 1), 7, 6);
        // Drop two consecutive weeks: one 21-day delta.
        dates.remove(3);
        dates.remove(2);
        let label = run(&dates);
        assert_eq!(label.frequency, Frequency::Weekly);
        assert_eq!(label.confidence, 1.0);
        assert_eq!(label.gap_count, 1);
        assert!(label.notes.is_some());
    }

    #[test]
    fn multiplier_limit_rejects_large_gaps() {
        // 7-day steps plus one 42-day jump (multiplier 6, at the limit).
        let mut dates = every(ymd(2024, 1, 1), 7, 3);
        dates.push(ymd(2024, 1, 15) + chrono::Duration::days(42));
        let label = run(&dates);
        assert_eq!(label.frequency, Frequency::Irregular);
        assert!((label.confidence - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn too_few_points() {
        let label = run(&[ymd(2024, 1, 1), ymd(2024, 2, 1)]);
        assert_eq!(label.frequency, Frequency::Irregular);
        assert_eq!(label.confidence, 0.0);
        assert_eq!(label.n_points, 2);
    }

    #[test]
    fn duplicates_and_order_ignored() {
        let mut dates = every(ymd(2024, 1, 1), 7, 5);
        dates.reverse();
        dates.push(ymd(2024, 1, 8));
        let label = run(&dates);
        assert_eq!(label.frequency, Frequency::Weekly);
        assert_eq!(label.n_points, 5);
    }

    #[test]
    fn inconsistent_deltas_are_irregular() {
        let dates = [
            ymd(2024, 1, 1),
            ymd(2024, 1, 2),
            ymd(2024, 1, 10),
            ymd(2024, 1, 11),
            ymd(2024, 2, 20),
            ymd(2024, 2, 21),
        ];
        let label = run(&dates);
        assert_eq!(label.frequency, Frequency::Irregular);
        assert!((label.confidence - 0.6).abs() < 1e-12);
    }

    #[test]
    fn thirty_day_steps_are_not_monthly() {
        let label = run(&every(ymd(2024, 1, 1), 30, 6));
        assert_ne!(label.frequency, Frequency::Monthly);
    }
}
