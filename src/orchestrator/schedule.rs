//! Wall-clock schedule computation.
//!
//! Pure so the "sleep until the next configured hour" math is testable
//! without running a scheduler. Callers re-derive the next occurrence from
//! `now` after every batch, so sleep inaccuracy never accumulates into
//! drift.

use chrono::{DateTime, Days, TimeZone};

/// Next occurrence of any of the configured hours-of-day, strictly after
/// `now`, in `now`'s timezone. Hours out of range are ignored; returns `None`
/// when no valid hour remains.
pub fn next_run_at<Tz: TimeZone>(now: &DateTime<Tz>, hours: &[u32]) -> Option<DateTime<Tz>> {
    let mut hours: Vec<u32> = hours.iter().copied().filter(|h| *h < 24).collect();
    hours.sort_unstable();
    hours.dedup();
    if hours.is_empty() {
        return None;
    }

    let tz = now.timezone();
    let today = now.date_naive();

    // Today, tomorrow, and one spare day in case a DST gap swallows an hour.
    for day_offset in 0..3u64 {
        let date = today.checked_add_days(Days::new(day_offset))?;
        for &hour in &hours {
            let Some(naive) = date.and_hms_opt(hour, 0, 0) else {
                continue;
            };
            if let Some(candidate) = tz.from_local_datetime(&naive).earliest() {
                if candidate > *now {
                    return Some(candidate);
                }
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use chrono_tz::Tz;

    fn at(tz: Tz, y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
        tz.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn picks_next_hour_later_today() {
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        let now = at(tz, 2026, 3, 10, 9, 30);
        let next = next_run_at(&now, &[6, 12, 18]).unwrap();
        assert_eq!(next, at(tz, 2026, 3, 10, 12, 0));
    }

    #[test]
    fn wraps_to_first_hour_tomorrow() {
        let tz: Tz = "UTC".parse().unwrap();
        let now = at(tz, 2026, 3, 10, 19, 0);
        let next = next_run_at(&now, &[6, 12, 18]).unwrap();
        assert_eq!(next, at(tz, 2026, 3, 11, 6, 0));
    }

    #[test]
    fn exact_boundary_moves_to_the_following_occurrence() {
        let tz: Tz = "UTC".parse().unwrap();
        let now = at(tz, 2026, 3, 10, 12, 0);
        let next = next_run_at(&now, &[12]).unwrap();
        assert_eq!(next, at(tz, 2026, 3, 11, 12, 0));
    }

    #[test]
    fn unordered_and_duplicate_hours_are_normalized() {
        let tz: Tz = "UTC".parse().unwrap();
        let now = at(tz, 2026, 3, 10, 7, 15);
        let next = next_run_at(&now, &[18, 8, 8, 12]).unwrap();
        assert_eq!(next.hour(), 8);
    }

    #[test]
    fn out_of_range_hours_yield_none() {
        let tz: Tz = "UTC".parse().unwrap();
        let now = at(tz, 2026, 3, 10, 7, 0);
        assert!(next_run_at(&now, &[24, 99]).is_none());
        assert!(next_run_at(&now, &[]).is_none());
    }

    #[test]
    fn dst_gap_does_not_lose_the_schedule() {
        // Europe/Berlin skips 02:00-03:00 on 2026-03-29.
        let tz: Tz = "Europe/Berlin".parse().unwrap();
        let now = at(tz, 2026, 3, 29, 1, 30);
        let next = next_run_at(&now, &[2]).unwrap();
        assert!(next > now);
    }
}
