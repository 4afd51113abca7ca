//! Recurring-schedule to calendar expansion.
//!
//! A teacher's weekly slots are projected onto concrete dates to answer
//! "how many classes should have happened in this range".

use chrono::{Datelike, Days, NaiveDate};
use db::models::schedule_slot::{DayOfWeek, Model as Slot};
use serde::Serialize;

/// Half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// An inverted range is normalised to the empty range at `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// The whole calendar month. `None` for an invalid month or year.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self::new(start, end))
    }

    /// The `days` dates immediately before `end`, starting no earlier than
    /// the first representable date.
    pub fn trailing(end: NaiveDate, days: u32) -> Self {
        let start = end
            .checked_sub_days(Days::new(days.into()))
            .unwrap_or(NaiveDate::MIN);
        Self::new(start, end)
    }

    /// Ends the range no later than `limit`.
    pub fn clipped_to(self, limit: NaiveDate) -> Self {
        Self::new(self.start, self.end.min(limit))
    }

    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days().max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.num_days() == 0
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d < self.end)
    }
}

/// One date on which a slot was due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub date: NaiveDate,
    pub slot_id: i64,
}

/// Every (date, slot) pair in `range` whose weekday matches the slot's day.
///
/// Slots sharing a day are all emitted; nothing is deduplicated.
pub fn expected_occurrences(slots: &[Slot], range: DateRange) -> Vec<Occurrence> {
    if slots.is_empty() {
        return Vec::new();
    }

    let mut occurrences = Vec::new();
    for date in range.days() {
        let Some(day) = DayOfWeek::from_weekday(date.weekday()) else {
            continue;
        };
        occurrences.extend(
            slots
                .iter()
                .filter(|slot| slot.day == day)
                .map(|slot| Occurrence {
                    date,
                    slot_id: slot.id,
                }),
        );
    }
    occurrences
}

/// Number of scheduled classes in `range`.
pub fn expected_count(slots: &[Slot], range: DateRange) -> u32 {
    if slots.is_empty() || range.is_empty() {
        return 0;
    }

    let mut per_day = [0u32; 7];
    for slot in slots {
        per_day[slot.day.weekday().num_days_from_monday() as usize] += 1;
    }
    range
        .days()
        .map(|date| per_day[date.weekday().num_days_from_monday() as usize])
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn slot(id: i64, day: DayOfWeek) -> Slot {
        Slot {
            id,
            teacher_id: 1,
            day,
            subject: "Chemistry".into(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn empty_range_or_schedule_yields_nothing() {
        let slots = vec![slot(1, DayOfWeek::Mon)];
        let empty = DateRange::new(date(2025, 3, 3), date(2025, 3, 3));
        assert_eq!(expected_count(&slots, empty), 0);
        assert!(expected_occurrences(&slots, empty).is_empty());

        let march = DateRange::month(2025, 3).unwrap();
        assert_eq!(expected_count(&[], march), 0);
    }

    #[test]
    fn end_date_is_exclusive() {
        // 2025-03-03 is a Monday.
        let slots = vec![slot(1, DayOfWeek::Mon)];
        let one_week = DateRange::new(date(2025, 3, 3), date(2025, 3, 10));
        assert_eq!(expected_count(&slots, one_week), 1);

        let eight_days = DateRange::new(date(2025, 3, 3), date(2025, 3, 11));
        assert_eq!(expected_count(&slots, eight_days), 2);
    }

    #[test]
    fn duplicate_slots_on_a_day_each_count() {
        let slots = vec![
            slot(1, DayOfWeek::Tue),
            slot(2, DayOfWeek::Tue),
            slot(3, DayOfWeek::Sat),
        ];
        let week = DateRange::new(date(2025, 3, 3), date(2025, 3, 10));
        let occ = expected_occurrences(&slots, week);

        assert_eq!(occ.len(), 3);
        assert_eq!(occ[0], Occurrence { date: date(2025, 3, 4), slot_id: 1 });
        assert_eq!(occ[1], Occurrence { date: date(2025, 3, 4), slot_id: 2 });
        assert_eq!(occ[2], Occurrence { date: date(2025, 3, 8), slot_id: 3 });
        assert_eq!(expected_count(&slots, week), 3);
    }

    #[test]
    fn ranges_across_month_boundaries_use_the_same_slots() {
        // Jan 27 2025 (Mon) .. Feb 10 2025 (Mon) exclusive: two full weeks.
        let slots = vec![slot(1, DayOfWeek::Fri), slot(2, DayOfWeek::Mon)];
        let range = DateRange::new(date(2025, 1, 27), date(2025, 2, 10));
        assert_eq!(expected_count(&slots, range), 4);
        assert_eq!(expected_occurrences(&slots, range).len(), 4);
    }

    #[test]
    fn month_and_trailing_constructors() {
        let dec = DateRange::month(2024, 12).unwrap();
        assert_eq!(dec.end, date(2025, 1, 1));
        assert_eq!(dec.num_days(), 31);
        assert!(DateRange::month(2024, 13).is_none());

        let trailing = DateRange::trailing(date(2025, 3, 15), 14);
        assert_eq!(trailing.start, date(2025, 3, 1));
        assert!(!trailing.contains(date(2025, 3, 15)));
        assert!(trailing.contains(date(2025, 3, 1)));

        let huge = DateRange::trailing(date(2025, 3, 15), u32::MAX);
        assert_eq!(huge.start, NaiveDate::MIN);
        assert_eq!(huge.end, date(2025, 3, 15));

        let inverted = DateRange::new(date(2025, 3, 10), date(2025, 3, 1));
        assert!(inverted.is_empty());
    }
}
