//! Overdue penalty calculation.
//!
//! Currency is handled as fixed-point [`Decimal`] throughout; binary
//! floats never touch a fee.

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Penalty accrued by a loan that is still out, as of `today`.
///
/// Zero through the due date, then `rate` per whole day overdue, capped
/// at `cap`. Returned loans carry the fee frozen at return time instead;
/// this function is only meaningful for loans in the `Borrowed` state.
pub fn live_penalty(due_date: NaiveDate, today: NaiveDate, rate: Decimal, cap: Decimal) -> Decimal {
    let days_overdue = (today - due_date).num_days();
    if days_overdue <= 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(days_overdue) * rate).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn rate() -> Decimal {
        Decimal::new(500, 2)
    }

    fn cap() -> Decimal {
        Decimal::new(5000, 2)
    }

    fn due() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date")
    }

    #[test]
    fn test_no_penalty_on_or_before_due_date() {
        assert_eq!(live_penalty(due(), due(), rate(), cap()), Decimal::ZERO);
        assert_eq!(
            live_penalty(due(), due() - Duration::days(3), rate(), cap()),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_penalty_accrues_per_day() {
        assert_eq!(
            live_penalty(due(), due() + Duration::days(1), rate(), cap()),
            Decimal::new(500, 2)
        );
        assert_eq!(
            live_penalty(due(), due() + Duration::days(4), rate(), cap()),
            Decimal::new(2000, 2)
        );
    }

    #[test]
    fn test_penalty_caps_at_maximum() {
        // Ten days at 5.00/day hits the 50.00 cap exactly
        assert_eq!(
            live_penalty(due(), due() + Duration::days(10), rate(), cap()),
            Decimal::new(5000, 2)
        );
        assert_eq!(
            live_penalty(due(), due() + Duration::days(365), rate(), cap()),
            Decimal::new(5000, 2)
        );
    }

    #[test]
    fn test_penalty_is_monotonic_in_today() {
        let mut previous = Decimal::ZERO;
        for offset in -5..30 {
            let amount = live_penalty(due(), due() + Duration::days(offset), rate(), cap());
            assert!(amount >= previous, "penalty decreased at day {}", offset);
            assert!(amount <= cap());
            previous = amount;
        }
    }
}
