//! Personal record engine.
//!
//! Every logged set is a candidate for three independent bests per user and
//! exercise: heaviest weight, most reps, and largest volume (weight x reps).
//! A stored best only moves up, and only on a strict improvement, so applying
//! the same sets in any order, any number of times, converges on the same
//! rows. Records are never retracted when a set is later removed or edited.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::SqliteConnection;
use tracing::{debug, info, instrument};

use crate::db;
use crate::error::AppError;
use crate::models::{PrType, SetLog};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Improved,
    Unchanged,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrUpdate {
    pub changes: Vec<(PrType, Outcome)>,
}

impl PrUpdate {
    #[cfg(test)]
    pub fn outcome(&self, pr_type: PrType) -> Option<Outcome> {
        self.changes
            .iter()
            .find(|(t, _)| *t == pr_type)
            .map(|(_, outcome)| *outcome)
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn new_records(&self) -> impl Iterator<Item = PrType> + '_ {
        self.changes
            .iter()
            .filter(|(_, outcome)| *outcome != Outcome::Unchanged)
            .map(|(pr_type, _)| *pr_type)
    }
}

pub fn candidate(pr_type: PrType, weight: Decimal, reps: i64) -> Result<Decimal, AppError> {
    match pr_type {
        PrType::MaxWeight => Ok(weight),
        PrType::MaxReps => Ok(Decimal::from(reps)),
        PrType::MaxVolume => weight.checked_mul(Decimal::from(reps)).ok_or_else(|| {
            AppError::Validation(format!(
                "Volume of {} kg for {} reps is out of range",
                weight, reps
            ))
        }),
    }
}

/// Ties are not records.
pub fn decide(stored: Option<Decimal>, candidate: Decimal) -> Outcome {
    match stored {
        None => Outcome::Created,
        Some(best) if candidate > best => Outcome::Improved,
        Some(_) => Outcome::Unchanged,
    }
}

/// Folds `set_log` into the user's records for its exercise.
///
/// Must run on the transaction that inserted `set_log`: that insert already
/// holds SQLite's write lock, so the stored values read here cannot change
/// underneath the comparison.
#[instrument(skip(conn, set_log), fields(set_log_id = set_log.id, exercise_id = set_log.exercise_id))]
pub async fn apply_to_pr(conn: &mut SqliteConnection, set_log: &SetLog) -> Result<PrUpdate, AppError> {
    let (weight, reps) = match (set_log.weight_kg, set_log.reps_actual) {
        (Some(weight), Some(reps)) => (weight, reps),
        _ => {
            debug!("Set has no weight or no reps, skipping personal records");
            return Ok(PrUpdate::default());
        }
    };

    let user_id = db::session_owner(conn, set_log.session_id).await?;
    let now = Utc::now();
    let mut update = PrUpdate::default();

    for pr_type in PrType::ALL {
        let value = candidate(pr_type, weight, reps)?;
        let stored =
            db::find_personal_record(conn, user_id, set_log.exercise_id, pr_type).await?;

        let outcome = match (decide(stored.as_ref().map(|r| r.value), value), stored) {
            (Outcome::Created, _) => {
                db::insert_personal_record(
                    conn,
                    user_id,
                    set_log.exercise_id,
                    pr_type,
                    value,
                    set_log.id,
                    now,
                )
                .await?;
                Outcome::Created
            }
            (Outcome::Improved, Some(record)) => {
                if db::raise_personal_record(conn, record.id, value, set_log.id, now).await? {
                    Outcome::Improved
                } else {
                    Outcome::Unchanged
                }
            }
            _ => Outcome::Unchanged,
        };

        if outcome != Outcome::Unchanged {
            info!(user_id, pr_type = %pr_type, value = %value, "New personal record");
        }
        update.changes.push((pr_type, outcome));
    }

    Ok(update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn kg(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    #[test]
    fn test_candidates_per_type() {
        assert_eq!(candidate(PrType::MaxWeight, kg("100.00"), 5).unwrap(), kg("100.00"));
        assert_eq!(candidate(PrType::MaxReps, kg("100.00"), 5).unwrap(), Decimal::from(5));
        assert_eq!(candidate(PrType::MaxVolume, kg("100.00"), 5).unwrap(), kg("500.00"));
        assert_eq!(candidate(PrType::MaxVolume, kg("90.00"), 8).unwrap(), kg("720.00"));
    }

    #[test]
    fn test_volume_overflow_is_a_validation_error() {
        let result = candidate(
            PrType::MaxVolume,
            Decimal::from(1_000_000_000_000i64),
            90_000_000_000_000_000,
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_decide_is_strict() {
        assert_eq!(decide(None, kg("0")), Outcome::Created);
        assert_eq!(decide(Some(kg("100.00")), kg("100.01")), Outcome::Improved);
        assert_eq!(decide(Some(kg("100.00")), kg("100")), Outcome::Unchanged);
        assert_eq!(decide(Some(kg("100.00")), kg("99.99")), Outcome::Unchanged);
    }

    #[test]
    fn test_pr_update_reports_new_records() {
        let update = PrUpdate {
            changes: vec![
                (PrType::MaxWeight, Outcome::Unchanged),
                (PrType::MaxReps, Outcome::Improved),
                (PrType::MaxVolume, Outcome::Created),
            ],
        };

        assert_eq!(update.outcome(PrType::MaxReps), Some(Outcome::Improved));
        assert_eq!(
            update.new_records().collect::<Vec<_>>(),
            vec![PrType::MaxReps, PrType::MaxVolume]
        );
    }

    // Replays the stored-value state machine the way apply_to_pr drives it.
    fn replay(values: &[i64]) -> Option<Decimal> {
        values.iter().fold(None, |stored, &hundredths| {
            let value = Decimal::new(hundredths, 2);
            match decide(stored, value) {
                Outcome::Created | Outcome::Improved => Some(value),
                Outcome::Unchanged => stored,
            }
        })
    }

    proptest! {
        /// Property: the stored best is the maximum candidate, whatever the order
        #[test]
        fn prop_best_is_max_in_any_order(
            mut values in prop::collection::vec(0i64..1_000_000, 1..40),
            seed in any::<u64>(),
        ) {
            let expected = values.iter().max().map(|&v| Decimal::new(v, 2));
            prop_assert_eq!(replay(&values), expected);

            // Rotate and reverse to get other orderings of the same sets
            let len = values.len();
            values.rotate_left((seed as usize) % len);
            prop_assert_eq!(replay(&values), expected);
            values.reverse();
            prop_assert_eq!(replay(&values), expected);
        }

        /// Property: replaying a sequence twice changes nothing
        #[test]
        fn prop_replay_is_idempotent(values in prop::collection::vec(0i64..1_000_000, 1..40)) {
            let once = replay(&values);
            let mut twice = values.clone();
            twice.extend_from_slice(&values);
            prop_assert_eq!(replay(&twice), once);
        }
    }
}
