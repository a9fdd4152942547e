//! Fractional ordering keys for cards within a column.
//!
//! A new key is always placed strictly between its neighbors (or past the
//! ends), so inserting one card never rewrites the keys of the others. The
//! same [`compute_position`] runs in the optimistic client path and in the
//! server's single-task resolver; the batch write path trusts the client's
//! value because both sides share this function.
//!
//! # Precision
//! Keys are `f64`. Repeated insertion at the same boundary halves the gap each
//! time, and a leading key of `0` cannot be halved below itself. No
//! renumbering pass exists; when a computed key fails to separate from its
//! neighbors a warning is logged and the tie falls back to id ordering.

use serde::{Deserialize, Deserializer};

/// Gap left after the last card when appending.
pub const END_GAP: f64 = 10.0;

/// Compute the key for a card inserted at `target_index` among `siblings`.
///
/// `siblings` must exclude the card being placed and be in display
/// (ascending) order. Indexes past the end append.
pub fn compute_position(siblings: &[f64], target_index: usize) -> f64 {
    let Some((&first, &last)) = siblings.first().zip(siblings.last()) else {
        return 0.0;
    };

    let position = if target_index == 0 {
        first / 2.0
    } else if target_index >= siblings.len() {
        last + END_GAP
    } else {
        let before = siblings[target_index - 1];
        let after = siblings[target_index];
        before + (after - before) / 2.0
    };

    if !separates(siblings, target_index, position) {
        tracing::warn!(
            target_index,
            position,
            siblings = siblings.len(),
            "Position does not separate from its neighbors; ordering falls back to id"
        );
    }

    position
}

/// Whether `position` lies strictly inside its bounding neighbors.
///
/// The leading slot is only bounded above; the trailing slot only below.
pub fn separates(siblings: &[f64], target_index: usize, position: f64) -> bool {
    if !position.is_finite() {
        return false;
    }
    if siblings.is_empty() {
        return true;
    }
    let index = target_index.min(siblings.len());
    let above_lower = index == 0 || siblings[index - 1] < position;
    let below_upper = index == siblings.len() || position < siblings[index];
    above_lower && below_upper
}

/// A position as it may appear on the wire.
///
/// Document stores can hand back arbitrary-precision decimals boxed as
/// `{"$numberDecimal": "12.5"}`. Everything past deserialization sees `f64`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum WirePosition {
    Plain(f64),
    Boxed {
        #[serde(rename = "$numberDecimal")]
        number_decimal: String,
    },
}

impl WirePosition {
    /// Unbox to a plain number.
    pub fn normalize(&self) -> Result<f64, std::num::ParseFloatError> {
        match self {
            WirePosition::Plain(value) => Ok(*value),
            WirePosition::Boxed { number_decimal } => number_decimal.trim().parse(),
        }
    }
}

/// Deserialize a position field, unboxing decimals. `null` reads as `0`.
pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserialize_optional(deserializer)?.unwrap_or(0.0))
}

/// Deserialize an optional position field, unboxing decimals.
pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<WirePosition>::deserialize(deserializer)?;
    raw.map(|wire| wire.normalize().map_err(serde::de::Error::custom))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_examples() {
        let siblings = [10.0, 20.0];
        assert_eq!(compute_position(&siblings, 1), 15.0);
        assert_eq!(compute_position(&siblings, 0), 5.0);
        assert_eq!(compute_position(&siblings, 2), 30.0);
    }

    #[test]
    fn empty_column_starts_at_zero() {
        assert_eq!(compute_position(&[], 0), 0.0);
        assert_eq!(compute_position(&[], 7), 0.0);
    }

    #[test]
    fn index_past_end_appends() {
        assert_eq!(compute_position(&[1.0, 2.0, 3.0], 99), 13.0);
    }

    #[test]
    fn every_slot_lands_strictly_between_neighbors() {
        let siblings = [0.5, 3.0, 3.25, 40.0, 41.0, 1000.0];
        for index in 0..=siblings.len() {
            let position = compute_position(&siblings, index);
            assert!(
                separates(&siblings, index, position),
                "index {index} produced {position}"
            );
        }
    }

    #[test]
    fn repeated_inserts_never_touch_existing_keys() {
        let mut column = vec![10.0, 20.0, 30.0];
        let original = column.clone();
        // Keep inserting right after the first card.
        for _ in 0..30 {
            let position = compute_position(&column, 1);
            assert!(separates(&column, 1, position));
            column.insert(1, position);
        }
        assert_eq!(column[0], original[0]);
        assert_eq!(&column[column.len() - 2..], &original[1..]);
        assert!(column.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn zero_leading_key_cannot_be_halved() {
        let siblings = [0.0, 10.0];
        let position = compute_position(&siblings, 0);
        assert_eq!(position, 0.0);
        assert!(!separates(&siblings, 0, position));
    }

    #[test]
    fn boxed_and_plain_positions_normalize() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(default, deserialize_with = "deserialize")]
            position: f64,
            #[serde(default, deserialize_with = "deserialize_optional")]
            maybe: Option<f64>,
        }

        let row: Row =
            serde_json::from_str(r#"{"position": {"$numberDecimal": "7.25"}, "maybe": 3}"#)
                .unwrap();
        assert_eq!(row.position, 7.25);
        assert_eq!(row.maybe, Some(3.0));

        let row: Row = serde_json::from_str(r#"{"position": null}"#).unwrap();
        assert_eq!(row.position, 0.0);
        assert_eq!(row.maybe, None);

        assert!(serde_json::from_str::<Row>(r#"{"position": {"$numberDecimal": "abc"}}"#).is_err());
    }
}
