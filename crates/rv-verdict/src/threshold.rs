// SPDX-License-Identifier: MIT OR Apache-2.0
//! Named similarity thresholds.
//!
//! Every test names the entry it is judged against and records the value in
//! its result, so two roundtrip variants can use different bars without the
//! difference being hidden in code.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Which entry of the [`ThresholdTable`] a test uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdKey {
    /// Ordinary roundtrip pairing.
    Roundtrip,
    /// OpenAI → Anthropic → OpenAI pairing held to a higher bar.
    StrictRoundtrip,
    /// Two front-end dialects against the same rule.
    TwoPath,
    /// Average of the three-path pair scores.
    ThreePath,
    /// Mean pairwise score of a multi-provider comparison.
    ConsistencyMean,
}

/// Similarity thresholds by test type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ThresholdTable {
    /// See [`ThresholdKey::Roundtrip`].
    pub roundtrip: f64,
    /// See [`ThresholdKey::StrictRoundtrip`].
    pub strict_roundtrip: f64,
    /// See [`ThresholdKey::TwoPath`].
    pub two_path: f64,
    /// See [`ThresholdKey::ThreePath`].
    pub three_path: f64,
    /// See [`ThresholdKey::ConsistencyMean`].
    pub consistency_mean: f64,
    /// A pair is the minority when it scores below `mean - minority_margin`.
    pub minority_margin: f64,
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self {
            roundtrip: 0.7,
            strict_roundtrip: 0.9,
            two_path: 0.7,
            three_path: 0.7,
            consistency_mean: 0.5,
            minority_margin: 0.2,
        }
    }
}

impl ThresholdTable {
    /// Value of `key`.
    #[must_use]
    pub fn get(&self, key: ThresholdKey) -> f64 {
        match key {
            ThresholdKey::Roundtrip => self.roundtrip,
            ThresholdKey::StrictRoundtrip => self.strict_roundtrip,
            ThresholdKey::TwoPath => self.two_path,
            ThresholdKey::ThreePath => self.three_path,
            ThresholdKey::ConsistencyMean => self.consistency_mean,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let t = ThresholdTable::default();
        assert_eq!(t.get(ThresholdKey::Roundtrip), 0.7);
        assert_eq!(t.get(ThresholdKey::StrictRoundtrip), 0.9);
        assert_eq!(t.get(ThresholdKey::ThreePath), 0.7);
        assert_eq!(t.get(ThresholdKey::ConsistencyMean), 0.5);
        assert_eq!(t.minority_margin, 0.2);
    }

    #[test]
    fn partial_table_keeps_other_defaults() {
        let t: ThresholdTable = serde_json::from_str(r#"{"two_path": 0.8}"#).unwrap();
        assert_eq!(t.two_path, 0.8);
        assert_eq!(t.strict_roundtrip, 0.9);
    }
}
