use tracing::info;

use crate::aggregate::CanonicalDataset;
use crate::pairing::{PairedMatch, PairingOptions, pair_matches};
use crate::rolling::{build_rolling_features, canonicalize_names};
use crate::team_names::TeamNames;

#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub rolling_rows: usize,
    pub pairs: Vec<PairedMatch>,
}

/// Canonical dataset → canonical names → rolling rows → paired fixtures.
pub fn build_feature_table(
    dataset: &CanonicalDataset,
    names: &TeamNames,
    options: PairingOptions,
) -> FeatureTable {
    let named = canonicalize_names(dataset, names);
    let rolling = build_rolling_features(&named);
    let pairs = pair_matches(&rolling, options);
    info!(
        records = dataset.len(),
        rolling = rolling.len(),
        pairs = pairs.len(),
        "built feature table"
    );
    FeatureTable {
        rolling_rows: rolling.len(),
        pairs,
    }
}
