use serde::Serialize;

use crate::asset::{Asset, AssetStatus};

/// Dashboard counters over the assets visible to an actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetStats {
    pub total_assets: usize,
    pub active_assets: usize,
    pub inactive_assets: usize,
    pub archived_assets: usize,
    pub total_value: f64,
    pub total_residual_value: f64,
}

impl AssetStats {
    pub fn collect<'a>(assets: impl IntoIterator<Item = &'a Asset>) -> Self {
        assets.into_iter().fold(Self::default(), |mut s, a| {
            s.total_assets += 1;
            match a.status {
                AssetStatus::Active => s.active_assets += 1,
                AssetStatus::Inactive => s.inactive_assets += 1,
                AssetStatus::Archived => s.archived_assets += 1,
            }
            s.total_value += a.value.unwrap_or(0.0);
            s.total_residual_value += a.residual_value.unwrap_or(0.0);
            s
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::NewAsset;
    use ami_core::UserId;
    use chrono::Utc;

    #[test]
    fn sums_values_and_counts_statuses() {
        let owner = UserId::new();
        let mk = |value, status| {
            Asset::create(
                NewAsset {
                    name: "a".into(),
                    asset_type: "other".into(),
                    value,
                    status: Some(status),
                    ..Default::default()
                },
                owner,
                Utc::now(),
            )
            .unwrap()
        };
        let assets = vec![
            mk(Some(100.0), AssetStatus::Active),
            mk(None, AssetStatus::Archived),
            mk(Some(50.5), AssetStatus::Active),
        ];
        let stats = AssetStats::collect(&assets);
        assert_eq!(stats.total_assets, 3);
        assert_eq!(stats.active_assets, 2);
        assert_eq!(stats.archived_assets, 1);
        assert!((stats.total_value - 150.5).abs() < 1e-9);
    }
}
