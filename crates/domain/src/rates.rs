//! Pure pricing functions mapping counts and configured rates to money.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};

use crate::model::Money;

/// Decimal places kept by the per-thousand calculations.
pub const EARNINGS_DECIMALS: u32 = 4;

/// Downloads are priced at `DOWNLOAD_MULTIPLIER_NUM / DOWNLOAD_MULTIPLIER_DEN`
/// of the per-view rate.
pub const DOWNLOAD_MULTIPLIER_NUM: i64 = 3;
pub const DOWNLOAD_MULTIPLIER_DEN: i64 = 2;

/// Legacy per-1000 tiers: `(exclusive upper bound on views, rate)`.
const VIEW_TIERS: [(i64, Money); 3] = [
    (10_000, Money::from_micros(2_500)),
    (50_000, Money::from_micros(3_000)),
    (100_000, Money::from_micros(3_500)),
];
const TOP_TIER_RATE: Money = Money::from_micros(4_000);

/// `round(count / 1000 * rate_per_1000, 4)`; zero for non-positive counts.
pub fn earnings_per_thousand(count: i64, rate_per_1000: Money) -> Money {
    if count <= 0 {
        return Money::ZERO;
    }
    rate_per_1000.mul_ratio_dp(count, 1_000, EARNINGS_DECIMALS)
}

/// Per-1000 rate applied by the legacy tiered schedule at `views`.
pub fn tier_rate(views: i64) -> Money {
    VIEW_TIERS
        .iter()
        .find(|(bound, _)| views < *bound)
        .map(|(_, rate)| *rate)
        .unwrap_or(TOP_TIER_RATE)
}

/// Legacy tiered earnings for a cumulative view count.
pub fn earnings_per_view(views: i64) -> Money {
    earnings_per_thousand(views, tier_rate(views))
}

/// Flat price of one counted download.
pub fn download_earning(rate_per_view: Money) -> Money {
    rate_per_view.mul_ratio(DOWNLOAD_MULTIPLIER_NUM, DOWNLOAD_MULTIPLIER_DEN)
}

/// Selects how a counted unique access is priced.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EarningPolicy {
    /// Every unique view earns `earning_per_view`, every unique download 1.5x.
    #[default]
    PerEvent,
    /// Marginal share of `earnings_per_thousand` on unique counts.
    PerThousand,
    /// Marginal share of the legacy tiered schedule on unique views.
    Tiered,
}

/// The rate parameters consumed by the pricing policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateCard {
    pub policy: EarningPolicy,
    pub earning_per_view: Money,
    pub earning_per_1000_views: Money,
    pub earning_per_1000_downloads: Money,
}

impl RateCard {
    /// Price of the unique view that takes the unique count from
    /// `unique_before` to `unique_before + 1`.
    pub fn view_increment(&self, unique_before: i64) -> Money {
        match self.policy {
            EarningPolicy::PerEvent => self.earning_per_view,
            EarningPolicy::PerThousand => marginal(unique_before, |n| {
                earnings_per_thousand(n, self.earning_per_1000_views)
            }),
            EarningPolicy::Tiered => marginal(unique_before, earnings_per_view),
        }
    }

    /// Price of the next unique download, see [`RateCard::view_increment`].
    pub fn download_increment(&self, unique_before: i64) -> Money {
        match self.policy {
            EarningPolicy::PerEvent | EarningPolicy::Tiered => {
                download_earning(self.earning_per_view)
            }
            EarningPolicy::PerThousand => marginal(unique_before, |n| {
                earnings_per_thousand(n, self.earning_per_1000_downloads)
            }),
        }
    }
}

fn marginal(before: i64, cumulative: impl Fn(i64) -> Money) -> Money {
    let before = before.max(0);
    (cumulative(before + 1) - cumulative(before)).max(Money::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(raw: &str) -> Money {
        raw.parse().unwrap()
    }

    fn card(policy: EarningPolicy) -> RateCard {
        RateCard {
            policy,
            earning_per_view: money("0.0025"),
            earning_per_1000_views: money("2.5"),
            earning_per_1000_downloads: money("3.75"),
        }
    }

    #[test]
    fn per_thousand_is_zero_for_empty_counts() {
        assert_eq!(earnings_per_thousand(0, money("1")), Money::ZERO);
        assert_eq!(earnings_per_thousand(-5, money("1")), Money::ZERO);
    }

    #[test]
    fn per_thousand_is_deterministic() {
        let rate = money("1.2345");
        assert_eq!(
            earnings_per_thousand(2_500, rate),
            earnings_per_thousand(2_500, rate)
        );
        assert_eq!(earnings_per_thousand(2_500, money("1")), money("2.5"));
    }

    #[test]
    fn per_thousand_rounds_half_to_even_at_four_places() {
        // 1/1000 * 0.25 = 0.00025 -> 0.0002; 3/1000 * 0.25 = 0.00075 -> 0.0008
        assert_eq!(earnings_per_thousand(1, money("0.25")), money("0.0002"));
        assert_eq!(earnings_per_thousand(3, money("0.25")), money("0.0008"));
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(tier_rate(9_999), money("0.0025"));
        assert_eq!(tier_rate(10_000), money("0.003"));
        assert_eq!(tier_rate(49_999), money("0.003"));
        assert_eq!(tier_rate(50_000), money("0.0035"));
        assert_eq!(tier_rate(100_000), money("0.004"));
        assert_eq!(earnings_per_view(100_000), money("0.4000"));
        assert_eq!(earnings_per_view(9_999), money("0.0250"));
        assert_eq!(earnings_per_view(10_000), money("0.03"));
    }

    #[test]
    fn download_is_one_and_a_half_views() {
        assert_eq!(download_earning(money("0.0025")), money("0.00375"));
    }

    #[test]
    fn per_event_policy_is_flat() {
        let card = card(EarningPolicy::PerEvent);
        assert_eq!(card.view_increment(0), money("0.0025"));
        assert_eq!(card.view_increment(1_000_000), money("0.0025"));
        assert_eq!(card.download_increment(7), money("0.00375"));
    }

    #[test]
    fn per_thousand_increments_telescope_to_the_cumulative_amount() {
        let card = card(EarningPolicy::PerThousand);
        let total: Money = (0..1_234).map(|n| card.view_increment(n)).sum();
        assert_eq!(total, earnings_per_thousand(1_234, money("2.5")));
        let downloads: Money = (0..77).map(|n| card.download_increment(n)).sum();
        assert_eq!(downloads, earnings_per_thousand(77, money("3.75")));
    }

    #[test]
    fn tiered_increment_never_goes_negative() {
        let card = card(EarningPolicy::Tiered);
        for before in [9_998, 9_999, 49_999, 99_999] {
            assert!(!card.view_increment(before).is_negative());
        }
        assert_eq!(card.download_increment(0), money("0.00375"));
    }

    #[test]
    fn policy_parses_from_snake_case() {
        assert_eq!(
            "per_thousand".parse::<EarningPolicy>().unwrap(),
            EarningPolicy::PerThousand
        );
        assert_eq!(EarningPolicy::PerEvent.as_ref(), "per_event");
    }
}
