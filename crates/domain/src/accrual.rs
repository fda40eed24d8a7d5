//! Classification and pricing of a single public access event.
//!
//! The storage layer owns the transaction; this module decides what a given
//! access counts as and how much it earns once the de-duplication ledger has
//! answered whether the IP is new for the day.

use chrono::{DateTime, NaiveDate, Utc};

use crate::model::{FileCounters, FileType, Money, ShortCode};
use crate::rates::RateCard;

/// One public hit on `/f/{short_code}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessEvent {
    pub short_code: ShortCode,
    pub client_ip: String,
    pub user_agent: String,
    pub download_requested: bool,
    pub occurred_at: DateTime<Utc>,
}

impl AccessEvent {
    /// UTC calendar day used as the de-duplication bucket.
    pub fn access_day(&self) -> NaiveDate {
        self.occurred_at.date_naive()
    }
}

/// What an access is eligible to count as, before de-duplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPlan {
    pub count_view: bool,
    pub is_download_action: bool,
}

impl AccessPlan {
    /// Views are counted for non-video files only; anything that is not a
    /// video, or that explicitly asks for the download, is a download.
    pub fn classify(file_type: FileType, download_requested: bool) -> Self {
        Self {
            count_view: !file_type.is_video(),
            is_download_action: !file_type.is_video() || download_requested,
        }
    }
}

/// Answers from the de-duplication ledger for this event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FirstAccess {
    pub view: bool,
    pub download: bool,
}

/// Counter and money increments produced by one access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccrualDelta {
    pub views: i64,
    pub unique_views: i64,
    pub downloads: i64,
    pub unique_downloads: i64,
    pub view_earning: Money,
    pub download_earning: Money,
}

impl AccrualDelta {
    /// Raw counters always move for eligible kinds; unique counters and
    /// earnings move only when the ledger reports a first access today.
    pub fn compute(
        plan: AccessPlan,
        first: FirstAccess,
        before: &FileCounters,
        rates: &RateCard,
    ) -> Self {
        let mut delta = AccrualDelta::default();

        if plan.count_view {
            delta.views = 1;
            if first.view {
                delta.unique_views = 1;
                delta.view_earning = rates.view_increment(before.unique_views);
            }
        }

        if plan.is_download_action {
            delta.downloads = 1;
            if first.download {
                delta.unique_downloads = 1;
                delta.download_earning = rates.download_increment(before.unique_downloads);
            }
        }

        delta
    }

    pub fn total_earning(&self) -> Money {
        self.view_earning + self.download_earning
    }

    pub fn is_empty(&self) -> bool {
        self.views == 0 && self.downloads == 0
    }

    pub fn apply_to(&self, counters: &mut FileCounters) {
        counters.views += self.views;
        counters.unique_views += self.unique_views;
        counters.downloads += self.downloads;
        counters.unique_downloads += self.unique_downloads;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::EarningPolicy;

    fn rates() -> RateCard {
        RateCard {
            policy: EarningPolicy::PerEvent,
            earning_per_view: Money::from_micros(2_500),
            earning_per_1000_views: Money::from_micros(2_500_000),
            earning_per_1000_downloads: Money::from_micros(3_750_000),
        }
    }

    #[test]
    fn video_counts_no_view_and_downloads_only_on_request() {
        let plain = AccessPlan::classify(FileType::Video, false);
        assert!(!plain.count_view);
        assert!(!plain.is_download_action);

        let flagged = AccessPlan::classify(FileType::Video, true);
        assert!(!flagged.count_view);
        assert!(flagged.is_download_action);
    }

    #[test]
    fn non_video_counts_view_and_download() {
        for file_type in [FileType::Image, FileType::Other] {
            let plan = AccessPlan::classify(file_type, false);
            assert!(plan.count_view);
            assert!(plan.is_download_action);
        }
    }

    #[test]
    fn first_access_earns_both_components() {
        let plan = AccessPlan::classify(FileType::Image, false);
        let first = FirstAccess {
            view: true,
            download: true,
        };
        let delta = AccrualDelta::compute(plan, first, &FileCounters::default(), &rates());
        assert_eq!(delta.views, 1);
        assert_eq!(delta.unique_views, 1);
        assert_eq!(delta.downloads, 1);
        assert_eq!(delta.unique_downloads, 1);
        assert_eq!(delta.view_earning, Money::from_micros(2_500));
        assert_eq!(delta.download_earning, Money::from_micros(3_750));
        assert_eq!(delta.total_earning(), Money::from_micros(6_250));
    }

    #[test]
    fn repeat_access_moves_raw_counters_only() {
        let plan = AccessPlan::classify(FileType::Other, false);
        let delta = AccrualDelta::compute(
            plan,
            FirstAccess::default(),
            &FileCounters::default(),
            &rates(),
        );
        assert_eq!(delta.views, 1);
        assert_eq!(delta.unique_views, 0);
        assert_eq!(delta.downloads, 1);
        assert_eq!(delta.unique_downloads, 0);
        assert_eq!(delta.total_earning(), Money::ZERO);
    }

    #[test]
    fn plain_video_access_is_a_no_op() {
        let plan = AccessPlan::classify(FileType::Video, false);
        let delta = AccrualDelta::compute(
            plan,
            FirstAccess {
                view: true,
                download: true,
            },
            &FileCounters::default(),
            &rates(),
        );
        assert!(delta.is_empty());
        assert_eq!(delta.total_earning(), Money::ZERO);
    }

    #[test]
    fn access_day_is_the_utc_date() {
        let occurred_at = DateTime::parse_from_rfc3339("2024-03-01T23:30:00-02:00")
            .unwrap()
            .with_timezone(&Utc);
        let event = AccessEvent {
            short_code: ShortCode::new_unchecked("AB12CD34"),
            client_ip: "1.2.3.4".into(),
            user_agent: String::new(),
            download_requested: false,
            occurred_at,
        };
        assert_eq!(
            event.access_day(),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );
    }
}
