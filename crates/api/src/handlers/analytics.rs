use std::collections::HashMap;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{Datelike, Duration, NaiveDate, Utc};
use diskwala_domain::model::{ActivityReport, Balances, DailyActivity, Money};
use diskwala_domain::storage::FileStore;
use serde::{Deserialize, Serialize};

use crate::auth::authenticate;
use crate::state::AppState;

use super::ApiError;

/// Length of the daily series returned to the dashboard.
pub const SERIES_DAYS: i64 = 30;
/// Decimal places of the estimated earnings figures.
const ESTIMATE_DECIMALS: u32 = 5;

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyticsResponse {
    #[serde(flatten)]
    pub balances: Balances,
    pub total_downloads: i64,
    pub download_earnings: Money,
    pub daily: PeriodStats,
    pub monthly: PeriodStats,
    pub last_30_days: Vec<DayStats>,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub uploaded_files: u64,
    pub views: u64,
    pub downloads: u64,
    pub total_earnings: Money,
}

#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayStats {
    pub date: NaiveDate,
    pub views: u64,
    pub downloads: u64,
    pub earnings: Money,
}

/// `(views + 1.5 * downloads) * rate`, an estimate from counted log rows.
fn estimate(activity: &DailyActivity, rate_per_view: Money) -> Money {
    let half_units = 2 * activity.views as i64 + 3 * activity.downloads as i64;
    rate_per_view.mul_ratio_dp(half_units, 2, ESTIMATE_DECIMALS)
}

fn period(activity: DailyActivity, rate_per_view: Money) -> PeriodStats {
    PeriodStats {
        uploaded_files: activity.uploads,
        views: activity.views,
        downloads: activity.downloads,
        total_earnings: estimate(&activity, rate_per_view),
    }
}

/// First day the dashboard needs data for: the earlier of the series start
/// and the first of the month.
pub fn report_start(today: NaiveDate) -> NaiveDate {
    let series_start = today - Duration::days(SERIES_DAYS - 1);
    let month_start = today.with_day(1).unwrap_or(today);
    series_start.min(month_start)
}

pub fn build_analytics(
    report: ActivityReport,
    balances: Balances,
    today: NaiveDate,
    rate_per_view: Money,
) -> AnalyticsResponse {
    let by_day: HashMap<NaiveDate, DailyActivity> = report.days.into_iter().collect();
    let month_start = today.with_day(1).unwrap_or(today);

    let mut monthly = DailyActivity::default();
    for (day, activity) in &by_day {
        if *day >= month_start && *day <= today {
            monthly.uploads += activity.uploads;
            monthly.views += activity.views;
            monthly.downloads += activity.downloads;
        }
    }
    let daily = by_day.get(&today).copied().unwrap_or_default();

    let series_start = today - Duration::days(SERIES_DAYS - 1);
    let last_30_days = (0..SERIES_DAYS)
        .map(|offset| {
            let date = series_start + Duration::days(offset);
            let activity = by_day.get(&date).copied().unwrap_or_default();
            DayStats {
                date,
                views: activity.views,
                downloads: activity.downloads,
                earnings: estimate(&activity, rate_per_view),
            }
        })
        .collect();

    AnalyticsResponse {
        balances,
        total_downloads: report.total_downloads,
        download_earnings: report.total_download_earnings,
        daily: period(daily, rate_per_view),
        monthly: period(monthly, rate_per_view),
        last_30_days,
    }
}

pub async fn analytics_handler(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    let user = authenticate(&state, &req).await?;
    let settings = state.site_settings().await?;
    let today = Utc::now().date_naive();
    let report = state
        .storage()
        .activity_report(user.id, report_start(today))
        .await?;
    Ok(HttpResponse::Ok().json(build_analytics(
        report,
        user.balances,
        today,
        settings.earning_per_view,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn activity(uploads: u64, views: u64, downloads: u64) -> DailyActivity {
        DailyActivity {
            uploads,
            views,
            downloads,
        }
    }

    #[test]
    fn report_start_covers_month_and_series() {
        assert_eq!(report_start(day(2024, 3, 31)), day(2024, 3, 1));
        assert_eq!(report_start(day(2024, 3, 10)), day(2024, 2, 10));
    }

    #[test]
    fn series_fills_gaps_and_periods_sum() {
        let today = day(2024, 3, 10);
        let report = ActivityReport {
            days: vec![
                (day(2024, 2, 20), activity(1, 4, 0)),
                (day(2024, 3, 2), activity(0, 2, 2)),
                (today, activity(2, 1, 1)),
            ],
            total_downloads: 7,
            total_download_earnings: Money::from_micros(26_250),
        };
        let rate = Money::from_micros(2_500);
        let built = build_analytics(report, Balances::default(), today, rate);

        assert_eq!(built.last_30_days.len(), 30);
        assert_eq!(built.last_30_days[0].date, day(2024, 2, 10));
        assert_eq!(built.last_30_days[29].date, today);
        let feb20 = &built.last_30_days[10];
        assert_eq!(feb20.date, day(2024, 2, 20));
        assert_eq!(feb20.views, 4);
        assert_eq!(feb20.earnings, Money::from_micros(10_000));

        assert_eq!(
            built.daily,
            PeriodStats {
                uploaded_files: 2,
                views: 1,
                downloads: 1,
                total_earnings: Money::from_micros(6_250),
            }
        );
        assert_eq!(built.monthly.uploaded_files, 2);
        assert_eq!(built.monthly.views, 3);
        assert_eq!(built.monthly.downloads, 3);
        // (3 + 4.5) * 0.0025 = 0.01875, rounded half-even to five places
        assert_eq!(built.monthly.total_earnings, Money::from_micros(18_750));
        assert_eq!(built.total_downloads, 7);
    }
}
