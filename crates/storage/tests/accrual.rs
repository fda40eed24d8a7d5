mod common;

use common::{at, event, file, money, storage, user};
use diskwala_domain::model::{FileType, Money, ProfileUpdate, ShortCode};
use diskwala_domain::rates::{earnings_per_thousand, EarningPolicy};
use diskwala_domain::settings::SiteSettings;
use diskwala_domain::storage::{AccrualStore, FileStore, UserStore};
use diskwala_storage::SeaOrmStorage;

#[tokio::test]
async fn download_flagged_video_access_earns_once_per_day() {
    let storage = storage().await;
    let owner = user(&storage, "creator", true).await;
    file(&storage, &owner, FileType::Video, "VID00001").await;
    let settings = SiteSettings::default();

    let first = storage
        .record_access(event("VID00001", "1.2.3.4", true, at(1, 10)), &settings)
        .await
        .unwrap()
        .expect("active file");
    assert_eq!(first.file.counters.views, 0);
    assert_eq!(first.file.counters.downloads, 1);
    assert_eq!(first.file.counters.unique_downloads, 1);
    assert_eq!(first.file.download_earnings, money("0.00375"));
    assert_eq!(first.file.earnings, money("0.00375"));
    assert!(first.should_download);

    let owner_after = storage.find_user(owner.id).await.unwrap().unwrap();
    assert_eq!(owner_after.balances.pending_earnings, money("0.00375"));
    assert_eq!(owner_after.balances.total_earnings, money("0.00375"));

    let repeat = storage
        .record_access(event("VID00001", "1.2.3.4", true, at(1, 18)), &settings)
        .await
        .unwrap()
        .expect("active file");
    assert_eq!(repeat.file.counters.downloads, 2);
    assert_eq!(repeat.file.counters.unique_downloads, 1);
    assert_eq!(repeat.file.download_earnings, money("0.00375"));
    assert_eq!(repeat.delta.total_earning(), Money::ZERO);

    let owner_after = storage.find_user(owner.id).await.unwrap().unwrap();
    assert_eq!(owner_after.balances.pending_earnings, money("0.00375"));
}

#[tokio::test]
async fn plain_video_access_counts_nothing() {
    let storage = storage().await;
    let owner = user(&storage, "creator", true).await;
    file(&storage, &owner, FileType::Video, "VID00002").await;

    let outcome = storage
        .record_access(
            event("VID00002", "1.2.3.4", false, at(1, 10)),
            &SiteSettings::default(),
        )
        .await
        .unwrap()
        .expect("active file");
    assert_eq!(outcome.file.counters, Default::default());
    assert_eq!(outcome.file.earnings, Money::ZERO);
    assert!(!outcome.should_download);
}

#[tokio::test]
async fn same_ip_is_unique_once_per_utc_day() {
    let storage = storage().await;
    let owner = user(&storage, "creator", true).await;
    file(&storage, &owner, FileType::Image, "IMG00001").await;
    let settings = SiteSettings::default();

    for hour in [8, 9] {
        storage
            .record_access(event("IMG00001", "5.6.7.8", false, at(1, hour)), &settings)
            .await
            .unwrap();
    }
    let code = ShortCode::parse("IMG00001").unwrap();
    let same_day = storage.find_file_by_short_code(&code).await.unwrap().unwrap();
    assert_eq!(same_day.counters.views, 2);
    assert_eq!(same_day.counters.unique_views, 1);
    assert_eq!(same_day.counters.downloads, 2);
    assert_eq!(same_day.counters.unique_downloads, 1);

    storage
        .record_access(event("IMG00001", "5.6.7.8", false, at(2, 8)), &settings)
        .await
        .unwrap();
    let next_day = storage.find_file_by_short_code(&code).await.unwrap().unwrap();
    assert_eq!(next_day.counters.views, 3);
    assert_eq!(next_day.counters.unique_views, 2);
    assert_eq!(next_day.counters.unique_downloads, 2);
}

#[tokio::test]
async fn file_and_user_ledgers_reconcile() {
    let storage = storage().await;
    let owner = user(&storage, "creator", true).await;
    file(&storage, &owner, FileType::Image, "IMG00002").await;
    file(&storage, &owner, FileType::Other, "DOC00001").await;
    file(&storage, &owner, FileType::Video, "VID00003").await;
    let settings = SiteSettings::default();

    let mut applied = Money::ZERO;
    for (code, ip, download, day) in [
        ("IMG00002", "10.0.0.1", false, 1),
        ("IMG00002", "10.0.0.2", false, 1),
        ("IMG00002", "10.0.0.1", false, 1),
        ("DOC00001", "10.0.0.1", true, 1),
        ("VID00003", "10.0.0.3", true, 1),
        ("VID00003", "10.0.0.3", false, 2),
        ("IMG00002", "10.0.0.1", false, 2),
    ] {
        let outcome = storage
            .record_access(event(code, ip, download, at(day, 12)), &settings)
            .await
            .unwrap()
            .expect("active file");
        applied += outcome.delta.total_earning();
    }

    let files = storage.list_files_for_user(owner.id, false).await.unwrap();
    let file_total: Money = files.iter().map(|file| file.earnings).sum();
    let owner_after = storage.find_user(owner.id).await.unwrap().unwrap();
    assert_eq!(file_total, applied);
    assert_eq!(owner_after.balances.total_earnings, file_total);
    assert_eq!(owner_after.balances.pending_earnings, file_total);
}

#[tokio::test]
async fn unknown_or_inactive_codes_are_not_counted() {
    let storage = storage().await;
    let owner = user(&storage, "creator", true).await;
    let record = file(&storage, &owner, FileType::Image, "IMG00003").await;
    storage
        .update_file(
            record.id,
            Some(owner.id),
            diskwala_domain::model::FileUpdate {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let settings = SiteSettings::default();

    assert!(storage
        .record_access(event("NOPE0000", "1.1.1.1", false, at(1, 1)), &settings)
        .await
        .unwrap()
        .is_none());
    assert!(storage
        .record_access(event("IMG00003", "1.1.1.1", false, at(1, 1)), &settings)
        .await
        .unwrap()
        .is_none());

    let unchanged = storage.find_file(record.id).await.unwrap().unwrap();
    assert_eq!(unchanged.counters.views, 0);
    let report = storage
        .activity_report(owner.id, at(1, 0).date_naive())
        .await
        .unwrap();
    assert!(report.days.iter().all(|(_, day)| day.views == 0));
}

#[tokio::test]
async fn owner_download_preference_gates_should_download() {
    let storage = storage().await;
    let owner = user(&storage, "creator", true).await;
    file(&storage, &owner, FileType::Image, "IMG00004").await;
    storage
        .update_profile(
            owner.id,
            ProfileUpdate {
                allow_download: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let outcome = storage
        .record_access(
            event("IMG00004", "1.1.1.1", true, at(1, 1)),
            &SiteSettings::default(),
        )
        .await
        .unwrap()
        .expect("active file");
    assert!(!outcome.should_download);
    assert_eq!(outcome.file.counters.downloads, 1);
}

#[tokio::test]
async fn per_thousand_policy_accumulates_to_the_cumulative_amount() {
    let storage = storage().await;
    let owner = user(&storage, "creator", true).await;
    file(&storage, &owner, FileType::Image, "IMG00005").await;
    let settings = SiteSettings {
        earning_policy: EarningPolicy::PerThousand,
        ..SiteSettings::default()
    };

    let mut last = None;
    for ip in ["2.0.0.1", "2.0.0.2", "2.0.0.3"] {
        last = storage
            .record_access(event("IMG00005", ip, false, at(3, 9)), &settings)
            .await
            .unwrap();
    }
    let file = last.expect("active file").file;
    let expected = earnings_per_thousand(3, settings.earning_per_1000_views)
        + earnings_per_thousand(3, settings.earning_per_1000_downloads);
    assert_eq!(file.earnings, expected);
    assert_eq!(
        file.download_earnings,
        earnings_per_thousand(3, settings.earning_per_1000_downloads)
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_accesses_accrue_once() {
    let path = std::env::temp_dir().join(format!(
        "diskwala-accrual-{}-{}.db",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    let storage = SeaOrmStorage::builder()
        .database_url(format!("sqlite://{}?mode=rwc", path.display()))
        .max_connections(8)
        .build()
        .await
        .expect("file-backed database");
    let owner = user(&storage, "creator", true).await;
    let record = file(&storage, &owner, FileType::Image, "IMG00006").await;
    let settings = SiteSettings::default();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let storage = storage.clone();
        let settings = settings.clone();
        tasks.push(tokio::spawn(async move {
            storage
                .record_access(event("IMG00006", "3.3.3.3", false, at(4, 8)), &settings)
                .await
        }));
    }
    let mut earned = Money::ZERO;
    let mut earning_accesses = 0;
    for task in tasks {
        let outcome = task
            .await
            .expect("task joins")
            .expect("access recorded")
            .expect("active file");
        if !outcome.delta.total_earning().is_zero() {
            earning_accesses += 1;
            earned += outcome.delta.total_earning();
        }
    }
    assert_eq!(earning_accesses, 1);

    let counted = storage.find_file(record.id).await.unwrap().unwrap();
    assert_eq!(counted.counters.views, 8);
    assert_eq!(counted.counters.unique_views, 1);
    assert_eq!(counted.counters.downloads, 8);
    assert_eq!(counted.counters.unique_downloads, 1);
    assert_eq!(counted.earnings, earned);

    let owner_after = storage.find_user(owner.id).await.unwrap().unwrap();
    assert_eq!(owner_after.balances.pending_earnings, earned);
    assert_eq!(owner_after.balances.total_earnings, earned);

    let report = storage
        .activity_report(owner.id, at(4, 0).date_naive())
        .await
        .unwrap();
    let day = report
        .days
        .iter()
        .find(|(day, _)| *day == at(4, 0).date_naive())
        .map(|(_, activity)| *activity)
        .expect("access day present");
    assert_eq!(day.views, 1);
    assert_eq!(day.downloads, 1);

    drop(storage);
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}
