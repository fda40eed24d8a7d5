#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use diskwala_domain::accrual::AccessEvent;
use diskwala_domain::model::{FileRecord, FileType, Money, NewFile, NewUser, ShortCode, UserRecord};
use diskwala_domain::storage::{FileStore, UserStore};
use diskwala_storage::SeaOrmStorage;

pub async fn storage() -> SeaOrmStorage {
    SeaOrmStorage::connect("sqlite::memory:")
        .await
        .expect("in-memory database")
}

pub async fn user(storage: &SeaOrmStorage, name: &str, email_verified: bool) -> UserRecord {
    storage
        .insert_user(NewUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "$argon2id$placeholder".to_string(),
            is_superuser: false,
            email_verified,
        })
        .await
        .expect("insert user")
}

pub async fn file(
    storage: &SeaOrmStorage,
    owner: &UserRecord,
    file_type: FileType,
    code: &str,
) -> FileRecord {
    storage
        .insert_file(
            NewFile {
                user_id: owner.id,
                title: format!("{code} title"),
                description: String::new(),
                file_type,
                file_url: format!("https://cdn.example.com/{code}"),
                thumbnail_url: format!("https://cdn.example.com/{code}.jpg"),
                allow_download: true,
            },
            ShortCode::parse(code).expect("valid short code"),
        )
        .await
        .expect("insert file")
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub fn event(code: &str, ip: &str, download: bool, occurred_at: DateTime<Utc>) -> AccessEvent {
    AccessEvent {
        short_code: ShortCode::parse(code).expect("valid short code"),
        client_ip: ip.to_string(),
        user_agent: "test-agent".to_string(),
        download_requested: download,
        occurred_at,
    }
}

pub fn money(raw: &str) -> Money {
    raw.parse().expect("valid money literal")
}
