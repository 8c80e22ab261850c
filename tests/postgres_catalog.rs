//! Live `PostgreSQL` Catalog Tests
//!
//! These tests require a running `PostgreSQL` instance reachable with
//! `postgres`/`postgres` on localhost:5432. Run them with:
//! cargo test --features postgres -- --ignored

#![cfg(feature = "postgres")]

use folio::catalog;
use folio::{
    bootstrap, BookDraft, Credentials, FolioConfig, Gateway, Identifier, NoticeLog, NoticeSink,
    Role,
};
use pretty_assertions::assert_eq;

fn credentials() -> Credentials {
    Credentials::new("postgres", "postgres", "postgres")
}

fn config() -> FolioConfig {
    FolioConfig { admin_username: Some("postgres".to_string()), ..FolioConfig::default() }
}

fn unique_table(prefix: &str) -> Identifier {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    Identifier::new(format!("{prefix}_{nanos}")).unwrap()
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_bootstrap_grants_configured_admin() {
    let mut session = bootstrap(&credentials(), &config()).await.unwrap();
    assert_eq!(session.role, Role::Administrator);
    session.gateway.close().await.unwrap();
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_book_lifecycle_with_hostile_values() {
    let mut session = bootstrap(&credentials(), &config()).await.unwrap();
    let gateway = &session.gateway;
    let books = unique_table("folio_books");
    let hostile = "'; DROP TABLE books; -- 100%_";

    catalog::create_table(gateway, NoticeSink::Discard, &books).await.unwrap();
    catalog::add_book(gateway, NoticeSink::Discard, &books, &BookDraft::new(hostile, "O'Neil", "P", 2020))
        .await
        .unwrap();
    catalog::add_book(gateway, NoticeSink::Discard, &books, &BookDraft::new("Plain", "A", "P", 2021))
        .await
        .unwrap();

    let found = catalog::search_books_by_title(gateway, NoticeSink::Discard, &books, "100%_")
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, hostile);
    assert_eq!(found[0].author, "O'Neil");

    let all = catalog::list_books(gateway, NoticeSink::Discard, &books).await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[0].id < all[1].id);

    catalog::update_book(gateway, NoticeSink::Discard, &books, -1, &BookDraft::new("x", "x", "x", 1))
        .await
        .unwrap();
    catalog::delete_book_by_title(gateway, NoticeSink::Discard, &books, hostile).await.unwrap();
    let all = catalog::list_books(gateway, NoticeSink::Discard, &books).await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].title, "Plain");

    catalog::clear_table(gateway, NoticeSink::Discard, &books).await.unwrap();
    assert!(catalog::list_books(gateway, NoticeSink::Discard, &books).await.unwrap().is_empty());

    session.gateway.close().await.unwrap();
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_create_table_reports_existing_table_in_notice() {
    let mut session = bootstrap(&credentials(), &config()).await.unwrap();
    let books = unique_table("folio_idem");
    let log = NoticeLog::new();

    catalog::create_table(&session.gateway, NoticeSink::Discard, &books).await.unwrap();
    catalog::create_table(&session.gateway, NoticeSink::Forward(&log), &books).await.unwrap();

    let notices = log.take();
    assert_eq!(notices.len(), 1);
    assert!(notices[0].message.contains("already exists"), "{notices:?}");

    session.gateway.close().await.unwrap();
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL instance"]
async fn test_search_on_missing_table_is_empty() {
    let mut session = bootstrap(&credentials(), &config()).await.unwrap();
    let missing = unique_table("folio_missing");

    let found = catalog::search_books_by_title(&session.gateway, NoticeSink::Discard, &missing, "")
        .await
        .unwrap();
    assert!(found.is_empty());

    session.gateway.close().await.unwrap();
}
