//! Repository behaviour against a real Postgres. Run with `DATABASE_URL` set and `--ignored`.

use std::collections::HashSet;

use sqlx::PgPool;
use time::{Duration, OffsetDateTime};

use shelfrate::application::repos::{
    BooksRepo, CreateAuthTokenParams, EngagementRepo, SeedOutcome, SeedRepo, StoreHealth,
    ToggleBookmarkOutcome, TokensRepo, UpsertRatingOutcome, UpsertRatingParams, UsersRepo,
};
use shelfrate::application::seed::{build_plan, parse_fixture};
use shelfrate::domain::ratings::{FieldUpdate, Score};
use shelfrate::domain::types::TokenKind;
use shelfrate::infra::db::PostgresRepositories;

async fn insert_book(pool: &PgPool, title: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO books (title, summary) VALUES ($1, '') RETURNING id")
        .bind(title)
        .fetch_one(pool)
        .await
        .expect("insert book")
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn schema_has_lookup_indexes(pool: PgPool) {
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT indexname FROM pg_indexes WHERE schemaname = 'public'",
    )
    .fetch_all(&pool)
    .await
    .expect("fetch indexes");
    let indexes: HashSet<String> = rows.into_iter().collect();

    for expected in [
        "bookmarks_book_id_idx",
        "ratings_book_id_idx",
        "ratings_user_book_key",
        "users_email_key",
    ] {
        assert!(indexes.contains(expected), "missing {expected}");
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn bookmark_toggle_and_rating_exclusion(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let book = insert_book(&pool, "Dune").await;
    let user = repos
        .create_user("reader@example.com", "hash")
        .await
        .unwrap()
        .expect("new user");

    assert_eq!(
        repos.toggle_bookmark(user.id, book).await.unwrap(),
        ToggleBookmarkOutcome::Added
    );
    assert_eq!(repos.bookmarked_book_ids(user.id).await.unwrap(), vec![book]);
    let listed = repos.list_books_with_bookmark_counts().await.unwrap();
    assert_eq!(listed[0].bookmarks_count, 1);

    let saved = repos
        .upsert_rating(UpsertRatingParams {
            user_id: user.id,
            book_id: book,
            score: FieldUpdate::Set(Some(Score::new(4).unwrap())),
            review: FieldUpdate::Keep,
        })
        .await
        .unwrap();
    assert!(matches!(saved, UpsertRatingOutcome::Saved(_)));
    assert!(repos.bookmarked_book_ids(user.id).await.unwrap().is_empty());

    assert_eq!(
        repos.toggle_bookmark(user.id, book).await.unwrap(),
        ToggleBookmarkOutcome::AlreadyRated
    );
    assert_eq!(
        repos.toggle_bookmark(user.id, book + 1000).await.unwrap(),
        ToggleBookmarkOutcome::BookMissing
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn rating_upsert_merges_fields(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let book = insert_book(&pool, "Dune").await;
    let user = repos
        .create_user("reader@example.com", "hash")
        .await
        .unwrap()
        .unwrap();

    repos
        .upsert_rating(UpsertRatingParams {
            user_id: user.id,
            book_id: book,
            score: FieldUpdate::Set(Some(Score::new(2).unwrap())),
            review: FieldUpdate::Set(Some("Dense".to_string())),
        })
        .await
        .unwrap();
    let merged = repos
        .upsert_rating(UpsertRatingParams {
            user_id: user.id,
            book_id: book,
            score: FieldUpdate::Keep,
            review: FieldUpdate::Set(Some("Better on reread".to_string())),
        })
        .await
        .unwrap();

    let UpsertRatingOutcome::Saved(record) = merged else {
        panic!("expected a saved rating");
    };
    assert_eq!(record.score.map(Score::get), Some(2));
    assert_eq!(record.review.as_deref(), Some("Better on reread"));
    assert_eq!(repos.list_ratings_for_book(book).await.unwrap().len(), 1);

    let cleared = repos
        .upsert_rating(UpsertRatingParams {
            user_id: user.id,
            book_id: book,
            score: FieldUpdate::Set(None),
            review: FieldUpdate::Keep,
        })
        .await
        .unwrap();
    let UpsertRatingOutcome::Saved(record) = cleared else {
        panic!("expected a saved rating");
    };
    assert_eq!(record.score, None);
    assert_eq!(record.review.as_deref(), Some("Better on reread"));
    assert!(repos.book_exists(book).await.unwrap());
    assert!(!repos.book_exists(book + 1000).await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_email_returns_none(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);

    let first = repos.create_user("reader@example.com", "a").await.unwrap();
    let second = repos.create_user("reader@example.com", "b").await.unwrap();

    assert!(first.is_some());
    assert!(second.is_none());
    let found = repos
        .find_user_by_email("reader@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.password_hash, "a");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn expired_tokens_are_deleted(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let user = repos
        .create_user("reader@example.com", "hash")
        .await
        .unwrap()
        .unwrap();
    let now = OffsetDateTime::now_utc();

    for (prefix, expires_at) in [
        ("aaaaaaaaaaaa", now - Duration::minutes(5)),
        ("bbbbbbbbbbbb", now + Duration::minutes(5)),
    ] {
        repos
            .create_token(CreateAuthTokenParams {
                user_id: user.id,
                kind: TokenKind::Access,
                prefix: prefix.to_string(),
                hashed_secret: vec![1, 2, 3],
                expires_at,
            })
            .await
            .unwrap();
    }

    assert_eq!(repos.delete_expired_tokens(user.id, now).await.unwrap(), 1);
    assert!(repos.find_token_by_prefix("aaaaaaaaaaaa").await.unwrap().is_none());
    let live = repos
        .find_token_by_prefix("bbbbbbbbbbbb")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(live.kind, TokenKind::Access);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn seed_runs_only_on_an_empty_catalog(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let fixture = parse_fixture(
        r#"{
            "books": [{"title": "Solaris", "summary": "An ocean that thinks."}],
            "users": [{"email": "reader@example.com", "password": "reader-password"}],
            "ratings": [{"user": "reader@example.com", "book": 0, "score": 4}]
        }"#,
    )
    .unwrap();
    let plan = build_plan(fixture).await.unwrap();

    let first = repos.seed_if_empty(&plan).await.unwrap();
    let second = repos.seed_if_empty(&plan).await.unwrap();

    assert_eq!(
        first,
        SeedOutcome::Loaded {
            books: 1,
            users: 1,
            ratings: 1,
        }
    );
    assert_eq!(second, SeedOutcome::AlreadyPresent);
    repos.ping().await.unwrap();
}
