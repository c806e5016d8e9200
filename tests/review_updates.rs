// Concurrent review updates against a real Postgres.
// Run with TEST_DATABASE_URL set: cargo test --test review_updates -- --ignored

use content_studio::db;
use content_studio::models::content::{ContentStatus, ContentType, NewContent};
use content_studio::models::listening::{NewListeningHit, ReplyStatus};
use content_studio::services::{ContentService, ListeningService, UserService};
use sqlx::PgPool;

async fn pool() -> PgPool {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let pool = PgPool::connect(&url).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

async fn user_id(pool: &PgPool) -> i32 {
    let tag = uuid::Uuid::new_v4().simple().to_string();
    UserService::create(pool, &format!("{}@example.com", tag), &tag, "hash")
        .await
        .unwrap()
        .id
}

#[tokio::test]
#[ignore = "needs TEST_DATABASE_URL"]
async fn only_one_concurrent_content_review_wins() {
    let pool = pool().await;
    let user = user_id(&pool).await;
    let content = ContentService::create(
        &pool,
        &NewContent {
            user_id: user,
            brief_id: None,
            platform: "tiktok".to_string(),
            content_type: ContentType::Caption,
            title: "Cold brew".to_string(),
            body: "Cold brew season is here".to_string(),
            hashtags: vec![],
            scenes: vec![],
        },
    )
    .await
    .unwrap();

    let (approve, reject) = tokio::join!(
        ContentService::update_status(&pool, user, content.id, "pending", ContentStatus::Approved),
        ContentService::update_status(&pool, user, content.id, "pending", ContentStatus::Rejected),
    );
    let applied = [approve.unwrap(), reject.unwrap()];
    assert_eq!(applied.iter().filter(|u| u.is_some()).count(), 1);

    // A request that read the old status no longer applies
    let stale = ContentService::update_status(&pool, user, content.id, "pending", ContentStatus::Approved)
        .await
        .unwrap();
    assert!(stale.is_none());
}

#[tokio::test]
#[ignore = "needs TEST_DATABASE_URL"]
async fn posted_reply_is_not_overwritten() {
    let pool = pool().await;
    let user = user_id(&pool).await;
    let url = format!("https://x.com/{}", uuid::Uuid::new_v4());
    ListeningService::insert_hits(
        &pool,
        user,
        None,
        &[NewListeningHit {
            platform: "twitter".to_string(),
            author: "bean_fan".to_string(),
            text: "Where is the best cold brew?".to_string(),
            url: Some(url),
            matched_keywords: vec!["cold brew".to_string()],
            posted_at: None,
        }],
    )
    .await
    .unwrap();
    let hit = ListeningService::list_hits(&pool, user, None, 10).await.unwrap().remove(0);
    let reply = ListeningService::create_reply(&pool, user, hit.id, "Try ours!").await.unwrap();

    let approved = ListeningService::update_reply(
        &pool,
        user,
        reply.id,
        ReplyStatus::Pending,
        ReplyStatus::Approved,
        "Try ours!",
    )
    .await
    .unwrap();
    assert!(approved.is_some());

    let (posted, rejected) = tokio::join!(
        ListeningService::update_reply(&pool, user, reply.id, ReplyStatus::Approved, ReplyStatus::Posted, "Try ours!"),
        ListeningService::update_reply(&pool, user, reply.id, ReplyStatus::Pending, ReplyStatus::Rejected, "Try ours!"),
    );
    assert_eq!(posted.unwrap().unwrap().status, "posted");
    assert!(rejected.unwrap().is_none());
}
