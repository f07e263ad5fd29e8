//! End-to-end tests of the step engine flows against an in-memory
//! database and a recording transport.

mod common;

use pretty_assertions::assert_eq;

use common::{
    ensure_admin_env, memory_pool, msg, reply_texts, seed_user, user_points, MockTransport,
    ADMIN_ID,
};
use xhunter::engine::{Step, StepEngine};
use xhunter::storage::db;

fn engine() -> (StepEngine, xhunter::storage::DbPool) {
    ensure_admin_env();
    let pool = memory_pool();
    (StepEngine::new(pool.clone()), pool)
}

// ---- registration --------------------------------------------------------

#[tokio::test]
async fn registration_rejected_without_balance() {
    let (engine, pool) = engine();
    seed_user(&pool, 10, "Alice", 0);

    let replies = engine.begin_registration(&msg(10, "")).await.unwrap();
    let texts = reply_texts(&replies);
    assert!(texts[0].contains("Insufficient Balance"));
    assert!(texts[0].contains("5 Points"));

    assert!(engine.sessions.get(10).await.is_none());
    assert_eq!(user_points(&pool, 10), 0);
}

#[tokio::test]
async fn registration_happy_path_debits_and_counts() {
    let (engine, pool) = engine();
    let transport = MockTransport::new();
    seed_user(&pool, 10, "Alice", 5);

    engine.begin_registration(&msg(10, "")).await.unwrap();
    assert_eq!(engine.sessions.get(10).await, Some(Step::AwaitingEmail));

    engine
        .dispatch(&transport, &msg(10, "alice.work@gmail.com"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        engine.sessions.get(10).await,
        Some(Step::AwaitingPassword { email: "alice.work@gmail.com".to_string() })
    );

    let replies = engine
        .dispatch(&transport, &msg(10, "hunter2hunter2"))
        .await
        .unwrap()
        .unwrap();
    let texts = reply_texts(&replies);
    assert!(texts[0].contains("Registration Complete"));

    assert!(engine.sessions.get(10).await.is_none());
    let conn = db::get_connection(&pool).unwrap();
    let user = db::get_user(&conn, 10).unwrap().unwrap();
    assert_eq!(user.points, 0);
    assert_eq!(user.registered, 1);
}

#[tokio::test]
async fn invalid_email_keeps_the_step() {
    let (engine, pool) = engine();
    let transport = MockTransport::new();
    seed_user(&pool, 10, "Alice", 5);

    engine.begin_registration(&msg(10, "")).await.unwrap();
    let replies = engine
        .dispatch(&transport, &msg(10, "alice@yahoo.com"))
        .await
        .unwrap()
        .unwrap();

    assert!(reply_texts(&replies)[0].contains("Invalid Gmail Format"));
    assert_eq!(engine.sessions.get(10).await, Some(Step::AwaitingEmail));
}

#[tokio::test]
async fn short_password_keeps_the_step() {
    let (engine, pool) = engine();
    let transport = MockTransport::new();
    seed_user(&pool, 10, "Alice", 5);

    engine.begin_registration(&msg(10, "")).await.unwrap();
    engine
        .dispatch(&transport, &msg(10, "alice@gmail.com"))
        .await
        .unwrap();

    let replies = engine
        .dispatch(&transport, &msg(10, "short"))
        .await
        .unwrap()
        .unwrap();

    assert!(reply_texts(&replies)[0].contains("Password Too Weak"));
    assert_eq!(
        engine.sessions.get(10).await,
        Some(Step::AwaitingPassword { email: "alice@gmail.com".to_string() })
    );
    assert_eq!(user_points(&pool, 10), 5);
}

#[tokio::test]
async fn balance_drained_mid_flow_aborts_without_debit() {
    let (engine, pool) = engine();
    let transport = MockTransport::new();
    seed_user(&pool, 10, "Alice", 5);

    engine.begin_registration(&msg(10, "")).await.unwrap();
    engine
        .dispatch(&transport, &msg(10, "alice@gmail.com"))
        .await
        .unwrap();

    // Balance is spent elsewhere between the entry check and submission
    {
        let conn = db::get_connection(&pool).unwrap();
        db::adjust_points(&conn, 10, -5).unwrap();
    }

    let replies = engine
        .dispatch(&transport, &msg(10, "hunter2hunter2"))
        .await
        .unwrap()
        .unwrap();

    assert!(reply_texts(&replies)[0].contains("Insufficient Balance"));
    assert!(engine.sessions.get(10).await.is_none());

    let conn = db::get_connection(&pool).unwrap();
    let user = db::get_user(&conn, 10).unwrap().unwrap();
    assert_eq!(user.points, 0);
    assert_eq!(user.registered, 0);
}

// ---- referrals -----------------------------------------------------------

#[tokio::test]
async fn referral_credits_once_and_alerts_referrer() {
    let (engine, pool) = engine();
    let transport = MockTransport::new();
    seed_user(&pool, 100, "Referrer", 0);

    engine
        .handle_start(&transport, &msg(10, "/start"), "100")
        .await
        .unwrap();

    let conn = db::get_connection(&pool).unwrap();
    let referrer = db::get_user(&conn, 100).unwrap().unwrap();
    assert_eq!(referrer.points, 1);
    assert_eq!(referrer.referrals, 1);
    assert_eq!(db::get_user(&conn, 10).unwrap().unwrap().referred_by, Some(100));
    drop(conn);

    let alerts = transport.sent_to(100);
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("Referral Alert"));

    // A second /start with a different payload must not re-attribute
    seed_user(&pool, 200, "Other", 0);
    engine
        .handle_start(&transport, &msg(10, "/start"), "200")
        .await
        .unwrap();

    let conn = db::get_connection(&pool).unwrap();
    assert_eq!(db::get_user(&conn, 10).unwrap().unwrap().referred_by, Some(100));
    assert_eq!(db::get_user(&conn, 200).unwrap().unwrap().referrals, 0);
}

#[tokio::test]
async fn self_referral_is_ignored() {
    let (engine, pool) = engine();
    let transport = MockTransport::new();

    engine
        .handle_start(&transport, &msg(10, "/start"), "10")
        .await
        .unwrap();

    let conn = db::get_connection(&pool).unwrap();
    let user = db::get_user(&conn, 10).unwrap().unwrap();
    assert_eq!(user.referred_by, None);
    assert_eq!(user.referrals, 0);
    assert_eq!(user.points, 0);
}

#[tokio::test]
async fn unknown_referrer_is_ignored() {
    let (engine, pool) = engine();
    let transport = MockTransport::new();

    engine
        .handle_start(&transport, &msg(10, "/start"), "9999")
        .await
        .unwrap();

    let conn = db::get_connection(&pool).unwrap();
    assert_eq!(db::get_user(&conn, 10).unwrap().unwrap().referred_by, None);
}

// ---- points management ---------------------------------------------------

#[tokio::test]
async fn add_points_flow() {
    let (engine, pool) = engine();
    let transport = MockTransport::new();
    seed_user(&pool, 10, "Alice", 3);

    engine.begin_add_points(ADMIN_ID).await;
    assert_eq!(
        engine.sessions.get(ADMIN_ID).await,
        Some(Step::AwaitingAddPointsTarget)
    );

    engine.dispatch(&transport, &msg(ADMIN_ID, "10")).await.unwrap();
    assert_eq!(
        engine.sessions.get(ADMIN_ID).await,
        Some(Step::AwaitingAddPointsAmount { target_id: 10 })
    );

    let replies = engine
        .dispatch(&transport, &msg(ADMIN_ID, "10"))
        .await
        .unwrap()
        .unwrap();

    assert!(reply_texts(&replies)[0].contains("Added 10 points to user 10"));
    assert!(engine.sessions.get(ADMIN_ID).await.is_none());
    assert_eq!(user_points(&pool, 10), 13);
    assert!(!engine.admin_log.is_empty());
}

#[tokio::test]
async fn remove_points_clamps_at_zero() {
    let (engine, pool) = engine();
    let transport = MockTransport::new();
    seed_user(&pool, 10, "Alice", 5);

    engine.begin_remove_points(ADMIN_ID).await;
    engine.dispatch(&transport, &msg(ADMIN_ID, "10")).await.unwrap();
    let replies = engine
        .dispatch(&transport, &msg(ADMIN_ID, "20"))
        .await
        .unwrap()
        .unwrap();

    assert!(reply_texts(&replies)[0].contains("Removed 20 points"));
    assert_eq!(user_points(&pool, 10), 0);
}

#[tokio::test]
async fn unknown_target_keeps_the_step() {
    let (engine, _pool) = engine();
    let transport = MockTransport::new();

    engine.begin_add_points(ADMIN_ID).await;
    let replies = engine
        .dispatch(&transport, &msg(ADMIN_ID, "424242"))
        .await
        .unwrap()
        .unwrap();

    assert!(reply_texts(&replies)[0].contains("User not found"));
    assert_eq!(
        engine.sessions.get(ADMIN_ID).await,
        Some(Step::AwaitingAddPointsTarget)
    );
}

#[tokio::test]
async fn negative_amount_is_rejected() {
    let (engine, pool) = engine();
    let transport = MockTransport::new();
    seed_user(&pool, 10, "Alice", 5);

    engine.begin_quick_adjust(ADMIN_ID, 10, true).await;
    let replies = engine
        .dispatch(&transport, &msg(ADMIN_ID, "-3"))
        .await
        .unwrap()
        .unwrap();

    assert!(reply_texts(&replies)[0].contains("valid positive number"));
    assert_eq!(user_points(&pool, 10), 5);
    assert_eq!(
        engine.sessions.get(ADMIN_ID).await,
        Some(Step::AwaitingAddPointsAmount { target_id: 10 })
    );
}

// ---- search --------------------------------------------------------------

#[tokio::test]
async fn search_returns_matches_and_clears_session() {
    let (engine, pool) = engine();
    let transport = MockTransport::new();
    seed_user(&pool, 1, "Alice", 3);
    seed_user(&pool, 2, "Alina", 7);
    seed_user(&pool, 3, "Bob", 1);

    engine.begin_search(ADMIN_ID).await;
    let replies = engine
        .dispatch(&transport, &msg(ADMIN_ID, "ali"))
        .await
        .unwrap()
        .unwrap();

    assert!(reply_texts(&replies)[0].contains("Found 2 results"));
    assert!(engine.sessions.get(ADMIN_ID).await.is_none());
}

#[tokio::test]
async fn empty_search_keeps_prompting() {
    let (engine, _pool) = engine();
    let transport = MockTransport::new();

    engine.begin_search(ADMIN_ID).await;
    engine.dispatch(&transport, &msg(ADMIN_ID, "   ")).await.unwrap();
    assert_eq!(
        engine.sessions.get(ADMIN_ID).await,
        Some(Step::AwaitingSearchQuery)
    );
}

// ---- access control ------------------------------------------------------

#[tokio::test]
async fn non_admin_cannot_enter_admin_flows() {
    let (engine, _pool) = engine();

    assert!(engine.begin_search(10).await.is_empty());
    assert!(engine.begin_broadcast(10).await.is_empty());
    assert!(engine.begin_add_points(10).await.is_empty());
    assert!(engine.sessions.get(10).await.is_none());
}

#[tokio::test]
async fn stale_admin_session_is_denied_but_untouched() {
    let (engine, _pool) = engine();
    let transport = MockTransport::new();

    // A session left over from before the user lost the admin flag
    engine.sessions.set(10, Step::AwaitingSearchQuery).await;

    let replies = engine
        .dispatch(&transport, &msg(10, "anything"))
        .await
        .unwrap()
        .unwrap();

    assert!(reply_texts(&replies)[0].contains("restricted to administrators"));
    assert_eq!(engine.sessions.get(10).await, Some(Step::AwaitingSearchQuery));
}

#[tokio::test]
async fn cancel_clears_any_session() {
    let (engine, pool) = engine();
    seed_user(&pool, 10, "Alice", 5);

    engine.begin_registration(&msg(10, "")).await.unwrap();
    assert!(engine.sessions.get(10).await.is_some());

    let replies = engine.cancel(10).await;
    assert!(reply_texts(&replies)[0].contains("Operation cancelled"));
    assert!(engine.sessions.get(10).await.is_none());
}

#[tokio::test]
async fn dispatch_without_session_returns_none() {
    let (engine, _pool) = engine();
    let transport = MockTransport::new();

    let routed = engine.dispatch(&transport, &msg(10, "hello")).await.unwrap();
    assert!(routed.is_none());
}
