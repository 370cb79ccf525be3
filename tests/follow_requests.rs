//! Follow Request Tests
//!
//! State machine coverage: PENDING is the only non-terminal state, accept
//! creates the edge atomically, and resolved requests cannot be re-decided.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn private_account_requires_request_then_accept() {
    let app = app().await;
    let alice = app.create_private_account("req_alice").await;
    let bob = app.create_account("req_bob").await;

    // Direct follow is rejected for a private target.
    let resp = app
        .post_json(
            &format!("/accounts/{}/follow", alice.id),
            json!({}),
            Some(&bob.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    // Request instead.
    let resp = app
        .post_json(
            &format!("/accounts/{}/follow-request", alice.id),
            json!({}),
            Some(&bob.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(
        app.request_status(bob.id, alice.id).await.as_deref(),
        Some("PENDING")
    );

    // Visible from both ends.
    let resp = app.get("/follow-requests/received", Some(&alice.token)).await;
    let received = resp.json();
    assert_eq!(received.as_array().unwrap().len(), 1);
    assert_eq!(
        received[0]["account"]["id"].as_str().unwrap(),
        bob.id.to_string()
    );

    let resp = app.get("/follow-requests/sent", Some(&bob.token)).await;
    let sent = resp.json();
    assert_eq!(sent.as_array().unwrap().len(), 1);
    assert_eq!(
        sent[0]["account"]["id"].as_str().unwrap(),
        alice.id.to_string()
    );

    // Accept: edge appears, status becomes terminal.
    let resp = app
        .post_json(
            &format!("/follow-requests/{}/respond", bob.id),
            json!({"action": "accept"}),
            Some(&alice.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert!(app.follow_edge_exists(bob.id, alice.id).await);
    assert_eq!(
        app.request_status(bob.id, alice.id).await.as_deref(),
        Some("ACCEPTED")
    );

    // Responding again hits a terminal state.
    let resp = app
        .post_json(
            &format!("/follow-requests/{}/respond", bob.id),
            json!({"action": "decline"}),
            Some(&alice.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(
        resp.error_message(),
        "follow request has already been resolved"
    );

    // A fresh request after acceptance fails because the edge already exists.
    let resp = app
        .post_json(
            &format!("/accounts/{}/follow-request", alice.id),
            json!({}),
            Some(&bob.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "already following this account");
}

#[tokio::test]
async fn request_to_public_account_rejected() {
    let app = app().await;
    let a = app.create_account("req_pub_a").await;
    let b = app.create_account("req_pub_b").await;

    let resp = app
        .post_json(
            &format!("/accounts/{}/follow-request", b.id),
            json!({}),
            Some(&a.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(
        resp.error_message(),
        "only private accounts accept follow requests"
    );
}

#[tokio::test]
async fn request_to_self() {
    let app = app().await;
    let a = app.create_private_account("req_self").await;

    let resp = app
        .post_json(
            &format!("/accounts/{}/follow-request", a.id),
            json!({}),
            Some(&a.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_pending_request_conflicts() {
    let app = app().await;
    let target = app.create_private_account("req_dup_target").await;
    let requester = app.create_account("req_dup_requester").await;

    let resp = app
        .post_json(
            &format!("/accounts/{}/follow-request", target.id),
            json!({}),
            Some(&requester.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = app
        .post_json(
            &format!("/accounts/{}/follow-request", target.id),
            json!({}),
            Some(&requester.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "a pending follow request already exists");
}

/// Two racing sends produce exactly one PENDING row; the loser gets the
/// duplicate-request conflict.
#[tokio::test]
async fn concurrent_duplicate_requests() {
    let app = app().await;
    let target = app.create_private_account("req_race_target").await;
    let requester = app.create_account("req_race_requester").await;

    let path = format!("/accounts/{}/follow-request", target.id);
    let first = app.post_json(&path, json!({}), Some(&requester.token));
    let second = app.post_json(&path, json!({}), Some(&requester.token));
    let (r1, r2) = tokio::join!(first, second);

    let mut statuses = [r1.status, r2.status];
    statuses.sort();
    assert_eq!(statuses, [StatusCode::CREATED, StatusCode::CONFLICT]);

    let pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM follow_requests \
         WHERE requester_id = $1 AND target_id = $2 AND status = 'PENDING'",
    )
    .bind(requester.id)
    .bind(target.id)
    .fetch_one(app.pool())
    .await
    .unwrap();
    assert_eq!(pending, 1);
}

#[tokio::test]
async fn declined_request_allows_fresh_request() {
    let app = app().await;
    let target = app.create_private_account("req_decline_target").await;
    let requester = app.create_account("req_decline_requester").await;

    app.post_json(
        &format!("/accounts/{}/follow-request", target.id),
        json!({}),
        Some(&requester.token),
    )
    .await;

    let resp = app
        .post_json(
            &format!("/follow-requests/{}/respond", requester.id),
            json!({"action": "decline"}),
            Some(&target.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert!(!app.follow_edge_exists(requester.id, target.id).await);
    assert_eq!(
        app.request_status(requester.id, target.id).await.as_deref(),
        Some("DECLINED")
    );

    // DECLINED is terminal history, not a bar to asking again.
    let resp = app
        .post_json(
            &format!("/accounts/{}/follow-request", target.id),
            json!({}),
            Some(&requester.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(
        app.request_status(requester.id, target.id).await.as_deref(),
        Some("PENDING")
    );
}

#[tokio::test]
async fn cancel_pending_request() {
    let app = app().await;
    let target = app.create_private_account("req_cancel_target").await;
    let requester = app.create_account("req_cancel_requester").await;

    app.post_json(
        &format!("/accounts/{}/follow-request", target.id),
        json!({}),
        Some(&requester.token),
    )
    .await;

    let resp = app
        .delete(
            &format!("/accounts/{}/follow-request", target.id),
            Some(&requester.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert_eq!(
        app.request_status(requester.id, target.id).await.as_deref(),
        Some("CANCELLED")
    );

    // Gone from the target's pending list.
    let resp = app.get("/follow-requests/received", Some(&target.token)).await;
    assert!(resp.json().as_array().unwrap().is_empty());

    // Cancelling is terminal too: responding now finds nothing pending.
    let resp = app
        .post_json(
            &format!("/follow-requests/{}/respond", requester.id),
            json!({"action": "accept"}),
            Some(&target.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    // And a fresh request may be sent afterwards.
    let resp = app
        .post_json(
            &format!("/accounts/{}/follow-request", target.id),
            json!({}),
            Some(&requester.token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
}

#[tokio::test]
async fn cancel_without_pending_request() {
    let app = app().await;
    let target = app.create_private_account("req_cancel_none_target").await;
    let requester = app.create_account("req_cancel_none_requester").await;

    let resp = app
        .delete(
            &format!("/accounts/{}/follow-request", target.id),
            Some(&requester.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "follow request not found");
}

#[tokio::test]
async fn respond_without_request() {
    let app = app().await;
    let target = app.create_private_account("req_none_target").await;
    let stranger = app.create_account("req_none_stranger").await;

    let resp = app
        .post_json(
            &format!("/follow-requests/{}/respond", stranger.id),
            json!({"action": "accept"}),
            Some(&target.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn respond_with_unknown_action() {
    let app = app().await;
    let target = app.create_private_account("req_action_target").await;
    let requester = app.create_account("req_action_requester").await;

    app.post_json(
        &format!("/accounts/{}/follow-request", target.id),
        json!({}),
        Some(&requester.token),
    )
    .await;

    let resp = app
        .post_json(
            &format!("/follow-requests/{}/respond", requester.id),
            json!({"action": "maybe"}),
            Some(&target.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "action must be accept or decline");
}

#[tokio::test]
async fn request_to_nonexistent_account() {
    let app = app().await;
    let requester = app.create_account("req_ghost_requester").await;

    let resp = app
        .post_json(
            &format!("/accounts/{}/follow-request", Uuid::new_v4()),
            json!({}),
            Some(&requester.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn request_between_blocked_accounts_rejected() {
    let app = app().await;
    let target = app.create_private_account("req_blocked_target").await;
    let requester = app.create_account("req_blocked_requester").await;

    app.post_json(
        &format!("/accounts/{}/block", requester.id),
        json!({}),
        Some(&target.token),
    )
    .await;

    let resp = app
        .post_json(
            &format!("/accounts/{}/follow-request", target.id),
            json!({}),
            Some(&requester.token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}
