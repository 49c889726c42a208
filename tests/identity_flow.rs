mod common;

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;

use common::{admin_token, assert_ok, login, post_json, register, spawn_app, test_db};
use zeta_backend::entity::user;

#[actix_web::test]
async fn register_then_login_round_trip() {
    let db = test_db().await;
    let app = spawn_app(db.clone()).await;

    assert_ok(&register(&app, "alice", "s3cret").await);

    // registration does not authenticate; login is a separate step
    let token = login(&app, "alice", "s3cret").await;
    let me = post_json(&app, "/api/user/current", Some(&token), json!({})).await;
    assert_ok(&me);
    assert_eq!(me["data"]["username"], "alice");
    assert_eq!(me["data"]["isAdmin"], false);
}

#[actix_web::test]
async fn duplicate_username_is_rejected_without_insert() {
    let db = test_db().await;
    let app = spawn_app(db.clone()).await;

    assert_ok(&register(&app, "alice", "one").await);
    let body = register(&app, "alice", "two").await;
    assert_eq!(body["code"], 2);
    assert_eq!(body["msg"], "username already taken");

    let count = user::Entity::find()
        .filter(user::Column::Username.eq("alice"))
        .count(&db)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[actix_web::test]
async fn register_rejects_any_empty_required_field() {
    let db = test_db().await;
    let app = spawn_app(db.clone()).await;

    for body in [
        json!({"username": "", "password": "p", "hintQuestion": "q", "hintAnswer": "a"}),
        json!({"username": "u", "password": " ", "hintQuestion": "q", "hintAnswer": "a"}),
        json!({"username": "u", "password": "p", "hintAnswer": "a"}),
        json!({"username": "u", "password": "p", "hintQuestion": "q"}),
    ] {
        let res = post_json(&app, "/api/user/register", None, body).await;
        assert_eq!(res["code"], 1);
    }

    let count = user::Entity::find().count(&db).await.unwrap();
    // only the seeded admin
    assert_eq!(count, 1);
}

#[actix_web::test]
async fn login_feedback_distinguishes_user_and_password() {
    let db = test_db().await;
    let app = spawn_app(db).await;
    assert_ok(&register(&app, "alice", "s3cret").await);

    let body = post_json(
        &app,
        "/api/user/login",
        None,
        json!({"username": "nobody", "password": "s3cret"}),
    )
    .await;
    assert_eq!(body["msg"], "no such user");

    // one wrong character is a wrong password, not an unknown user
    let body = post_json(
        &app,
        "/api/user/login",
        None,
        json!({"username": "alice", "password": "s3creT"}),
    )
    .await;
    assert_eq!(body["msg"], "wrong password");
}

#[actix_web::test]
async fn recovery_reveals_question_then_resets_password() {
    let db = test_db().await;
    let app = spawn_app(db).await;
    assert_ok(&register(&app, "alice", "old-pass").await);

    let body = post_json(
        &app,
        "/api/user/recovery/question",
        None,
        json!({"username": "alice"}),
    )
    .await;
    assert_ok(&body);
    assert_eq!(body["data"]["question"], "first pet");

    let body = post_json(
        &app,
        "/api/user/recovery/reset",
        None,
        json!({"username": "alice", "answer": "rex", "password": "new-pass"}),
    )
    .await;
    assert_ok(&body);

    login(&app, "alice", "new-pass").await;
    let body = post_json(
        &app,
        "/api/user/login",
        None,
        json!({"username": "alice", "password": "old-pass"}),
    )
    .await;
    assert_eq!(body["msg"], "wrong password");
}

#[actix_web::test]
async fn recovery_requires_username_and_answer_on_the_same_record() {
    let db = test_db().await;
    let app = spawn_app(db).await;
    assert_ok(&register(&app, "alice", "pass-a").await);
    assert_ok(
        &post_json(
            &app,
            "/api/user/register",
            None,
            json!({
                "username": "bob",
                "password": "pass-b",
                "hintQuestion": "favourite color",
                "hintAnswer": "green",
            }),
        )
        .await,
    );

    // bob's answer does not unlock alice's account
    let body = post_json(
        &app,
        "/api/user/recovery/reset",
        None,
        json!({"username": "alice", "answer": "green", "password": "stolen"}),
    )
    .await;
    assert_eq!(body["msg"], "wrong recovery answer");

    login(&app, "alice", "pass-a").await;
}

#[actix_web::test]
async fn admin_identity_has_no_recovery_path() {
    let db = test_db().await;
    let app = spawn_app(db).await;

    for path in ["/api/user/recovery/question", "/api/user/recovery/reset"] {
        let body = post_json(
            &app,
            path,
            None,
            json!({"username": "Admin", "answer": "master", "password": "x"}),
        )
        .await;
        assert_eq!(body["code"], 2);
        assert_eq!(body["msg"], "the admin identity has no recovery path");
    }

    // fixed bootstrap credentials still work
    admin_token(&app).await;
}

#[actix_web::test]
async fn profile_image_update_requires_a_value() {
    let db = test_db().await;
    let app = spawn_app(db).await;
    assert_ok(&register(&app, "alice", "s3cret").await);
    let token = login(&app, "alice", "s3cret").await;

    let body = post_json(&app, "/api/user/updateImg", Some(&token), json!({"img": " "})).await;
    assert_eq!(body["code"], 1);

    let body = post_json(
        &app,
        "/api/user/updateImg",
        Some(&token),
        json!({"img": "https://example.com/alice.png"}),
    )
    .await;
    assert_ok(&body);

    let me = post_json(&app, "/api/user/current", Some(&token), json!({})).await;
    assert_eq!(me["data"]["img"], "https://example.com/alice.png");
}

#[actix_web::test]
async fn gated_routes_refuse_anonymous_callers() {
    let db = test_db().await;
    let app = spawn_app(db).await;

    let body = post_json(&app, "/api/character/list", None, json!({})).await;
    assert_eq!(body["code"], 3);
    let body = post_json(&app, "/api/user/current", Some("not-a-token"), json!({})).await;
    assert_eq!(body["code"], 3);
}
