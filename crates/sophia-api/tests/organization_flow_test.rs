// Router-level tests for /api/auth/organization/*

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::{json, Value};

async fn create_org(app: &TestApp, cookie: &str, name: &str, slug: &str) -> Value {
    let response = app
        .post(
            "/api/auth/organization/create",
            Some(cookie),
            json!({"name": name, "slug": slug}),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK, "{:?}", response.json());
    response.json()
}

/// Owner creates an org and invites `email`; the invitee signs up and accepts
async fn org_with_member(app: &TestApp, role: &str) -> (String, String, Value, Value) {
    let (owner, _) = app.sign_up("Owner", "owner@example.com").await;
    let org = create_org(app, &owner, "Acme", "acme").await;

    let invitation = app
        .post(
            "/api/auth/organization/invite-member",
            Some(&owner),
            json!({"email": "bob@example.com", "role": role, "organizationId": org["id"]}),
        )
        .await;
    assert_eq!(invitation.status, StatusCode::OK, "{:?}", invitation.json());
    let invitation = invitation.json();
    assert_eq!(invitation["status"], "pending");

    let (bob, _) = app.sign_up("Bob", "bob@example.com").await;
    let accepted = app
        .post(
            "/api/auth/organization/accept-invitation",
            Some(&bob),
            json!({"invitationId": invitation["id"]}),
        )
        .await;
    assert_eq!(accepted.status, StatusCode::OK, "{:?}", accepted.json());
    let accepted = accepted.json();
    assert_eq!(accepted["invitation"]["status"], "accepted");
    assert_eq!(accepted["member"]["role"], role);

    (owner, bob, org, accepted["member"].clone())
}

#[tokio::test]
async fn test_create_organization_makes_creator_owner() {
    let app = TestApp::new();
    let (cookie, user) = app.sign_up("Owner", "owner@example.com").await;

    let org = create_org(&app, &cookie, "Acme", "acme").await;
    assert_eq!(org["slug"], "acme");
    let members = org["members"].as_array().unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0]["role"], "owner");
    assert_eq!(members[0]["userId"], user["id"]);
    assert_eq!(members[0]["user"]["email"], "owner@example.com");

    let session = app.get("/api/auth/get-session", Some(&cookie)).await.json();
    assert_eq!(session["session"]["activeOrganizationId"], org["id"]);

    let list = app.get("/api/auth/organization/list", Some(&cookie)).await;
    assert_eq!(list.json().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_organization_requires_session() {
    let app = TestApp::new();
    let response = app
        .post(
            "/api/auth/organization/create",
            None,
            json!({"name": "Acme", "slug": "acme"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_slug_uniqueness() {
    let app = TestApp::new();
    let (cookie, _) = app.sign_up("Owner", "owner@example.com").await;
    create_org(&app, &cookie, "Acme", "acme").await;

    let taken = app
        .post("/api/auth/organization/check-slug", Some(&cookie), json!({"slug": "acme"}))
        .await;
    assert_eq!(taken.json(), json!({"status": false}));

    let free = app
        .post("/api/auth/organization/check-slug", Some(&cookie), json!({"slug": "globex"}))
        .await;
    assert_eq!(free.json(), json!({"status": true}));

    let duplicate = app
        .post(
            "/api/auth/organization/create",
            Some(&cookie),
            json!({"name": "Acme Two", "slug": "acme"}),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_organization_limit() {
    let app = TestApp::new();
    let (cookie, _) = app.sign_up("Owner", "owner@example.com").await;
    for i in 0..5 {
        create_org(&app, &cookie, &format!("Org {}", i), &format!("org-{}", i)).await;
    }

    let sixth = app
        .post(
            "/api/auth/organization/create",
            Some(&cookie),
            json!({"name": "Org 5", "slug": "org-5"}),
        )
        .await;
    assert_eq!(sixth.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invitation_flow_and_member_permissions() {
    let app = TestApp::new();
    let (owner, bob, org, _) = org_with_member(&app, "member").await;

    // Accepting sets bob's active organization
    let session = app.get("/api/auth/get-session", Some(&bob)).await.json();
    assert_eq!(session["session"]["activeOrganizationId"], org["id"]);

    let members = app
        .get(
            &format!("/api/auth/organization/list-members?organizationId={}", org["id"].as_str().unwrap()),
            Some(&bob),
        )
        .await;
    assert_eq!(members.status, StatusCode::OK);
    assert_eq!(members.json()["total"], 2);

    // Members are read-only
    let invite = app
        .post(
            "/api/auth/organization/invite-member",
            Some(&bob),
            json!({"email": "carol@example.com", "role": "member", "organizationId": org["id"]}),
        )
        .await;
    assert_eq!(invite.status, StatusCode::FORBIDDEN);

    let update = app
        .post(
            "/api/auth/organization/update",
            Some(&bob),
            json!({"organizationId": org["id"], "data": {"name": "Hijacked"}}),
        )
        .await;
    assert_eq!(update.status, StatusCode::FORBIDDEN);

    let update = app
        .post(
            "/api/auth/organization/update",
            Some(&owner),
            json!({"organizationId": org["id"], "data": {"name": "Acme Inc", "metadata": {"plan": "pro"}}}),
        )
        .await;
    assert_eq!(update.status, StatusCode::OK);
    assert_eq!(update.json()["name"], "Acme Inc");
    assert_eq!(update.json()["metadata"], json!({"plan": "pro"}));
}

#[tokio::test]
async fn test_accepted_invitation_cannot_be_canceled() {
    let app = TestApp::new();
    let (owner, _, org, _) = org_with_member(&app, "member").await;

    let full = app
        .get(
            &format!(
                "/api/auth/organization/get-full-organization?organizationId={}",
                org["id"].as_str().unwrap()
            ),
            Some(&owner),
        )
        .await
        .json();
    let invitation = &full["invitations"][0];
    assert_eq!(invitation["status"], "accepted");

    let response = app
        .post(
            "/api/auth/organization/cancel-invitation",
            Some(&owner),
            json!({"invitationId": invitation["id"]}),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_organization_validation() {
    let app = TestApp::new();
    let (owner, _) = app.sign_up("Owner", "owner@example.com").await;
    let org = create_org(&app, &owner, "Acme", "acme").await;
    create_org(&app, &owner, "Globex", "globex").await;

    let update = |data: Value| json!({"organizationId": org["id"], "data": data});

    for (data, error) in [
        (json!({"name": "   "}), "Name is required"),
        (json!({"slug": ""}), "Slug is required"),
    ] {
        let response = app
            .post("/api/auth/organization/update", Some(&owner), update(data))
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.json(), json!({"error": error}));
    }

    let taken = app
        .post(
            "/api/auth/organization/update",
            Some(&owner),
            update(json!({"slug": " globex "})),
        )
        .await;
    assert_eq!(taken.status, StatusCode::BAD_REQUEST);

    let renamed = app
        .post(
            "/api/auth/organization/update",
            Some(&owner),
            update(json!({"name": "  Acme Inc ", "slug": " acme-inc "})),
        )
        .await;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.json()["name"], "Acme Inc");
    assert_eq!(renamed.json()["slug"], "acme-inc");

    let check = app
        .post(
            "/api/auth/organization/check-slug",
            Some(&owner),
            json!({"slug": "acme"}),
        )
        .await;
    assert_eq!(check.json(), json!({"status": true}));
}

#[tokio::test]
async fn test_invitation_rules() {
    let app = TestApp::new();
    let (owner, _) = app.sign_up("Owner", "owner@example.com").await;
    let org = create_org(&app, &owner, "Acme", "acme").await;

    let invite = |email: &'static str, role: &'static str| {
        json!({"email": email, "role": role, "organizationId": org["id"]})
    };

    let bad_role = app
        .post("/api/auth/organization/invite-member", Some(&owner), invite("carol@example.com", "superuser"))
        .await;
    assert_eq!(bad_role.status, StatusCode::BAD_REQUEST);

    let first = app
        .post("/api/auth/organization/invite-member", Some(&owner), invite("carol@example.com", "member"))
        .await;
    assert_eq!(first.status, StatusCode::OK);
    let first = first.json();
    assert_eq!(first["email"], "carol@example.com");

    let again = app
        .post("/api/auth/organization/invite-member", Some(&owner), invite("carol@example.com", "member"))
        .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);

    // Someone else cannot accept or reject carol's invitation
    let (mallory, _) = app.sign_up("Mallory", "mallory@example.com").await;
    let stolen = app
        .post(
            "/api/auth/organization/accept-invitation",
            Some(&mallory),
            json!({"invitationId": first["id"]}),
        )
        .await;
    assert_eq!(stolen.status, StatusCode::FORBIDDEN);

    let (carol, _) = app.sign_up("Carol", "carol@example.com").await;
    let rejected = app
        .post(
            "/api/auth/organization/reject-invitation",
            Some(&carol),
            json!({"invitationId": first["id"]}),
        )
        .await;
    assert_eq!(rejected.status, StatusCode::OK);
    assert_eq!(rejected.json()["invitation"]["status"], "rejected");
    assert_eq!(rejected.json()["member"], Value::Null);

    // A rejected invitation can no longer be accepted
    let late = app
        .post(
            "/api/auth/organization/accept-invitation",
            Some(&carol),
            json!({"invitationId": first["id"]}),
        )
        .await;
    assert_eq!(late.status, StatusCode::BAD_REQUEST);

    // Cancel a fresh invitation
    let second = app
        .post("/api/auth/organization/invite-member", Some(&owner), invite("dave@example.com", "admin"))
        .await
        .json();
    let canceled = app
        .post(
            "/api/auth/organization/cancel-invitation",
            Some(&owner),
            json!({"invitationId": second["id"]}),
        )
        .await;
    assert_eq!(canceled.status, StatusCode::OK);
    assert_eq!(canceled.json()["status"], "canceled");

    // Finished invitations keep their outcome
    for finished in [&first, &second] {
        let response = app
            .post(
                "/api/auth/organization/cancel-invitation",
                Some(&owner),
                json!({"invitationId": finished["id"]}),
            )
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(
            response.json(),
            json!({"error": "Invitation is no longer pending"})
        );
    }

    let full = app
        .get(
            &format!(
                "/api/auth/organization/get-full-organization?organizationId={}",
                org["id"].as_str().unwrap()
            ),
            Some(&owner),
        )
        .await;
    assert_eq!(full.status, StatusCode::OK);
    let full = full.json();
    assert_eq!(full["members"].as_array().unwrap().len(), 1);
    assert_eq!(full["invitations"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_role_updates_protect_last_owner() {
    let app = TestApp::new();
    let (owner, bob, org, bob_member) = org_with_member(&app, "member").await;

    let owner_member = app
        .get(
            &format!("/api/auth/organization/list-members?organizationId={}", org["id"].as_str().unwrap()),
            Some(&owner),
        )
        .await
        .json()["members"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["role"] == "owner")
        .cloned()
        .unwrap();

    let demote_self = app
        .post(
            "/api/auth/organization/update-member-role",
            Some(&owner),
            json!({"memberId": owner_member["id"], "role": "admin", "organizationId": org["id"]}),
        )
        .await;
    assert_eq!(demote_self.status, StatusCode::BAD_REQUEST);

    let leave = app
        .post(
            "/api/auth/organization/remove-member",
            Some(&owner),
            json!({"memberIdOrEmail": "owner@example.com", "organizationId": org["id"]}),
        )
        .await;
    assert_eq!(leave.status, StatusCode::BAD_REQUEST);

    // Members cannot change roles
    let escalate = app
        .post(
            "/api/auth/organization/update-member-role",
            Some(&bob),
            json!({"memberId": bob_member["id"], "role": "admin", "organizationId": org["id"]}),
        )
        .await;
    assert_eq!(escalate.status, StatusCode::FORBIDDEN);

    let promote = app
        .post(
            "/api/auth/organization/update-member-role",
            Some(&owner),
            json!({"memberId": bob_member["id"], "role": "admin", "organizationId": org["id"]}),
        )
        .await;
    assert_eq!(promote.status, StatusCode::OK);
    assert_eq!(promote.json()["member"]["role"], "admin");
    assert_eq!(promote.json()["member"]["user"]["email"], "bob@example.com");

    // Admins still cannot touch owners
    let demote_owner = app
        .post(
            "/api/auth/organization/update-member-role",
            Some(&bob),
            json!({"memberId": owner_member["id"], "role": "member", "organizationId": org["id"]}),
        )
        .await;
    assert_eq!(demote_owner.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_remove_member_and_leave() {
    let app = TestApp::new();
    let (owner, bob, org, _) = org_with_member(&app, "member").await;

    // A member may leave on their own
    let leave = app
        .post(
            "/api/auth/organization/remove-member",
            Some(&bob),
            json!({"memberIdOrEmail": "bob@example.com", "organizationId": org["id"]}),
        )
        .await;
    assert_eq!(leave.status, StatusCode::OK);
    assert_eq!(leave.json()["member"]["role"], "member");

    let session = app.get("/api/auth/get-session", Some(&bob)).await.json();
    assert_eq!(session["session"]["activeOrganizationId"], Value::Null);

    let members = app
        .get(
            &format!("/api/auth/organization/list-members?organizationId={}", org["id"].as_str().unwrap()),
            Some(&owner),
        )
        .await;
    assert_eq!(members.json()["total"], 1);

    let forbidden = app
        .get(
            &format!("/api/auth/organization/list-members?organizationId={}", org["id"].as_str().unwrap()),
            Some(&bob),
        )
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_set_active_and_delete() {
    let app = TestApp::new();
    let (cookie, _) = app.sign_up("Owner", "owner@example.com").await;
    let first = create_org(&app, &cookie, "First", "first").await;
    let second = create_org(&app, &cookie, "Second", "second").await;

    let active = app
        .post(
            "/api/auth/organization/set-active",
            Some(&cookie),
            json!({"organizationSlug": "first"}),
        )
        .await;
    assert_eq!(active.status, StatusCode::OK);
    assert_eq!(active.json()["id"], first["id"]);

    let full = app
        .get("/api/auth/organization/get-full-organization", Some(&cookie))
        .await;
    assert_eq!(full.json()["slug"], "first");

    let cleared = app
        .post(
            "/api/auth/organization/set-active",
            Some(&cookie),
            json!({"organizationId": null}),
        )
        .await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert_eq!(cleared.json(), Value::Null);

    let none = app
        .get("/api/auth/organization/get-full-organization", Some(&cookie))
        .await;
    assert_eq!(none.json(), Value::Null);

    let deleted = app
        .post(
            "/api/auth/organization/delete",
            Some(&cookie),
            json!({"organizationId": second["id"]}),
        )
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.json()["slug"], "second");

    let list = app.get("/api/auth/organization/list", Some(&cookie)).await.json();
    let slugs: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|o| o["slug"].as_str())
        .collect();
    assert_eq!(slugs, vec!["first"]);
}

#[tokio::test]
async fn test_admin_cannot_delete_organization() {
    let app = TestApp::new();
    let (_, bob, org, _) = org_with_member(&app, "admin").await;

    let response = app
        .post(
            "/api/auth/organization/delete",
            Some(&bob),
            json!({"organizationId": org["id"]}),
        )
        .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    // Admins may invite
    let invite = app
        .post(
            "/api/auth/organization/invite-member",
            Some(&bob),
            json!({"email": "carol@example.com", "role": "member", "organizationId": org["id"]}),
        )
        .await;
    assert_eq!(invite.status, StatusCode::OK);
}
