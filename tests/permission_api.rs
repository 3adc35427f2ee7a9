mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::setup;

#[tokio::test]
async fn test_role_without_access_is_forbidden() {
    let app = setup().await;
    let admin = app.admin_token().await;
    let (_, token) = app
        .create_user_with_role(&admin, "intern", "intern@example.com")
        .await;

    for uri in ["/api/employees", "/api/departments", "/api/id-cards", "/api/users", "/api/audit-logs"] {
        let (status, _) = app.get(uri, &token).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{}", uri);
    }

    // Reading your own profile and menus needs no grant
    let (status, _) = app.get("/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.get("/api/menus/mine", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_replace_permissions_grants_access() {
    let app = setup().await;
    let admin = app.admin_token().await;
    let (role_id, token) = app
        .create_user_with_role(&admin, "hr-viewer", "viewer@example.com")
        .await;
    let (org_menu, employees_sub) = app.sub_menu_ids(&admin, "/employees").await;

    let (status, body) = app.get(&format!("/api/roles/{}/permissions", role_id), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isAdmin"], false);
    assert!(body["data"]["menus"]
        .as_array()
        .unwrap()
        .iter()
        .all(|m| m["canView"] == false));

    let (status, body) = app
        .put(
            &format!("/api/roles/{}/permissions", role_id),
            &admin,
            json!({
                "menus": [{
                    "menuId": org_menu,
                    "canView": true,
                    "subMenus": [{ "subMenuId": employees_sub, "canView": true, "canEdit": true }]
                }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let org = body["data"]["menus"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["menuId"] == org_menu)
        .unwrap()
        .clone();
    assert_eq!(org["canView"], true);
    let employees = org["subMenus"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["subMenuId"] == employees_sub)
        .unwrap();
    assert_eq!(employees["canEdit"], true);
    assert_eq!(employees["canDelete"], false);

    let (status, _) = app.get("/api/employees", &token).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app
        .post(
            "/api/employees",
            &token,
            json!({ "employeeCode": "X-1", "name": "Nope", "departmentId": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    // Sibling sub-menus stay closed
    let (status, _) = app.get("/api/departments", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = app
        .get("/api/permissions/check?resource=/employees&action=edit", &token)
        .await;
    assert_eq!(body["data"]["allowed"], true);
    let (_, body) = app
        .get("/api/permissions/check?resource=/employees&action=delete", &token)
        .await;
    assert_eq!(body["data"]["allowed"], false);
    let (status, _) = app
        .get("/api/permissions/check?resource=/employees&action=fly", &token)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.get("/api/menus/mine", &token).await;
    let mine = body["data"].as_array().unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["path"], "/organization");
    let subs = mine[0]["subMenus"].as_array().unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(subs[0]["path"], "/employees");
    assert_eq!(subs[0]["canEdit"], true);

    assert_eq!(app.wait_for_audit("PERMISSION_REPLACE", "role_permission", 1).await, 1);

    // Replacing with an empty list revokes everything
    let (status, _) = app
        .put(&format!("/api/roles/{}/permissions", role_id), &admin, json!({ "menus": [] }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/api/employees", &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_replace_permissions_rejects_bad_tree() {
    let app = setup().await;
    let admin = app.admin_token().await;
    let (role_id, _) = app
        .create_user_with_role(&admin, "auditor", "auditor@example.com")
        .await;
    let (org_menu, _) = app.sub_menu_ids(&admin, "/employees").await;
    let (_, users_sub) = app.sub_menu_ids(&admin, "/users").await;
    let uri = format!("/api/roles/{}/permissions", role_id);

    let (status, _) = app
        .put(&uri, &admin, json!({ "menus": [{ "menuId": 9999, "canView": true }] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // /users lives under Administration, not Organization
    let (status, _) = app
        .put(
            &uri,
            &admin,
            json!({ "menus": [{ "menuId": org_menu, "subMenus": [{ "subMenuId": users_sub, "canView": true }] }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .put(
            &uri,
            &admin,
            json!({ "menus": [{ "menuId": org_menu }, { "menuId": org_menu }] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.put("/api/roles/9999/permissions", &admin, json!({ "menus": [] })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_role_is_protected() {
    let app = setup().await;
    let admin = app.admin_token().await;

    let (_, roles) = app.get("/api/roles", &admin).await;
    let admin_role = roles["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == "admin")
        .unwrap()
        .clone();
    assert_eq!(admin_role["userCount"], 1);
    let id = admin_role["id"].as_i64().unwrap();

    let (status, _) = app.delete(&format!("/api/roles/{}", id), &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .put(&format!("/api/roles/{}", id), &admin, json!({ "name": "superuser" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app
        .get("/api/permissions/check?resource=/anything&action=delete", &admin)
        .await;
    assert_eq!(body["data"]["allowed"], true);
}

#[tokio::test]
async fn test_role_in_use_cannot_be_deleted() {
    let app = setup().await;
    let admin = app.admin_token().await;
    let (role_id, _) = app
        .create_user_with_role(&admin, "printer", "printer@example.com")
        .await;

    let (status, _) = app.delete(&format!("/api/roles/{}", role_id), &admin).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.post("/api/roles", &admin, json!({ "name": "temp" })).await;
    assert_eq!(status, StatusCode::OK);
    let temp = body["data"]["id"].as_i64().unwrap();
    let (status, _) = app.delete(&format!("/api/roles/{}", temp), &admin).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_menu_update_reconciles_sub_menus() {
    let app = setup().await;
    let admin = app.admin_token().await;

    let (status, body) = app
        .post(
            "/api/menus",
            &admin,
            json!({
                "name": "Reports",
                "path": "/reports",
                "sortOrder": 9,
                "subMenus": [
                    { "name": "Headcount", "path": "/reports/headcount", "sortOrder": 1 },
                    { "name": "Turnover", "path": "/reports/turnover", "sortOrder": 2 },
                    { "name": "Archive", "path": "/reports/archive", "sortOrder": 5, "isActive": false }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let menu_id = body["data"]["id"].as_i64().unwrap();
    let subs = body["data"]["subMenus"].as_array().unwrap();
    assert_eq!(subs.len(), 3);
    let headcount = subs.iter().find(|s| s["name"] == "Headcount").unwrap()["id"].as_i64().unwrap();
    let archive = subs.iter().find(|s| s["name"] == "Archive").unwrap()["id"].as_i64().unwrap();

    let (status, _) = app
        .post(
            "/api/menus",
            &admin,
            json!({ "name": "Broken", "path": "no-slash" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Keep and rename Headcount, keep Archive as is, drop Turnover, add Badges
    let (status, body) = app
        .put(
            &format!("/api/menus/{}", menu_id),
            &admin,
            json!({
                "name": "Reports",
                "path": "/reports",
                "subMenus": [
                    { "id": headcount, "name": "Staff Count", "path": "/reports/headcount", "sortOrder": 1 },
                    { "id": archive, "name": "Archive", "path": "/reports/archive" },
                    { "name": "Badges", "path": "/reports/badges", "sortOrder": 3 }
                ]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let subs = body["data"]["subMenus"].as_array().unwrap();
    let names: Vec<&str> = subs.iter().map(|s| s["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Staff Count", "Badges", "Archive"]);
    assert_eq!(subs[0]["id"], headcount);
    // Fields left out of the request keep their stored values
    assert_eq!(subs[2]["id"], archive);
    assert_eq!(subs[2]["sortOrder"], 5);
    assert_eq!(subs[2]["isActive"], false);
    assert_eq!(body["data"]["sortOrder"], 9);

    let (_, body) = app.get("/api/menus/mine", &admin).await;
    let reports = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["id"] == menu_id)
        .unwrap()
        .clone();
    let visible: Vec<&str> = reports["subMenus"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["path"].as_str().unwrap())
        .collect();
    assert_eq!(visible, vec!["/reports/headcount", "/reports/badges"]);

    // Ids from another menu are refused
    let (_, foreign) = app.sub_menu_ids(&admin, "/users").await;
    let (status, _) = app
        .put(
            &format!("/api/menus/{}", menu_id),
            &admin,
            json!({
                "name": "Reports",
                "path": "/reports",
                "subMenus": [{ "id": foreign, "name": "Users", "path": "/users" }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete(&format!("/api/menus/{}", menu_id), &admin).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("/api/menus/{}", menu_id), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
