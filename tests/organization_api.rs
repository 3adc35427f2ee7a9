mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::setup;

#[tokio::test]
async fn test_department_crud() {
    let app = setup().await;
    let token = app.admin_token().await;

    let (status, body) = app
        .post(
            "/api/departments",
            &token,
            json!({ "name": "Finance", "code": "FIN", "description": "Money" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["code"], "FIN");

    let (status, _) = app.post("/api/departments", &token, json!({ "name": "Finance" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app.post("/api/departments", &token, json!({ "name": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .put(
            &format!("/api/departments/{}", id),
            &token,
            json!({ "name": "Finance & Accounts", "code": "FIN" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Finance & Accounts");

    let (status, body) = app.get("/api/departments?search=Accounts", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["employeeCount"], 0);

    let (status, _) = app.delete(&format!("/api/departments/{}", id), &token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get(&format!("/api/departments/{}", id), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    assert_eq!(app.wait_for_audit("DELETE", "department", 1).await, 1);
}

#[tokio::test]
async fn test_department_with_employees_cannot_be_deleted() {
    let app = setup().await;
    let token = app.admin_token().await;

    let dept = app.create_department(&token, "Operations").await;
    app.create_employee(&token, "E-100", dept).await;

    let (status, _) = app.delete(&format!("/api/departments/{}", dept), &token).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = app.get(&format!("/api/departments/{}", dept), &token).await;
    assert_eq!(body["data"]["name"], "Operations");
}

#[tokio::test]
async fn test_employee_requires_existing_department() {
    let app = setup().await;
    let token = app.admin_token().await;

    let (status, _) = app
        .post(
            "/api/employees",
            &token,
            json!({ "employeeCode": "E-1", "name": "Nobody", "departmentId": 9999 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_employee_crud_and_filters() {
    let app = setup().await;
    let token = app.admin_token().await;

    let sales = app.create_department(&token, "Sales").await;
    let support = app.create_department(&token, "Support").await;
    let first = app.create_employee(&token, "S-001", sales).await;
    app.create_employee(&token, "S-002", sales).await;
    app.create_employee(&token, "P-001", support).await;

    let (status, _) = app
        .post(
            "/api/employees",
            &token,
            json!({ "employeeCode": "S-001", "name": "Clone", "departmentId": sales }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .get(&format!("/api/employees?departmentId={}", sales), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["items"][0]["departmentName"], "Sales");

    let (_, body) = app.get("/api/employees?search=P-00", &token).await;
    assert_eq!(body["data"]["total"], 1);

    let (_, body) = app.get("/api/employees?page=2&pageSize=2", &token).await;
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .put(
            &format!("/api/employees/{}", first),
            &token,
            json!({
                "employeeCode": "S-001",
                "name": "Renamed",
                "departmentId": sales,
                "bloodGroup": "AB-",
                "isActive": false
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Renamed");
    assert_eq!(body["data"]["isActive"], false);

    let (_, body) = app.get("/api/employees?isActive=false", &token).await;
    assert_eq!(body["data"]["total"], 1);

    let (status, _) = app.delete(&format!("/api/employees/{}", first), &token).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("/api/employees/{}", first), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_department_transfer() {
    let app = setup().await;
    let token = app.admin_token().await;

    let from = app.create_department(&token, "Warehouse").await;
    let to = app.create_department(&token, "Logistics").await;
    let emp = app.create_employee(&token, "W-7", from).await;

    // Unknown employee, unknown target, same department
    let (status, _) = app
        .post(
            "/api/department-transfers",
            &token,
            json!({ "employeeId": 4242, "toDepartmentId": to }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .post(
            "/api/department-transfers",
            &token,
            json!({ "employeeId": emp, "toDepartmentId": 4242 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .post(
            "/api/department-transfers",
            &token,
            json!({ "employeeId": emp, "toDepartmentId": from }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            "/api/department-transfers",
            &token,
            json!({
                "employeeId": emp,
                "toDepartmentId": to,
                "transferDate": "2025-01-15",
                "reason": "Restructuring"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["fromDepartmentId"], from);
    assert_eq!(body["data"]["toDepartmentId"], to);
    assert_eq!(body["data"]["fromDepartmentName"], "Warehouse");
    assert_eq!(body["data"]["toDepartmentName"], "Logistics");
    assert_eq!(body["data"]["transferDate"], "2025-01-15");
    assert_eq!(body["data"]["employeeCode"], "W-7");

    let (_, body) = app.get(&format!("/api/employees/{}", emp), &token).await;
    assert_eq!(body["data"]["departmentId"], to);

    let (_, body) = app
        .get(&format!("/api/department-transfers?employeeId={}", emp), &token)
        .await;
    assert_eq!(body["data"]["total"], 1);

    // Empty now, but the transfer history still points at it
    let (_, body) = app.get("/api/departments?search=Warehouse", &token).await;
    assert_eq!(body["data"]["items"][0]["employeeCount"], 0);
    let (status, _) = app.delete(&format!("/api/departments/{}", from), &token).await;
    assert_eq!(status, StatusCode::CONFLICT);

    assert_eq!(app.wait_for_audit("TRANSFER", "department_transfer", 1).await, 1);
}

#[tokio::test]
async fn test_duplicate_user_email_conflicts() {
    let app = setup().await;
    let token = app.admin_token().await;

    let (_, roles) = app.get("/api/roles", &token).await;
    let admin_role = roles["data"][0]["id"].as_i64().unwrap();

    let body = json!({
        "name": "Second",
        "email": "admin@example.com",
        "password": "password1",
        "roleId": admin_role
    });
    let (status, _) = app.post("/api/users", &token, body).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .post(
            "/api/users",
            &token,
            json!({ "name": "Lost", "email": "lost@example.com", "password": "password1", "roleId": 777 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_huge_page_number_returns_empty_page() {
    let app = setup().await;
    let token = app.admin_token().await;
    app.create_department(&token, "Archive").await;

    let uri = format!("/api/departments?page={}&pageSize=100", u64::MAX);
    let (status, body) = app.get(&uri, &token).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["total"], 1);
    assert!(body["data"]["items"].as_array().unwrap().is_empty());

    let (status, _) = app.get(&format!("/api/audit-logs?page={}", u64::MAX), &token).await;
    assert_eq!(status, StatusCode::OK);
}
