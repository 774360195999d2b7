use hireflow::accounts::TenantRepository;
use hireflow::ai_client::{AiService, AiServiceClient};
use hireflow::auth::AuthConfig;
use hireflow::build_rocket;
use hireflow::core::{ConfigManager, Database};
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client;
use serde_json::{json, Value};
use std::sync::Arc;

// Nothing listens on the discard port, so every AI call falls back locally
const UNREACHABLE_AI: &str = "http://127.0.0.1:9";

struct TestApp {
    client: Client,
    auth: AuthConfig,
    db: Database,
}

impl TestApp {
    async fn new() -> Self {
        let mut config = ConfigManager::default();
        config.analytics.segment_refresh_seconds = 0;
        config.service.ai_service_url = UNREACHABLE_AI.to_string();
        config.service.timeout_seconds = 2;

        let auth = AuthConfig::new(&config.auth);
        let db = Database::in_memory().await.unwrap();
        let ai: Arc<dyn AiService> = Arc::new(AiServiceClient::new(UNREACHABLE_AI, 2).unwrap());
        let rocket = build_rocket(config, db.clone(), ai).unwrap();

        Self {
            client: Client::tracked(rocket).await.unwrap(),
            auth,
            db,
        }
    }

    fn bearer(&self, email: &str) -> Header<'static> {
        let token = self
            .auth
            .issue_token(email, None, chrono::Duration::hours(1))
            .unwrap();
        Header::new("Authorization", format!("Bearer {}", token))
    }

    async fn get(&self, uri: &str, email: Option<&str>) -> (Status, Value) {
        let mut request = self.client.get(uri.to_string());
        if let Some(email) = email {
            request = request.header(self.bearer(email));
        }
        let response = request.dispatch().await;
        let status = response.status();
        (status, response.into_json::<Value>().await.unwrap_or(Value::Null))
    }

    async fn send(&self, method: &str, uri: &str, email: &str, body: Value) -> (Status, Value) {
        let request = match method {
            "POST" => self.client.post(uri.to_string()),
            "PATCH" => self.client.patch(uri.to_string()),
            "PUT" => self.client.put(uri.to_string()),
            "DELETE" => self.client.delete(uri.to_string()),
            other => panic!("unsupported method {}", other),
        };
        let response = request
            .header(ContentType::JSON)
            .header(self.bearer(email))
            .body(body.to_string())
            .dispatch()
            .await;
        let status = response.status();
        (status, response.into_json::<Value>().await.unwrap_or(Value::Null))
    }

    async fn post_job(&self, email: &str, title: &str, skills: &[&str]) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/jobs",
                email,
                json!({
                    "title": title,
                    "company": "Acme",
                    "location": "Berlin",
                    "skills": skills,
                    "salary_min": 60000,
                    "salary_max": 80000,
                }),
            )
            .await;
        assert_eq!(status, Status::Ok, "{}", body);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    async fn post_resume(&self, email: &str, skills: &[&str]) -> String {
        let (status, body) = self
            .send(
                "POST",
                "/api/resumes",
                email,
                json!({
                    "title": "Backend engineer",
                    "summary": "Builds services",
                    "skills": skills,
                    "experience_years": 5,
                }),
            )
            .await;
        assert_eq!(status, Status::Ok, "{}", body);
        body["data"]["id"].as_str().unwrap().to_string()
    }
}

const RECRUITER: &str = "recruiter@acme.io";
const CANDIDATE: &str = "jane@candidates.dev";

#[rocket::async_test]
async fn health_is_public() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/api/health", None).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["message"], "OK");
}

#[rocket::async_test]
async fn first_login_creates_tenant_owner() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/me", None).await;
    assert_eq!(status, Status::Unauthorized);
    assert_eq!(body["error_code"], "UNAUTHORIZED");

    let (status, body) = app.get("/api/me", Some(RECRUITER)).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["data"]["email"], RECRUITER);
    assert_eq!(body["data"]["role"], "owner");
    assert_eq!(body["data"]["tenant_name"], "recruiter");
}

#[rocket::async_test]
async fn posted_jobs_are_searchable_and_tenant_scoped() {
    let app = TestApp::new().await;
    let job_id = app.post_job(RECRUITER, "Rust Engineer", &["rust", "sql"]).await;
    app.post_job(RECRUITER, "Office Manager", &["excel"]).await;

    let (status, body) = app.get("/api/jobs/search?q=rust&skills=sql", None).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["results"][0]["id"], job_id.as_str());

    let (status, body) = app.get("/api/jobs/search?sort=sideways", None).await;
    assert_eq!(status, Status::UnprocessableEntity);
    assert_eq!(body["success"], false);

    let (status, _) = app
        .send(
            "PATCH",
            &format!("/api/jobs/{}", job_id),
            CANDIDATE,
            json!({"title": "Hijacked"}),
        )
        .await;
    assert_eq!(status, Status::Forbidden);

    let (status, body) = app
        .send("POST", &format!("/api/jobs/{}/close", job_id), RECRUITER, json!({}))
        .await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["data"]["status"], "closed");

    let (_, body) = app.get("/api/jobs/search?q=rust", None).await;
    assert_eq!(body["data"]["total"], 0);
}

#[rocket::async_test]
async fn malformed_identifiers_are_rejected() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/api/jobs/not-a-uuid", None).await;
    assert_eq!(status, Status::UnprocessableEntity);
    assert_eq!(body["error_code"], "VALIDATION_ERROR");

    let (status, _) = app
        .get(&format!("/api/jobs/{}", uuid::Uuid::new_v4()), None)
        .await;
    assert_eq!(status, Status::NotFound);
}

#[rocket::async_test]
async fn matching_falls_back_when_ai_is_down() {
    let app = TestApp::new().await;
    let job_id = app.post_job(RECRUITER, "Rust Engineer", &["rust", "sql"]).await;
    let resume_id = app.post_resume(CANDIDATE, &["Rust", "Docker"]).await;

    let (status, body) = app
        .send(
            "POST",
            "/api/match",
            CANDIDATE,
            json!({"resume_id": resume_id, "job_id": job_id}),
        )
        .await;
    assert_eq!(status, Status::Ok, "{}", body);
    assert_eq!(body["data"]["source"], "fallback");
    assert_eq!(body["data"]["score"], 50.0);
    assert_eq!(body["data"]["matched_skills"], json!(["rust"]));


    let (status, body) = app
        .send(
            "POST",
            &format!("/api/jobs/{}/interview-questions", job_id),
            CANDIDATE,
            json!({"count": 3}),
        )
        .await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["data"]["questions"].as_array().unwrap().len(), 3);

    // Another user cannot score someone else's resume
    let (status, _) = app
        .send(
            "POST",
            "/api/match",
            RECRUITER,
            json!({"resume_id": resume_id, "job_id": job_id}),
        )
        .await;
    assert_eq!(status, Status::NotFound);
}

#[rocket::async_test]
async fn salary_estimates_describe_the_range() {
    let app = TestApp::new().await;
    let job_id = app.post_job(RECRUITER, "Rust Engineer", &["rust"]).await;

    let (status, body) = app
        .get(&format!("/api/jobs/{}/salary", job_id), Some(CANDIDATE))
        .await;
    assert_eq!(status, Status::Ok, "{}", body);
    assert_eq!(body["message"], "Estimated 60000-80000 USD");
    assert_eq!(body["data"]["min"], 60000);
    assert_eq!(body["data"]["max"], 80000);
    assert_eq!(body["data"]["source"], "fallback");

    let (status, body) = app
        .send(
            "POST",
            "/api/jobs",
            RECRUITER,
            json!({"title": "Volunteer", "company": "Acme", "currency": "eur"}),
        )
        .await;
    assert_eq!(status, Status::Ok, "{}", body);
    let unpaid = body["data"]["id"].as_str().unwrap().to_string();
    let (status, body) = app
        .get(&format!("/api/jobs/{}/salary", unpaid), Some(CANDIDATE))
        .await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["message"], "Estimated ?-? EUR");
    assert_eq!(body["data"]["min"], Value::Null);

    let (status, _) = app.get(&format!("/api/jobs/{}/salary", job_id), None).await;
    assert_eq!(status, Status::Unauthorized);
    let (status, _) = app
        .get(&format!("/api/jobs/{}/salary", uuid::Uuid::new_v4()), Some(CANDIDATE))
        .await;
    assert_eq!(status, Status::NotFound);
}

#[rocket::async_test]
async fn mixed_case_login_joins_domain_tenant() {
    let app = TestApp::new().await;
    TenantRepository::new(app.db.pool())
        .create_domain_tenant("acme.io", "acme")
        .await
        .unwrap();

    let (status, body) = app.get("/api/me", Some(RECRUITER)).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["data"]["tenant_name"], "acme");
    assert_eq!(body["data"]["role"], "owner");

    let (status, body) = app.get("/api/me", Some("Dev@ACME.io")).await;
    assert_eq!(status, Status::Ok, "{}", body);
    assert_eq!(body["data"]["tenant_name"], "acme");
    assert_eq!(body["data"]["role"], "member");

    let (_, body) = app.get("/api/tenant/members", Some(RECRUITER)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[rocket::async_test]
async fn application_pipeline() {
    let app = TestApp::new().await;
    let job_id = app.post_job(RECRUITER, "Rust Engineer", &["rust"]).await;
    let resume_id = app.post_resume(CANDIDATE, &["rust"]).await;

    let apply = json!({"job_id": job_id, "resume_id": resume_id});
    let (status, body) = app.send("POST", "/api/applications", CANDIDATE, apply.clone()).await;
    assert_eq!(status, Status::Ok, "{}", body);
    assert_eq!(body["data"]["status"], "applied");
    let application_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app.send("POST", "/api/applications", CANDIDATE, apply).await;
    assert_eq!(status, Status::Conflict);
    assert_eq!(body["error_code"], "CONFLICT");

    let (status, body) = app
        .get(&format!("/api/jobs/{}/applications", job_id), Some(RECRUITER))
        .await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let status_uri = format!("/api/applications/{}/status", application_id);
    let (status, _) = app
        .send("PATCH", &status_uri, RECRUITER, json!({"status": "hired"}))
        .await;
    assert_eq!(status, Status::UnprocessableEntity);

    let (status, body) = app
        .send("PATCH", &status_uri, RECRUITER, json!({"status": "interviewing"}))
        .await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["data"]["status"], "interviewing");

    let (status, _) = app
        .send("PATCH", &status_uri, CANDIDATE, json!({"status": "offered"}))
        .await;
    assert_eq!(status, Status::Forbidden);
}

#[rocket::async_test]
async fn analytics_require_admin_role() {
    let app = TestApp::new().await;
    let member = "dev@acme.io";

    // Register the owner, then invite a plain member into the same tenant
    app.get("/api/me", Some(RECRUITER)).await;
    let (status, body) = app
        .send("POST", "/api/tenant/members", RECRUITER, json!({"email": member}))
        .await;
    assert_eq!(status, Status::Ok, "{}", body);
    assert_eq!(body["data"]["role"], "member");

    let (status, body) = app
        .send("POST", "/api/events", member, json!({"event_type": "search"}))
        .await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["data"]["event_type"], "search");

    let (status, _) = app.get("/api/analytics/engagement", Some(member)).await;
    assert_eq!(status, Status::Forbidden);

    let (status, body) = app.get("/api/analytics/engagement", Some(RECRUITER)).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["data"]["dau"], 2);

    let (status, body) = app.get("/api/analytics/funnel", Some(RECRUITER)).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["data"]["cohort_size"], 2);

    let (status, _) = app
        .get("/api/analytics/active-series?days=500", Some(RECRUITER))
        .await;
    assert_eq!(status, Status::UnprocessableEntity);

    let (status, body) = app
        .send("POST", "/api/analytics/segments/recompute", RECRUITER, json!({}))
        .await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body["message"], "Classified 2 users");
}
