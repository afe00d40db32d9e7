//! REST API layer using Axum.
//!
//! - `/auth`: registration, login, profile edit and the logged-in probe
//! - `/deck`: deck and card CRUD, public reads, ownership probe
//! - `/docs`: Swagger UI over the generated OpenAPI document
//!
//! The bearer token travels in the `x-auth-token` header. Handlers that need
//! an identity take an [`AuthUser`], which rejects the request with 401 before
//! the handler runs.

use async_trait::async_trait;
use axum::{
    extract::{FromRequest, FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, HeaderName, HeaderValue, Method},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::{AuthService, LoginStatus, Registration};
use crate::decks::{DeckService, Ownership};
use crate::error::{ErrorBody, Result, ServiceError};
use crate::models::{Claims, Deck, DeckId, UserId};

pub const AUTH_HEADER: &str = "x-auth-token";

/// Shared app state for REST handlers (Arc-wrapped for concurrency)
pub struct AppState {
    pub auth: AuthService,
    pub decks: DeckService,
}

/// Identity of a request that carried a valid token.
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn id(&self) -> &UserId {
        &self.0.id
    }
}

fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTH_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> std::result::Result<Self, Self::Rejection> {
        let claims = state.auth.validate_token(token_from_headers(&parts.headers))?;
        Ok(AuthUser(claims))
    }
}

/// JSON body extractor whose rejections use the API error shape.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ServiceError))]
pub struct ApiJson<T>(pub T);

/// Path extractor whose rejections use the API error shape.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ServiceError))]
pub struct ApiPath<T>(pub T);

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuccessMessage {
    pub success_message: String,
}

#[derive(Deserialize, Default, ToSchema)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Default, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
}

#[derive(Deserialize, Default, ToSchema)]
#[serde(default)]
pub struct NewDeck {
    pub title: String,
}

#[derive(Deserialize, Default, ToSchema)]
#[serde(default)]
pub struct CardForm {
    /// `[front, back]`
    pub card: Vec<String>,
}

#[derive(Deserialize, Default, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct TitleForm {
    pub new_title: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

fn parse_card_no(raw: &str) -> Result<i64> {
    raw.parse()
        .map_err(|_| ServiceError::Validation("The card number must be an integer.".to_string()))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        register_handler,
        login_handler,
        edit_profile_handler,
        logged_in_handler,
        create_deck_handler,
        list_user_decks_handler,
        get_deck_handler,
        add_card_handler,
        rename_deck_handler,
        edit_card_handler,
        remove_card_handler,
        delete_deck_handler,
        is_owner_handler,
    ),
    components(schemas(
        Registration,
        LoginForm,
        ProfileForm,
        NewDeck,
        CardForm,
        TitleForm,
        TokenResponse,
        SuccessMessage,
        LoginStatus,
        Claims,
        Deck,
        DeckId,
        UserId,
        ErrorBody,
        HealthResponse,
    )),
    modifiers(&TokenSecurity),
    tags(
        (name = "auth", description = "Accounts and tokens"),
        (name = "deck", description = "Decks and cards"),
    )
)]
pub struct ApiDoc;

struct TokenSecurity;

impl Modify for TokenSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(AUTH_HEADER))),
            );
        }
    }
}

fn cors_layer(allowed_origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(AUTH_HEADER)])
}

/// Create the Axum router with every endpoint, CORS and request tracing.
pub fn create_router(
    auth: AuthService,
    decks: DeckService,
    allowed_origins: Vec<HeaderValue>,
) -> Router {
    let state = Arc::new(AppState { auth, decks });

    Router::new()
        .route("/health", get(health_handler))
        .route("/auth", post(register_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/edit", patch(edit_profile_handler))
        .route("/auth/loggedIn", get(logged_in_handler))
        .route("/deck", post(create_deck_handler))
        .route("/deck/user/:user_id", get(list_user_decks_handler))
        .route(
            "/deck/:deck_id",
            get(get_deck_handler)
                .patch(add_card_handler)
                .delete(delete_deck_handler),
        )
        .route("/deck/:deck_id/title", patch(rename_deck_handler))
        .route("/deck/:deck_id/isOwner", get(is_owner_handler))
        .route(
            "/deck/:deck_id/:card_no",
            patch(edit_card_handler).delete(remove_card_handler),
        )
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .fallback(not_found_handler)
        .with_state(state)
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
}

async fn not_found_handler() -> ServiceError {
    ServiceError::NotFound("No route matches this path.".to_string())
}

/// Health check handler
#[utoipa::path(get, path = "/health", responses((status = 200, body = HealthResponse)))]
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[utoipa::path(
    post,
    path = "/auth",
    tag = "auth",
    request_body = Registration,
    responses(
        (status = 200, description = "Account created", body = TokenResponse),
        (status = 400, description = "Missing fields, password rules or duplicate email", body = ErrorBody),
        (status = 403, description = "Name too long", body = ErrorBody),
    )
)]
async fn register_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(registration): ApiJson<Registration>,
) -> Result<Json<TokenResponse>> {
    let (_, token) = state.auth.register(registration).await?;
    Ok(Json(TokenResponse { token }))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginForm,
    responses(
        (status = 200, body = TokenResponse),
        (status = 400, description = "Missing fields", body = ErrorBody),
        (status = 401, description = "Wrong email or password", body = ErrorBody),
    )
)]
async fn login_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(form): ApiJson<LoginForm>,
) -> Result<Json<TokenResponse>> {
    let token = state.auth.login(&form.email, &form.password).await?;
    Ok(Json(TokenResponse { token }))
}

#[utoipa::path(
    patch,
    path = "/auth/edit",
    tag = "auth",
    request_body = ProfileForm,
    responses(
        (status = 200, body = SuccessMessage),
        (status = 400, body = ErrorBody),
        (status = 401, body = ErrorBody),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("token" = []))
)]
async fn edit_profile_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(form): ApiJson<ProfileForm>,
) -> Result<Json<SuccessMessage>> {
    state
        .auth
        .edit_profile(user.id(), &form.first_name, &form.last_name)?;
    Ok(Json(SuccessMessage {
        success_message: "Successfully updated.".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/auth/loggedIn",
    tag = "auth",
    responses((status = 200, description = "Never fails; reports whether the token is valid", body = LoginStatus))
)]
async fn logged_in_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<LoginStatus> {
    Json(state.auth.check_logged_in(token_from_headers(&headers)))
}

#[utoipa::path(
    post,
    path = "/deck",
    tag = "deck",
    request_body = NewDeck,
    responses(
        (status = 200, body = Deck),
        (status = 401, body = ErrorBody),
        (status = 403, description = "Title too long or deck limit reached", body = ErrorBody),
    ),
    security(("token" = []))
)]
async fn create_deck_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiJson(form): ApiJson<NewDeck>,
) -> Result<Json<Deck>> {
    Ok(Json(state.decks.create_deck(user.id(), &form.title)?))
}

#[utoipa::path(
    get,
    path = "/deck/user/{userId}",
    tag = "deck",
    params(("userId" = String, Path, description = "Owner id")),
    responses(
        (status = 200, body = [Deck]),
        (status = 404, body = ErrorBody),
    )
)]
async fn list_user_decks_handler(
    State(state): State<Arc<AppState>>,
    ApiPath(user_id): ApiPath<String>,
) -> Result<Json<Vec<Deck>>> {
    Ok(Json(state.decks.list_decks_for_user(&user_id)?))
}

#[utoipa::path(
    get,
    path = "/deck/{deckId}",
    tag = "deck",
    params(("deckId" = String, Path, description = "Deck id")),
    responses(
        (status = 200, body = Deck),
        (status = 403, description = "Malformed deck id", body = ErrorBody),
        (status = 404, body = ErrorBody),
    )
)]
async fn get_deck_handler(
    State(state): State<Arc<AppState>>,
    ApiPath(deck_id): ApiPath<String>,
) -> Result<Json<Deck>> {
    Ok(Json(state.decks.get_deck(&deck_id)?))
}

#[utoipa::path(
    patch,
    path = "/deck/{deckId}",
    tag = "deck",
    params(("deckId" = String, Path, description = "Deck id")),
    request_body = CardForm,
    responses(
        (status = 200, description = "Card appended", body = Deck),
        (status = 401, body = ErrorBody),
        (status = 403, description = "Invalid card", body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("token" = []))
)]
async fn add_card_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(deck_id): ApiPath<String>,
    ApiJson(form): ApiJson<CardForm>,
) -> Result<Json<Deck>> {
    Ok(Json(state.decks.add_card(&deck_id, user.id(), &form.card)?))
}

#[utoipa::path(
    patch,
    path = "/deck/{deckId}/title",
    tag = "deck",
    params(("deckId" = String, Path, description = "Deck id")),
    request_body = TitleForm,
    responses(
        (status = 200, body = Deck),
        (status = 401, body = ErrorBody),
        (status = 403, body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("token" = []))
)]
async fn rename_deck_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(deck_id): ApiPath<String>,
    ApiJson(form): ApiJson<TitleForm>,
) -> Result<Json<Deck>> {
    Ok(Json(state.decks.rename_deck(&deck_id, user.id(), &form.new_title)?))
}

#[utoipa::path(
    patch,
    path = "/deck/{deckId}/{cardNo}",
    tag = "deck",
    params(
        ("deckId" = String, Path, description = "Deck id"),
        ("cardNo" = i64, Path, description = "Zero-based card position"),
    ),
    request_body = CardForm,
    responses(
        (status = 200, body = Deck),
        (status = 400, description = "Card number is not an integer", body = ErrorBody),
        (status = 401, body = ErrorBody),
        (status = 403, body = ErrorBody),
        (status = 404, description = "Deck or card not found", body = ErrorBody),
    ),
    security(("token" = []))
)]
async fn edit_card_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath((deck_id, card_no)): ApiPath<(String, String)>,
    ApiJson(form): ApiJson<CardForm>,
) -> Result<Json<Deck>> {
    let index = parse_card_no(&card_no)?;
    Ok(Json(state.decks.edit_card(&deck_id, user.id(), index, &form.card)?))
}

#[utoipa::path(
    delete,
    path = "/deck/{deckId}/{cardNo}",
    tag = "deck",
    params(
        ("deckId" = String, Path, description = "Deck id"),
        ("cardNo" = i64, Path, description = "Zero-based card position"),
    ),
    responses(
        (status = 200, body = Deck),
        (status = 400, body = ErrorBody),
        (status = 401, body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("token" = []))
)]
async fn remove_card_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath((deck_id, card_no)): ApiPath<(String, String)>,
) -> Result<Json<Deck>> {
    let index = parse_card_no(&card_no)?;
    Ok(Json(state.decks.remove_card(&deck_id, user.id(), index)?))
}

#[utoipa::path(
    delete,
    path = "/deck/{deckId}",
    tag = "deck",
    params(("deckId" = String, Path, description = "Deck id")),
    responses(
        (status = 200, body = SuccessMessage),
        (status = 401, body = ErrorBody),
        (status = 404, body = ErrorBody),
    ),
    security(("token" = []))
)]
async fn delete_deck_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(deck_id): ApiPath<String>,
) -> Result<Json<SuccessMessage>> {
    state.decks.delete_deck(&deck_id, user.id())?;
    Ok(Json(SuccessMessage {
        success_message: "Successfully deleted".to_string(),
    }))
}

#[utoipa::path(
    get,
    path = "/deck/{deckId}/isOwner",
    tag = "deck",
    params(("deckId" = String, Path, description = "Deck id")),
    responses(
        (status = 200, description = "`true`/`false`, or an error object when the deck does not exist", body = bool),
        (status = 401, body = ErrorBody),
    ),
    security(("token" = []))
)]
async fn is_owner_handler(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ApiPath(deck_id): ApiPath<String>,
) -> Result<Response> {
    Ok(match state.decks.is_owner(&deck_id, user.id())? {
        Ownership::Owner => Json(true).into_response(),
        Ownership::NotOwner => Json(false).into_response(),
        Ownership::DeckNotFound => Json(ErrorBody {
            error_message: ServiceError::deck_not_found().public_message(),
        })
        .into_response(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenKeys;
    use crate::storage::Storage;
    use axum::{body::Body, http::Request, http::StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt; // For .oneshot() testing

    const ORIGIN: &str = "http://localhost:3000";

    fn app() -> Router {
        let storage = Arc::new(Storage::temporary().expect("temporary storage"));
        let keys = TokenKeys::from_secret(b"rest-test-secret", chrono::Duration::hours(1));
        let auth = AuthService::new(Arc::clone(&storage), keys, 4).expect("auth service");
        let decks = DeckService::new(storage);
        create_router(auth, decks, vec![HeaderValue::from_static(ORIGIN)])
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(AUTH_HEADER, token);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn register(app: &Router, email: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/auth",
            None,
            Some(json!({
                "firstName": "Grace",
                "lastName": "Hopper",
                "email": email,
                "password": "cobol59",
                "passwordVerify": "cobol59",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn user_id(app: &Router, token: &str) -> String {
        let (_, body) = send(app, Method::GET, "/auth/loggedIn", Some(token), None).await;
        body["user"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health() {
        let (status, body) = send(&app(), Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn register_login_and_probe() {
        let app = app();
        let token = register(&app, "grace@example.com").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "grace@example.com", "password": "cobol59" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["token"].is_string());

        let (status, body) = send(&app, Method::GET, "/auth/loggedIn", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isLoggedIn"], true);
        assert_eq!(body["user"]["email"], "grace@example.com");
        assert_eq!(body["user"]["firstName"], "Grace");

        let (status, body) = send(&app, Method::GET, "/auth/loggedIn", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "isLoggedIn": false }));
    }

    #[tokio::test]
    async fn auth_error_bodies() {
        let app = app();
        register(&app, "dup@example.com").await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/auth",
            None,
            Some(json!({
                "firstName": "G", "lastName": "H", "email": "dup@example.com",
                "password": "cobol59", "passwordVerify": "cobol59",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorMessage"], "An account with this email already exists.");

        let (status, body) = send(&app, Method::POST, "/auth", None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorMessage"], "Please enter all required fields.");

        let (status, body) = send(
            &app,
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": "dup@example.com", "password": "wrong-one" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["errorMessage"], "Wrong email or password.");

        let (status, body) = send(&app, Method::POST, "/deck", None, Some(json!({ "title": "x" }))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["errorMessage"], "Unauthorized");
    }

    #[tokio::test]
    async fn malformed_json_uses_error_shape() {
        let app = app();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["errorMessage"].is_string());
    }

    #[tokio::test]
    async fn bad_paths_use_error_shape() {
        let app = app();

        let (status, body) = send(&app, Method::GET, "/deck/%FF", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["errorMessage"].is_string(), "{body}");

        let (status, body) = send(&app, Method::GET, "/nope", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errorMessage"], "No route matches this path.");
    }

    #[tokio::test]
    async fn edit_profile() {
        let app = app();
        let token = register(&app, "edit@example.com").await;

        let (status, body) = send(
            &app,
            Method::PATCH,
            "/auth/edit",
            Some(&token),
            Some(json!({ "firstName": "Amazing", "lastName": "Grace" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["successMessage"], "Successfully updated.");

        let (status, _) = send(
            &app,
            Method::PATCH,
            "/auth/edit",
            Some(&token),
            Some(json!({ "firstName": "x".repeat(21), "lastName": "Grace" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn deck_lifecycle() {
        let app = app();
        let token = register(&app, "owner@example.com").await;
        let owner_id = user_id(&app, &token).await;

        let (status, deck) = send(
            &app,
            Method::POST,
            "/deck",
            Some(&token),
            Some(json!({ "title": "Binary" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deck["owner"], owner_id.as_str());
        assert_eq!(deck["cards"], json!([]));
        let deck_id = deck["id"].as_str().unwrap().to_string();
        let deck_uri = format!("/deck/{deck_id}");

        for card in [json!(["0001", "1"]), json!(["0010", "2"]), json!(["0011", "3"])] {
            let (status, _) = send(
                &app,
                Method::PATCH,
                &deck_uri,
                Some(&token),
                Some(json!({ "card": card })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = send(
            &app,
            Method::PATCH,
            &deck_uri,
            Some(&token),
            Some(json!({ "card": ["a".repeat(31), "b"] })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["errorMessage"], "Card sides can't have more than 30 characters.");

        let (status, deck) = send(
            &app,
            Method::PATCH,
            &format!("{deck_uri}/title"),
            Some(&token),
            Some(json!({ "newTitle": "Binary numbers" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deck["title"], "Binary numbers");

        let (status, deck) = send(
            &app,
            Method::PATCH,
            &format!("{deck_uri}/2"),
            Some(&token),
            Some(json!({ "card": ["0100", "4"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deck["cards"][2], json!(["0100", "4"]));

        let (status, deck) =
            send(&app, Method::DELETE, &format!("{deck_uri}/0"), Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deck["cards"], json!([["0010", "2"], ["0100", "4"]]));

        let (status, _) =
            send(&app, Method::DELETE, &format!("{deck_uri}/7"), Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) =
            send(&app, Method::DELETE, &format!("{deck_uri}/one"), Some(&token), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, listed) =
            send(&app, Method::GET, &format!("/deck/user/{owner_id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["id"], deck_id.as_str());

        let (status, body) = send(&app, Method::DELETE, &deck_uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["successMessage"], "Successfully deleted");

        let (status, _) = send(&app, Method::GET, &deck_uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, listed) =
            send(&app, Method::GET, &format!("/deck/user/{owner_id}"), None, None).await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn reads_are_public_and_ids_are_checked() {
        let app = app();
        let token = register(&app, "public@example.com").await;
        let (_, deck) = send(&app, Method::POST, "/deck", Some(&token), Some(json!({ "title": "Open" }))).await;
        let deck_id = deck["id"].as_str().unwrap();

        let (status, body) = send(&app, Method::GET, &format!("/deck/{deck_id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Open");

        let (status, body) = send(&app, Method::GET, "/deck/tooshort", None, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["errorMessage"], "The deck Id must be 32 characters long.");

        let missing = DeckId::generate();
        let (status, _) = send(&app, Method::GET, &format!("/deck/{missing}"), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::GET, "/deck/user/nobody", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn non_owner_and_ownership_probe() {
        let app = app();
        let owner = register(&app, "mine@example.com").await;
        let other = register(&app, "theirs@example.com").await;
        let (_, deck) = send(&app, Method::POST, "/deck", Some(&owner), Some(json!({ "title": "Mine" }))).await;
        let deck_uri = format!("/deck/{}", deck["id"].as_str().unwrap());

        let (status, _) = send(
            &app,
            Method::PATCH,
            &deck_uri,
            Some(&other),
            Some(json!({ "card": ["", ""] })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, Method::DELETE, &deck_uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let probe = format!("{deck_uri}/isOwner");
        let (status, body) = send(&app, Method::GET, &probe, Some(&owner), None).await;
        assert_eq!((status, body), (StatusCode::OK, json!(true)));
        let (status, body) = send(&app, Method::GET, &probe, Some(&other), None).await;
        assert_eq!((status, body), (StatusCode::OK, json!(false)));

        let missing = format!("/deck/{}/isOwner", DeckId::generate());
        let (status, body) = send(&app, Method::GET, &missing, Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "errorMessage": "No deck was found with this id." }));

        let (status, _) = send(&app, Method::GET, &probe, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn deck_limit_over_http() {
        let app = app();
        let token = register(&app, "many@example.com").await;
        for n in 0..10 {
            let (status, _) = send(
                &app,
                Method::POST,
                "/deck",
                Some(&token),
                Some(json!({ "title": format!("Deck {n}") })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) = send(&app, Method::POST, "/deck", Some(&token), Some(json!({ "title": "One more" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["errorMessage"], "You can't exceed the limit of 10 decks.");
    }

    #[tokio::test]
    async fn cors_allows_listed_origin_with_credentials() {
        let app = app();
        let preflight = |origin: &'static str| {
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/deck")
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, AUTH_HEADER)
                .body(Body::empty())
                .unwrap()
        };

        let response = app.clone().oneshot(preflight(ORIGIN)).await.unwrap();
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], ORIGIN);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

        let response = app.oneshot(preflight("https://evil.example")).await.unwrap();
        assert!(response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/auth",
            "/auth/login",
            "/auth/edit",
            "/auth/loggedIn",
            "/deck",
            "/deck/user/{userId}",
            "/deck/{deckId}",
            "/deck/{deckId}/title",
            "/deck/{deckId}/{cardNo}",
            "/deck/{deckId}/isOwner",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
