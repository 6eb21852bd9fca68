#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use http_body_util::BodyExt;
use shopfront::{
    application::{
        auth::{AuthService, SignupCommand},
        current_user::CurrentUserResolver,
        products::ProductService,
        repos::{CreateProductParams, CreateUserParams, ProductsRepo, RepoError, UsersRepo},
    },
    config::SessionSettings,
    domain::entities::{ProductRecord, UserRecord},
    infra::{
        http::{AppState, build_router},
        uploads::ImageStorage,
    },
};
use tempfile::TempDir;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tower::ServiceExt;
use tower_sessions::MemoryStore;
use uuid::Uuid;

pub const SECRET: &str = "test-secret-0123456789abcdef0123456789abcdef0123456789abcdef";
pub const COOKIE_NAME: &str = "shopfront.sid";
pub const EMAIL: &str = "ada@example.com";
pub const PASSWORD: &str = "secret1";
pub const BODY_LIMIT: usize = 1024 * 1024;

#[derive(Default)]
pub struct MemoryUsers {
    users: Mutex<HashMap<Uuid, UserRecord>>,
    pub lookups: AtomicUsize,
    pub fail_lookups: AtomicBool,
}

impl MemoryUsers {
    pub async fn delete(&self, id: Uuid) {
        self.users.lock().await.remove(&id);
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UsersRepo for MemoryUsers {
    async fn find_user(&self, id: Uuid) -> Result<Option<UserRecord>, RepoError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("connection refused"));
        }
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let user = UserRecord {
            id: Uuid::new_v4(),
            email: params.email,
            password_hash: params.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        self.users.lock().await.insert(user.id, user.clone());
        Ok(user)
    }
}

#[derive(Default)]
pub struct MemoryProducts {
    products: Mutex<Vec<ProductRecord>>,
}

impl MemoryProducts {
    pub async fn all(&self) -> Vec<ProductRecord> {
        self.products.lock().await.clone()
    }
}

#[async_trait]
impl ProductsRepo for MemoryProducts {
    async fn list_products(&self) -> Result<Vec<ProductRecord>, RepoError> {
        Ok(self.products.lock().await.clone())
    }

    async fn list_products_by_user(&self, user_id: Uuid) -> Result<Vec<ProductRecord>, RepoError> {
        Ok(self
            .products
            .lock()
            .await
            .iter()
            .filter(|product| product.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_product(
        &self,
        params: CreateProductParams,
    ) -> Result<ProductRecord, RepoError> {
        let product = ProductRecord {
            id: Uuid::new_v4(),
            title: params.title,
            price: params.price,
            description: params.description,
            image_url: params.image_url,
            user_id: params.user_id,
            created_at: OffsetDateTime::now_utc(),
        };
        self.products.lock().await.push(product.clone());
        Ok(product)
    }
}

pub struct TestApp {
    pub router: Router,
    pub users: Arc<MemoryUsers>,
    pub products: Arc<MemoryProducts>,
    pub auth: Arc<AuthService>,
    pub images_dir: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let images_dir = dir.path().join("images");
        let public_dir = dir.path().join("public");
        std::fs::create_dir_all(public_dir.join("css")).expect("public dir");
        std::fs::write(public_dir.join("css/main.css"), "body {}").expect("stylesheet");

        let users = Arc::new(MemoryUsers::default());
        let products = Arc::new(MemoryProducts::default());
        let users_repo: Arc<dyn UsersRepo> = users.clone();
        let products_repo: Arc<dyn ProductsRepo> = products.clone();
        let auth = Arc::new(AuthService::new(users_repo.clone()));

        let state = AppState {
            auth: auth.clone(),
            products: Arc::new(ProductService::new(products_repo)),
            current_user: Arc::new(CurrentUserResolver::new(users_repo)),
            images: Arc::new(ImageStorage::new(images_dir.clone()).expect("image storage")),
            public_directory: public_dir,
            body_limit: BODY_LIMIT,
        };
        let settings = SessionSettings {
            secret: Some(SECRET.to_string()),
            cookie_name: COOKIE_NAME.to_string(),
            inactivity_days: std::num::NonZeroU32::new(14).expect("non-zero"),
            secure_cookie: false,
        };
        let router = build_router(state, MemoryStore::default(), &settings, SECRET);

        Self {
            router,
            users,
            products,
            auth,
            images_dir,
            _dir: dir,
        }
    }

    pub async fn signup(&self) -> UserRecord {
        self.auth
            .signup(SignupCommand {
                email: EMAIL.to_string(),
                password: PASSWORD.to_string(),
                confirm_password: PASSWORD.to_string(),
            })
            .await
            .expect("signup")
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible router")
    }

    /// Start a browser-like session with the given page.
    pub async fn visit(&self, path: &str) -> Client {
        let mut client = Client::default();
        let page = client.get(self, path).await;
        assert_eq!(page.status, StatusCode::OK, "visiting {path}");
        client
    }

    /// Sign up, then log in through the form. Returns the logged-in client.
    pub async fn logged_in(&self) -> (Client, UserRecord) {
        let user = self.signup().await;
        let mut client = self.visit("/login").await;
        let token = client.token.clone().expect("csrf token on login page");
        let page = client
            .post_form(
                self,
                "/login",
                &[("email", EMAIL), ("password", PASSWORD), ("_csrf", &token)],
            )
            .await;
        assert_eq!(page.status, StatusCode::SEE_OTHER);
        assert_eq!(page.location.as_deref(), Some("/"));
        (client, user)
    }
}

#[derive(Debug)]
pub struct Page {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

/// Minimal cookie jar: one session cookie and the last CSRF token seen in a page.
#[derive(Debug, Default, Clone)]
pub struct Client {
    pub cookie: Option<String>,
    pub token: Option<String>,
}

impl Client {
    pub async fn get(&mut self, app: &TestApp, path: &str) -> Page {
        let request = self.request("GET", path).body(Body::empty()).expect("request");
        self.send(app, request).await
    }

    pub async fn post_form(&mut self, app: &TestApp, path: &str, fields: &[(&str, &str)]) -> Page {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let request = self
            .request("POST", path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("request");
        self.send(app, request).await
    }

    pub async fn post_multipart(&mut self, app: &TestApp, path: &str, body: Multipart) -> Page {
        let request = self
            .request("POST", path)
            .header(header::CONTENT_TYPE, body.content_type())
            .body(Body::from(body.finish()))
            .expect("request");
        self.send(app, request).await
    }

    pub fn request(&self, method: &str, path: &str) -> axum::http::request::Builder {
        let builder = Request::builder().method(method).uri(path);
        match self.cookie.as_ref() {
            Some(cookie) => builder.header(header::COOKIE, cookie),
            None => builder,
        }
    }

    pub async fn send(&mut self, app: &TestApp, request: Request<Body>) -> Page {
        let response = app.send(request).await;
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        if let Some(cookie) = session_cookie(&response) {
            self.cookie = Some(cookie);
        }
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let body = String::from_utf8(bytes.to_vec()).expect("utf-8 body");
        if let Some(token) = csrf_token(&body) {
            self.token = Some(token);
        }
        Page {
            status,
            location,
            body,
        }
    }
}

fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&format!("{COOKIE_NAME}=")))
        .and_then(|value| value.split(';').next())
        .map(str::to_owned)
}

pub fn csrf_token(html: &str) -> Option<String> {
    let marker = "name=\"_csrf\" value=\"";
    let start = html.find(marker)? + marker.len();
    let end = html[start..].find('"')? + start;
    Some(html[start..end].to_string())
}

/// Hand-built `multipart/form-data` body.
pub struct Multipart {
    boundary: &'static str,
    body: Vec<u8>,
}

impl Multipart {
    pub fn new() -> Self {
        Self {
            boundary: "shopfront-test-boundary",
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.body
    }
}

pub fn stored_files(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
