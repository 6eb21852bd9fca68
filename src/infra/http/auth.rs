use axum::{
    Form, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;

use crate::{
    application::{
        auth::SignupCommand,
        current_user::SessionUser,
        error::AppError,
    },
    presentation::views::{
        AuthFormView, LayoutContext, LoginTemplate, PageLocals, SignupTemplate,
        render_template_response,
    },
};

use super::{
    AppState,
    flash::{self, Flash},
    session::{IS_LOGGED_IN_KEY, USER_KEY},
};

const INVALID_CREDENTIALS: &str = "Invalid email or password.";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_form).post(login))
        .route("/signup", get(signup_form).post(signup))
        .route("/logout", post(logout))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginForm {
    email: String,
    password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SignupForm {
    email: String,
    password: String,
    confirm_password: String,
}

async fn login_form(locals: PageLocals, flash: Flash) -> Response {
    let error_message = match flash.take_first(flash::ERROR).await {
        Ok(message) => message,
        Err(err) => return AppError::from(err).into_response(),
    };
    let view = LayoutContext::new(
        &locals,
        "Login",
        "/login",
        AuthFormView {
            email: String::new(),
            error_message,
        },
    );
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

async fn login(
    State(state): State<AppState>,
    session: Session,
    flash: Flash,
    Form(form): Form<LoginForm>,
) -> Result<Redirect, AppError> {
    let Some(user) = state.auth.login(&form.email, &form.password).await? else {
        flash.push(flash::ERROR, INVALID_CREDENTIALS).await?;
        return Ok(Redirect::to("/login"));
    };

    session.cycle_id().await?;
    session.insert(IS_LOGGED_IN_KEY, true).await?;
    session.insert(USER_KEY, SessionUser::from(&user)).await?;
    info!(target = "shopfront::auth", user_id = %user.id, "user logged in");
    Ok(Redirect::to("/"))
}

async fn signup_form(locals: PageLocals, flash: Flash) -> Response {
    let error_message = match flash.take_first(flash::ERROR).await {
        Ok(message) => message,
        Err(err) => return AppError::from(err).into_response(),
    };
    render_signup(
        &locals,
        AuthFormView {
            email: String::new(),
            error_message,
        },
        StatusCode::OK,
    )
}

async fn signup(
    State(state): State<AppState>,
    locals: PageLocals,
    Form(form): Form<SignupForm>,
) -> Response {
    let command = SignupCommand {
        email: form.email.clone(),
        password: form.password,
        confirm_password: form.confirm_password,
    };

    match state.auth.signup(command).await {
        Ok(_) => Redirect::to("/login").into_response(),
        Err(err) => match err.user_message() {
            Some(message) => render_signup(
                &locals,
                AuthFormView {
                    email: form.email,
                    error_message: Some(message),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            None => AppError::from(err).into_response(),
        },
    }
}

async fn logout(session: Session) -> Result<Redirect, AppError> {
    session.flush().await?;
    Ok(Redirect::to("/"))
}

fn render_signup(locals: &PageLocals, content: AuthFormView, status: StatusCode) -> Response {
    let view = LayoutContext::new(locals, "Signup", "/signup", content);
    render_template_response(SignupTemplate { view }, status)
}
