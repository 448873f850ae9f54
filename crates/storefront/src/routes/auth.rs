//! Account route handlers: register, login and logout.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use super::Layout;
use crate::error::{Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_user, push_notice, set_current_user};
use crate::models::{CurrentUser, Notice, User};
use crate::services::{AuthError, AuthService};
use crate::state::AppState;

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub email: String,
}

/// Registration page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub layout: Layout,
    pub name: String,
    pub email: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

async fn log_in(session: &Session, user: &User) -> Result<()> {
    set_current_user(session, &CurrentUser::from(user)).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

/// Display the login form.
#[instrument(skip(state, session))]
pub async fn login_page(State(state): State<AppState>, session: Session) -> impl IntoResponse {
    LoginTemplate {
        layout: Layout::load(&state, &session).await,
        email: String::new(),
    }
}

/// Check credentials and start an authenticated session.
#[instrument(skip(state, session, form))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    match AuthService::new(state.users()).login(&form.email, &form.password).await {
        Ok(user) => {
            log_in(&session, &user).await?;
            tracing::info!(user_id = %user.id, "User logged in");
            push_notice(&session, Notice::info(format!("Welcome back, {}", user.name))).await;
            Ok(Redirect::to("/").into_response())
        }
        Err(AuthError::InvalidCredentials | AuthError::InvalidEmail(_)) => {
            let layout = Layout::load(&state, &session)
                .await
                .with_notice(Notice::error("Invalid email or password"));
            Ok((
                StatusCode::UNAUTHORIZED,
                LoginTemplate {
                    layout,
                    email: form.email,
                },
            )
                .into_response())
        }
        Err(err) => Err(err.into()),
    }
}

/// Display the registration form.
#[instrument(skip(state, session))]
pub async fn register_page(State(state): State<AppState>, session: Session) -> impl IntoResponse {
    RegisterTemplate {
        layout: Layout::load(&state, &session).await,
        name: String::new(),
        email: String::new(),
    }
}

/// Create an account and log it in.
#[instrument(skip(state, session, form))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let message = match AuthService::new(state.users())
        .register(&form.name, &form.email, &form.password)
        .await
    {
        Ok(user) => {
            log_in(&session, &user).await?;
            push_notice(&session, Notice::info(format!("Welcome, {}", user.name))).await;
            return Ok(Redirect::to("/").into_response());
        }
        Err(AuthError::UserAlreadyExists) => {
            push_notice(
                &session,
                Notice::warning("An account with this email already exists. Please log in."),
            )
            .await;
            return Ok(Redirect::to("/login").into_response());
        }
        Err(AuthError::InvalidEmail(_)) => "Please enter a valid email address".to_owned(),
        Err(err @ (AuthError::InvalidName | AuthError::WeakPassword(_))) => err.to_string(),
        Err(err) => return Err(err.into()),
    };

    let layout = Layout::load(&state, &session)
        .await
        .with_notice(Notice::error(message));
    Ok((
        StatusCode::UNPROCESSABLE_ENTITY,
        RegisterTemplate {
            layout,
            name: form.name,
            email: form.email,
        },
    )
        .into_response())
}

/// End the authenticated session. The cart is kept.
#[instrument(skip(session))]
pub async fn logout(session: Session) -> Result<Redirect> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    push_notice(&session, Notice::info("You have been logged out")).await;
    Ok(Redirect::to("/"))
}
