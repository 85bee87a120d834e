//! Sign-in, sign-up, and reset-password pages with their form posts.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{sanitize_redirect, AuthAppService};
use crate::error::AppError;
use crate::handlers::http::AppState;
use crate::middleware::auth::MaybeUser;
use crate::middleware::session::ADMIN_HOME;
use crate::pages::blog::respond;
use crate::pages::render::{Nav, Simple};

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    #[serde(rename = "redirectTo")]
    pub redirect_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    #[serde(default, rename = "redirectTo")]
    pub redirect_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
struct LoginView {
    title: String,
    nav: Nav,
    redirect_to: String,
    email: String,
    error: Option<String>,
}

#[derive(Serialize)]
struct SignupView {
    title: String,
    nav: Nav,
    name: String,
    email: String,
    error: Option<String>,
}

/// Message shown on a form for a failed submission.
fn form_error(err: &AppError) -> String {
    match err {
        AppError::Validation(msg) | AppError::Auth(msg) | AppError::Conflict(msg) => msg.clone(),
        _ => "Something went wrong. Please try again.".to_string(),
    }
}

fn login_form(state: &AppState, status: StatusCode, view: LoginView) -> Response {
    let nav = view.nav.clone();
    respond(state, nav, state.templates().page(status, "login", &view))
}

fn signup_form(state: &AppState, status: StatusCode, view: SignupView) -> Response {
    let nav = view.nav.clone();
    respond(state, nav, state.templates().page(status, "signup", &view))
}

/// GET /auth/login
pub async fn login_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Query(query): Query<LoginQuery>,
) -> Response {
    let view = LoginView {
        title: "Sign in".to_string(),
        nav: Nav::from(user.as_ref()),
        redirect_to: sanitize_redirect(query.redirect_to.as_deref(), ADMIN_HOME),
        email: String::new(),
        error: None,
    };
    login_form(&state, StatusCode::OK, view)
}

/// POST /auth/login
pub async fn login_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let target = sanitize_redirect(form.redirect_to.as_deref(), ADMIN_HOME);
    let signed_in = async {
        let user = AuthAppService::sign_in(state.db(), &form.email, &form.password).await?;
        state.sessions().issue(state.db(), user.id, &user.email).await
    }
    .await;

    match signed_in {
        Ok(session) => {
            info!(user_id = %session.user_id, "signed in via form");
            let jar = state.sessions().set_cookies(jar, &session);
            (jar, Redirect::to(&target)).into_response()
        }
        Err(e) => {
            let status = if e.status().is_server_error() {
                e.status()
            } else {
                StatusCode::UNAUTHORIZED
            };
            let view = LoginView {
                title: "Sign in".to_string(),
                nav: Nav::default(),
                redirect_to: target,
                email: form.email,
                error: Some(form_error(&e)),
            };
            login_form(&state, status, view)
        }
    }
}

/// GET /auth/signup
pub async fn signup_page(State(state): State<AppState>, MaybeUser(user): MaybeUser) -> Response {
    let view = SignupView {
        title: "Sign up".to_string(),
        nav: Nav::from(user.as_ref()),
        name: String::new(),
        email: String::new(),
        error: None,
    };
    signup_form(&state, StatusCode::OK, view)
}

/// POST /auth/signup
pub async fn signup_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> Response {
    let created = async {
        let user =
            AuthAppService::sign_up(state.db(), &form.name, &form.email, &form.password).await?;
        state.sessions().issue(state.db(), user.id, &user.email).await
    }
    .await;

    match created {
        Ok(session) => {
            info!(user_id = %session.user_id, "account created via form");
            let jar = state.sessions().set_cookies(jar, &session);
            (jar, Redirect::to(ADMIN_HOME)).into_response()
        }
        Err(e) => {
            let view = SignupView {
                title: "Sign up".to_string(),
                nav: Nav::default(),
                name: form.name,
                email: form.email,
                error: Some(form_error(&e)),
            };
            signup_form(&state, e.status(), view)
        }
    }
}

/// GET /auth/reset-password
pub async fn reset_password_page(State(state): State<AppState>, MaybeUser(user): MaybeUser) -> Response {
    let nav = Nav::from(user.as_ref());
    let view = Simple {
        title: "Reset password".to_string(),
        nav: nav.clone(),
    };
    respond(&state, nav, state.templates().page(StatusCode::OK, "reset_password", &view))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_errors_hide_internal_detail() {
        assert_eq!(
            form_error(&AppError::Auth("Invalid email or password".to_string())),
            "Invalid email or password"
        );
        assert_eq!(
            form_error(&AppError::Internal(anyhow::anyhow!("db down at 10.0.0.5"))),
            "Something went wrong. Please try again."
        );
    }

    #[test]
    fn login_form_keeps_redirect_target() {
        let templates = crate::pages::render::Templates::new().unwrap();
        let view = LoginView {
            title: "Sign in".to_string(),
            nav: Nav::default(),
            redirect_to: "/admin/posts".to_string(),
            email: "a@b.co".to_string(),
            error: Some("Invalid email or password".to_string()),
        };
        let html = templates.render("login", &view).unwrap();
        assert!(html.contains(r#"name="redirectTo" value="/admin/posts""#));
        assert!(html.contains("Invalid email or password"));
    }
}
