//! Command implementations. Output goes to stdout; diagnostics go through
//! tracing.

use crate::app::App;
use cropwatch_config::Config;
use delivery_router::{
    compose, resolve_destination, PushPayload, RouterConfig, UnreadFeed, UnreadPoller,
};
use push_registration::RegistrationOutcome;
use serde_json::json;
use session_auth::{AuthError, LoginCredentials, RefreshOutcome};
use std::sync::Arc;
use tracing::{info, warn};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

pub async fn login(app: &App, email: String, password: String, remember_me: bool) -> CliResult<()> {
    let record = app
        .session
        .login(&LoginCredentials {
            email,
            password,
            remember_me,
        })
        .await?;
    info!(user_id = %record.user.id, "Login succeeded");
    println!("Signed in as {} <{}>", record.user.name, record.user.email);

    // A token saved while signed out is associated with this user now.
    if let Some(cached) = app.tokens.get()? {
        match app.push.handle_token_rotation(&cached).await {
            Ok(RegistrationOutcome::Registered { .. }) => println!("Push device registered"),
            Ok(RegistrationOutcome::Deferred { .. }) => {}
            Err(e) => warn!(error = %e, "Deferred push registration failed"),
        }
    }
    Ok(())
}

pub async fn logout(app: &App) -> CliResult<()> {
    app.session.logout().await?;
    println!("Signed out");
    Ok(())
}

pub fn status(app: &App) -> CliResult<()> {
    let record = app.session.current_record()?;
    let push_token = app.tokens.get()?;
    let report = json!({
        "state": app.session.fsm_state(),
        "user": record.as_ref().map(|r| &r.user),
        "rememberMe": record.as_ref().map(|r| r.remember_me),
        "pushTokenCached": push_token.is_some(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub async fn refresh(app: &App) -> CliResult<()> {
    match app.session.refresh().await? {
        RefreshOutcome::Refreshed(_) => println!("Token refreshed"),
        RefreshOutcome::OfflineDegraded(_) => {
            println!("Server unreachable, keeping the last known token")
        }
    }
    Ok(())
}

pub async fn unread(app: &App) -> CliResult<()> {
    let feed = app.unread.clone();
    let count = app
        .session
        .execute(move |token| {
            let feed = feed.clone();
            async move { feed.unread_count(&token).await }
        })
        .await?;
    println!("{count}");
    Ok(())
}

/// Print the unread count every poll interval until interrupted or the
/// session ends.
pub async fn watch_unread(app: &App) -> CliResult<()> {
    if !app.session.fsm_state().has_session() {
        return Err(AuthError::NotLoggedIn.into());
    }

    let poller = UnreadPoller::new(
        app.session.clone(),
        Arc::new(app.unread.clone()),
        app.unread_interval,
    )
    .spawn();
    let mut counts = poller.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = counts.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(count) = *counts.borrow_and_update() {
                    println!("{count}");
                }
            }
        }
    }

    poller.stop();
    Ok(())
}

/// Register a delivery token with the backend, or park it until sign-in.
pub async fn push_enable(app: &App, token: Option<String>) -> CliResult<()> {
    let outcome = match token {
        Some(token) => {
            app.headless.offer(&token);
            match app.tokens.get()? {
                Some(cached) if cached != token => app.push.handle_token_rotation(&token).await?,
                _ => app.push.enable().await?,
            }
        }
        None => app.push.enable().await?,
    };
    match outcome {
        RegistrationOutcome::Registered { .. } => println!("Push device registered"),
        RegistrationOutcome::Deferred { .. } => {
            println!("Delivery token saved, it will be registered after sign-in")
        }
    }
    Ok(())
}

pub async fn push_disable(app: &App) -> CliResult<()> {
    app.push.disable().await?;
    println!("Push notifications disabled");
    Ok(())
}

pub fn push_status(app: &App) -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(&app.push.snapshot())?);
    Ok(())
}

/// Destination path a click on this payload would open.
pub fn route(payload: &str, action: Option<&str>) -> String {
    let mut data = PushPayload::parse(payload.as_bytes()).data();
    if let Some(action) = action.filter(|a| !a.is_empty()) {
        data.action = Some(action.to_string());
    }
    resolve_destination(&data).path()
}

/// The notification and envelope a payload would produce, as JSON.
pub fn preview(config: &Config, payload: &str) -> CliResult<String> {
    let router_config = RouterConfig {
        app_name: config.app_name.clone(),
        icon: config.notification_icon.clone(),
    };
    let (notification, envelope) = compose(&router_config, &PushPayload::parse(payload.as_bytes()));
    let opens = resolve_destination(&notification.data).path();
    let report = json!({
        "notification": notification,
        "envelope": envelope,
        "opens": opens,
    });
    Ok(serde_json::to_string_pretty(&report)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_uses_payload_data() {
        let payload = r#"{"data":{"type":"diagnosis","diagnosisId":"d-7"}}"#;
        assert_eq!(route(payload, None), "/diagnoses/d-7");
    }

    #[test]
    fn test_route_action_overrides() {
        let payload = r#"{"data":{"type":"weather"}}"#;
        assert_eq!(route(payload, Some("diagnose")), "/diagnose");
        assert_eq!(route(payload, Some("")), "/insights");
    }

    #[test]
    fn test_preview_falls_back_to_app_name() {
        let config = Config::default();
        let out = preview(&config, "{}").unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["notification"]["title"], config.app_name.as_str());
        assert_eq!(value["opens"], "/");
    }
}
