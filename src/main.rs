use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

use engage_notify::config::AppConfig;
use engage_notify::delivery::view::NotificationView;
use engage_notify::telemetry::{init_subscriber_without_telemetry, init_telemetry_with_subscriber};
use engage_notify::transport::http::HttpNotificationTransport;
use engage_notify::transport::live::{PollingChannel, PushChannel};
use engage_notify::usecase::contracts::{
    AuthContext, LiveChannel, NotificationTransport, UserIdentity,
};
use engage_notify::usecase::session::NotificationSession;

/// Identity taken from configuration. A rejected session wakes the main loop.
struct ConfiguredAuth {
    user: UserIdentity,
    expired: Arc<Notify>,
}

impl AuthContext for ConfiguredAuth {
    fn current_user(&self) -> Option<UserIdentity> {
        Some(self.user.clone())
    }

    fn session_expired(&self) {
        self.expired.notify_one();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let telemetry = if config.telemetry_enabled {
        init_telemetry_with_subscriber(&config.telemetry_config(), env_filter)
    } else {
        init_subscriber_without_telemetry(env_filter)
    }
    .map_err(|e| anyhow!("failed to initialize tracing: {e}"))?;
    tracing::info!(base_url = %config.api_base_url, "starting engage-notify");

    if let Some(addr) = &config.metrics_listen_addr {
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("invalid metrics listen address {addr}"))?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        tracing::info!(%addr, "prometheus metrics initialized");
    }

    let expired = Arc::new(Notify::new());
    let auth = ConfiguredAuth {
        user: UserIdentity {
            user_id: config.user_id.clone(),
            display_name: config.display_name(),
        },
        expired: Arc::clone(&expired),
    };

    let transport = Arc::new(HttpNotificationTransport::new(
        &config.api_base_url,
        config.session_cookie.as_deref(),
        config.request_timeout(),
    )?);

    let channel: Box<dyn LiveChannel> = match &config.ws_url {
        Some(url) => Box::new(PushChannel::new(
            url.clone(),
            config.session_cookie.clone(),
            config.reconnect_policy(),
        )),
        None => Box::new(PollingChannel::new(
            Arc::clone(&transport),
            config.poll_interval(),
            config.page_size,
            config.reconnect_policy(),
        )),
    };

    let session = NotificationSession::init(auth, transport, channel.as_ref(), config.page_size)
        .await
        .context("failed to open notification session")?;
    tracing::info!(
        user = %session.user().display_name,
        live = session.is_live(),
        "notification session opened"
    );

    let mut view = NotificationView::new(session.store().clone(), config.dropdown_size);
    view.toggle_dropdown();
    render(&view);

    let mut last = view.store().snapshot();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupt received, shutting down");
                break;
            }
            _ = expired.notified() => {
                tracing::warn!("session rejected by the server, sign in again");
                break;
            }
            _ = ticker.tick() => {
                let current = view.store().snapshot();
                if current != last {
                    render(&view);
                    last = current;
                }
            }
        }
    }

    session.teardown();
    telemetry.shutdown();
    Ok(())
}

fn render<T, A>(view: &NotificationView<T, A>)
where
    T: NotificationTransport,
    A: AuthContext,
{
    let now = Utc::now();
    let badge = view.badge();
    if badge.is_visible() {
        println!("Notifications ({})", badge.label());
    } else {
        println!("Notifications");
    }

    let rows = view.dropdown_rows(now);
    if rows.is_empty() {
        println!("  You're all caught up");
    }
    for row in rows {
        let marker = if row.is_read { ' ' } else { '*' };
        println!("{marker} [{}] {} ({})", row.label, row.title, row.age);
        println!("    {}", row.content);
    }

    if let Some(banner) = view.error_banner() {
        println!("! {banner}");
    }
}
