//! Tests for request serving.

use super::*;
use crate::auth::{ApiKeyHash, AuthPlan, AuthenticationMode, HashAlgorithm};
use crate::listener::{BoundListener, Surface, TlsSettings, bind, plan};
use crate::metrics::MetricIdentifier;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::net::SocketAddr;
use tokio::task::JoinHandle;

const KEY: &[u8] = b"control-key";

struct Running {
    control: SocketAddr,
    metrics: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), ServeError>>,
}

impl Running {
    async fn stop(self) {
        self.cancel.cancel();
        self.task.await.unwrap().unwrap();
    }
}

async fn start(mode: AuthenticationMode) -> Running {
    let plan = plan(
        &["http://127.0.0.1:0".to_string()],
        true,
        &["http://127.0.0.1:0".to_string()],
        TlsSettings::default(),
    );
    let listeners = bind(&plan).await.into_result().unwrap();
    let control = address_of(&listeners, Surface::Control);
    let metrics = address_of(&listeners, Surface::Metrics);

    let store = Arc::new(MetricsStore::new(3));
    store.record(MetricIdentifier::new("System.Runtime", "cpu-usage", Some("%"), 0.5));
    let state = AppState {
        metrics: store,
        info: Arc::new(ServiceInfo::new(mode.kind(), ConnectionMode::Connect)),
    };
    let auth_plan = AuthPlan::for_platform(&mode, false, false, None);
    let auth = AuthState::new(Arc::new(auth_plan), Arc::new(mode), None);

    let server = Server::new(
        listeners,
        control_router(state.clone(), auth),
        metrics_router(state),
        Duration::from_secs(1),
    );
    let cancel = CancellationToken::new();
    let task = tokio::spawn(server.serve(cancel.clone()));
    Running {
        control,
        metrics,
        cancel,
        task,
    }
}

fn address_of(listeners: &[BoundListener], surface: Surface) -> SocketAddr {
    listeners
        .iter()
        .find(|l| l.surface == surface)
        .and_then(|l| l.local_addr().ok())
        .unwrap_or_else(|| panic!("no {surface} listener in {listeners:?}"))
}

fn stored() -> AuthenticationMode {
    AuthenticationMode::StoredKey {
        hash: ApiKeyHash::of_key(HashAlgorithm::Sha256, KEY),
    }
}

mod control {
    use super::*;

    #[tokio::test]
    async fn info_without_key_is_challenged() {
        let running = start(stored()).await;

        let response = reqwest::get(format!("http://{}/info", running.control))
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("www-authenticate").unwrap(),
            "MonitorApiKey"
        );
        running.stop().await;
    }

    #[tokio::test]
    async fn info_with_key_is_served() {
        let running = start(stored()).await;

        let response = reqwest::Client::new()
            .get(format!("http://{}/info", running.control))
            .header("Authorization", format!("MonitorApiKey {}", STANDARD.encode(KEY)))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&response.text().await.unwrap()).unwrap();
        assert_eq!(body["authMode"], "StoredKey");
        assert_eq!(body["diagnosticPortMode"], "Connect");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        running.stop().await;
    }

    #[tokio::test]
    async fn no_auth_serves_info_anonymously() {
        let running = start(AuthenticationMode::NoAuth).await;

        let response = reqwest::get(format!("http://{}/info", running.control))
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        running.stop().await;
    }

    #[tokio::test]
    async fn metrics_on_control_surface_is_anonymous() {
        let running = start(stored()).await;

        let response = reqwest::get(format!("http://{}/metrics", running.control))
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        running.stop().await;
    }
}

mod metrics_surface {
    use super::*;

    #[tokio::test]
    async fn serves_text_exposition() {
        let running = start(stored()).await;

        let response = reqwest::get(format!("http://{}/metrics", running.metrics))
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            METRICS_CONTENT_TYPE
        );
        assert_eq!(
            response.text().await.unwrap(),
            "# TYPE systemruntime_cpu_usage_ratio gauge\nsystemruntime_cpu_usage_ratio 0.5\n"
        );
        running.stop().await;
    }

    #[tokio::test]
    async fn info_is_not_routed() {
        let running = start(AuthenticationMode::NoAuth).await;

        let response = reqwest::get(format!("http://{}/info", running.metrics))
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
        running.stop().await;
    }
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn empty_listener_set_is_an_error() {
        let server = Server::new(
            Vec::new(),
            Router::new(),
            Router::new(),
            Duration::from_secs(1),
        );

        let err = server.serve(CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ServeError::NoListeners));
    }

    #[tokio::test]
    async fn cancellation_stops_accepting() {
        let running = start(stored()).await;
        let addr = running.metrics;

        running.stop().await;

        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }
}
