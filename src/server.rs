use crate::{
    config::{Config, VariantConfig},
    image_codec::EncodedImage,
    prediction::{Outcome, PredictionService},
    routes::api_routes,
    telemetry::Metrics,
    variant::Variant,
};
use axum::{extract::DefaultBodyLimit, Router};
use std::{sync::Arc, time::Instant};
use tokio::{net::TcpListener, sync::broadcast::Receiver, task::JoinHandle};

#[derive(Clone)]
pub struct SharedState {
    pub prediction_service: PredictionService,
    pub classification: Arc<VariantConfig>,
    pub detection: Arc<VariantConfig>,
    pub metrics: Arc<Metrics>,
}

impl SharedState {
    pub fn new(
        prediction_service: PredictionService,
        config: &Config,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            prediction_service,
            classification: Arc::new(config.classification.clone()),
            detection: Arc::new(config.detection.clone()),
            metrics,
        }
    }

    pub fn variant_config(&self, variant: Variant) -> &VariantConfig {
        match variant {
            Variant::Classification => self.classification.as_ref(),
            Variant::Detection => self.detection.as_ref(),
        }
    }

    /// One call to the model for `variant`, timed and counted.
    pub async fn predict(&self, variant: Variant, image: &EncodedImage) -> Outcome {
        let started = Instant::now();
        let model_id = &self.variant_config(variant).model_id;

        let outcome = self.prediction_service.predict(model_id, image).await;

        let label = match &outcome {
            Ok(_) => "ok",
            Err(err) => err.kind.as_str(),
        };
        self.metrics.record_prediction(
            variant.as_str(),
            label,
            started.elapsed().as_millis() as u64,
        );

        outcome
    }
}

pub fn build_router(state: SharedState, max_upload_bytes: usize) -> Router {
    Router::new()
        .merge(api_routes())
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(
        prediction_service: PredictionService,
        config: &Config,
    ) -> anyhow::Result<Self> {
        let addr = config.server.get_address();

        let metrics = Arc::new(Metrics::new()?);
        let app_state = SharedState::new(prediction_service, config, metrics);

        let router = build_router(app_state, config.server.max_upload_bytes);

        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub async fn run(
        self,
        shutdown_rx: Receiver<()>,
    ) -> anyhow::Result<JoinHandle<anyhow::Result<()>>> {
        tracing::info!("Starting app on {}", self.listener.local_addr()?);

        let listener = self.listener;
        let router = self.router;
        let server_handle = tokio::spawn({
            let mut shutdown_rx = shutdown_rx.resubscribe();
            async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        shutdown_rx.recv().await.ok();
                    })
                    .await?;
                Ok(())
            }
        });

        Ok(server_handle)
    }
}
