use axum::{
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, Histogram, IntCounter, IntCounterVec, TextEncoder};
use std::sync::Once;
use std::time::Instant;
use tower::{Layer, Service};

lazy_static::lazy_static! {
    static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::opts!("http_requests_total", "Total number of HTTP requests"),
        &["method", "endpoint", "status"]
    ).unwrap();

    static ref HTTP_REQUEST_DURATION: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
    ).unwrap();

    static ref PHOTOS_UPLOADED: IntCounter = IntCounter::new(
        "gallery_photos_uploaded_total",
        "Total number of photos uploaded"
    ).unwrap();

    static ref FACES_DETECTED: IntCounter = IntCounter::new(
        "gallery_faces_detected_total",
        "Total number of faces stored from detection"
    ).unwrap();

    static ref FACES_ASSIGNED: IntCounterVec = IntCounterVec::new(
        prometheus::opts!("gallery_faces_assigned_total", "Total number of face assignments"),
        &["mode"]
    ).unwrap();

    static ref PERSONS_CREATED: IntCounter = IntCounter::new(
        "gallery_persons_created_total",
        "Total number of persons created by assignments"
    ).unwrap();

    static ref PHOTOS_DELETED: IntCounter = IntCounter::new(
        "gallery_photos_deleted_total",
        "Total number of photos deleted"
    ).unwrap();
}

static REGISTER: Once = Once::new();

pub fn init_metrics() {
    REGISTER.call_once(|| {
        prometheus::register(Box::new(HTTP_REQUESTS_TOTAL.clone())).unwrap();
        prometheus::register(Box::new(HTTP_REQUEST_DURATION.clone())).unwrap();
        prometheus::register(Box::new(PHOTOS_UPLOADED.clone())).unwrap();
        prometheus::register(Box::new(FACES_DETECTED.clone())).unwrap();
        prometheus::register(Box::new(FACES_ASSIGNED.clone())).unwrap();
        prometheus::register(Box::new(PERSONS_CREATED.clone())).unwrap();
        prometheus::register(Box::new(PHOTOS_DELETED.clone())).unwrap();
    });
}

#[derive(Clone)]
pub struct MetricsMiddleware;

impl MetricsMiddleware {
    pub fn new() -> Self {
        init_metrics();
        Self
    }
}

impl Default for MetricsMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for MetricsMiddleware {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

#[derive(Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<Request> for MetricsService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let method = req.method().to_string();
        let endpoint = endpoint_label(req.uri().path());
        let start = Instant::now();

        let mut inner = self.inner.clone();

        Box::pin(async move {
            let response = inner.call(req).await?;

            let duration = start.elapsed().as_secs_f64();
            let status = response.status().as_u16().to_string();

            HTTP_REQUEST_DURATION.observe(duration);
            HTTP_REQUESTS_TOTAL
                .with_label_values(&[&method, &endpoint, &status])
                .inc();

            Ok(response)
        })
    }
}

/// Collapses identifiers in paths so label cardinality stays bounded.
fn endpoint_label(path: &str) -> String {
    let mut label: Vec<&str> = Vec::new();
    let mut previous = "";
    for segment in path.split('/') {
        let collapsed = match previous {
            "photos" | "faces" | "persons" if !segment.is_empty() => ":id",
            "uploads" if !segment.is_empty() => ":file",
            _ => segment,
        };
        label.push(collapsed);
        previous = segment;
    }
    label.join("/")
}

pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            buffer,
        ),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(axum::http::header::CONTENT_TYPE, "text/plain")],
                b"Failed to encode metrics".to_vec(),
            )
        }
    }
}

pub fn record_photo_uploaded(faces: u64) {
    PHOTOS_UPLOADED.inc();
    FACES_DETECTED.inc_by(faces);
}

pub fn record_face_assigned(mode: &str) {
    FACES_ASSIGNED.with_label_values(&[mode]).inc();
}

pub fn record_person_created() {
    PERSONS_CREATED.inc();
}

pub fn record_photo_deleted() {
    PHOTOS_DELETED.inc();
}
