use async_trait::async_trait;
use smartgallery::api::{create_app, ApiOptions};
use smartgallery::client::{GalleryBackend, HttpBackend};
use smartgallery::config::{ClientConfig, Session};
use smartgallery::db::Database;
use smartgallery::detector::{DetectedFace, FaceDetector};
use smartgallery::gallery::{AssignmentOutcome, AssignmentWorkflow, DeleteOutcome, GalleryCoordinator};
use smartgallery::models::{BoundingBox, FaceId, Page, PhotoId, UploadFile};
use smartgallery::registry::PersonChoice;
use smartgallery::service::GalleryService;
use smartgallery::GalleryError;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;

const TOKEN: &str = "gallery-secret";

/// Reports one face in the top left corner of every image.
struct CornerDetector;

#[async_trait]
impl FaceDetector for CornerDetector {
    fn name(&self) -> &str {
        "corner"
    }

    async fn detect(&self, _image: &[u8]) -> anyhow::Result<Vec<DetectedFace>> {
        Ok(vec![DetectedFace {
            bbox: BoundingBox::new(0.0, 0.0, 4.0, 4.0),
            confidence: 0.9,
            suggestion: None,
        }])
    }
}

/// Serves the gallery API on an ephemeral local port.
async fn serve() -> (TempDir, SocketAddr) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::in_memory().await.unwrap();
    let service = GalleryService::new(db, dir.path().join("uploads")).with_detector(Arc::new(CornerDetector));
    let app = create_app(
        Arc::new(service),
        ApiOptions {
            api_token: Some(TOKEN.to_string()),
            ..ApiOptions::default()
        },
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (dir, addr)
}

fn backend(addr: SocketAddr) -> HttpBackend {
    HttpBackend::new(&ClientConfig {
        base_url: format!("http://{}", addr),
        timeout_secs: 10,
    })
    .unwrap()
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::new_rgb8(width, height)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

#[tokio::test]
async fn test_http_backend_against_live_server() {
    let (_dir, addr) = serve().await;
    let http = Arc::new(backend(addr));
    let session = Session::open(Some(TOKEN.to_string()));

    let count = Page::MAX_LIMIT as usize + 5;
    for i in 0..count {
        let file = UploadFile::new(format!("{}.png", i), png(8, 8)).with_content_type("image/png");
        let photo = http.upload_photo(&session, file).await.unwrap();
        assert_eq!(photo.faces_count(), 1);
    }

    let mut coordinator = GalleryCoordinator::new(http.clone(), session.clone());
    coordinator.refresh().await.unwrap();
    assert_eq!(coordinator.composer().photos().len(), count);
    assert_eq!(coordinator.composer().photos()[0].original_name, format!("{}.png", count - 1));

    let photo = coordinator.composer().photos()[0].clone();
    assert_eq!(
        http.image_url(&photo),
        format!("http://{}/uploads/{}", addr, photo.filename)
    );

    let mut workflow = AssignmentWorkflow::new();
    assert!(workflow
        .select_face(coordinator.composer(), &photo.id, &photo.faces[0].id)
        .unwrap());
    workflow.set_new_name("Iris");
    let iris = match coordinator.assign(&mut workflow).await {
        AssignmentOutcome::Assigned { person, .. } => person,
        other => panic!("assignment failed: {:?}", other),
    };

    let tagged = http.list_photos(&session, Some(&iris.id)).await.unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].faces[0].person_id(), Some(&iris.id));
    assert_eq!(http.list_persons(&session).await.unwrap().len(), 1);

    let unknown = http
        .assign_face(&session, &FaceId::from("nope"), &PersonChoice::new_name("Ghost").unwrap())
        .await;
    assert!(matches!(unknown, Err(GalleryError::NotFound(ref m)) if m == "face nope"));

    let outcome = coordinator.delete(&photo.id, |_| true).await.unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert_eq!(coordinator.composer().photos().len(), count - 1);
    assert!(coordinator.composer().person(&iris.id).is_some());

    let again = http.delete_photo(&session, &photo.id).await;
    assert!(matches!(again, Err(GalleryError::NotFound(ref m)) if *m == format!("photo {}", photo.id)));
    assert_eq!(http.list_photos(&session, None).await.unwrap().len(), count - 1);
}

#[tokio::test]
async fn test_http_backend_rejects_bad_credentials() {
    let (_dir, addr) = serve().await;
    let http = Arc::new(backend(addr));

    let wrong = Session::open(Some("not-the-token".to_string()));
    let result = http.list_persons(&wrong).await;
    assert!(matches!(result, Err(GalleryError::Transport(ref m)) if m.contains("401")));

    let mut coordinator = GalleryCoordinator::new(http.clone(), Session::anonymous());
    assert!(matches!(coordinator.refresh().await, Err(GalleryError::Transport(_))));

    let mut closed = Session::open(Some(TOKEN.to_string()));
    closed.invalidate();
    let result = http.delete_photo(&closed, &PhotoId::from("any")).await;
    assert!(matches!(result, Err(GalleryError::Transport(ref m)) if m.contains("closed")));
}

#[tokio::test]
async fn test_http_backend_surfaces_validation_errors() {
    let (_dir, addr) = serve().await;
    let http = backend(addr);
    let session = Session::open(Some(TOKEN.to_string()));

    let result = http
        .upload_photo(&session, UploadFile::new("notes.txt", b"plain text".to_vec()))
        .await;
    assert!(matches!(result, Err(GalleryError::Validation(ref m)) if m == "file must be an image"));
    assert!(http.list_photos(&session, None).await.unwrap().is_empty());
}
