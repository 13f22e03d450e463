use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::GalleryError;
use crate::models::{
    AssignFaceRequest, AssignFaceResponse, FaceId, Page, Person, PersonId, PersonUpdate, Photo,
    PhotoId, PhotoPage, UploadFile,
};
use crate::service::GalleryService;

pub struct AppState {
    pub gallery: Arc<GalleryService>,
    pub api_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}

impl GalleryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GalleryError::Validation(_) => StatusCode::BAD_REQUEST,
            GalleryError::NotFound(_) => StatusCode::NOT_FOUND,
            GalleryError::Consistency(_) => StatusCode::CONFLICT,
            GalleryError::Geometry(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GalleryError::Transport(_) => StatusCode::BAD_GATEWAY,
            GalleryError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GalleryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            GalleryError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                "internal server error".to_string()
            }
            other => {
                tracing::debug!("Request rejected ({}): {}", other.kind(), other);
                other.message()
            }
        };

        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, GalleryError>;

#[derive(Debug, Deserialize)]
pub struct PhotoQuery {
    pub person_id: Option<PersonId>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn upload_photo(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Photo> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GalleryError::validation(format!("invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| GalleryError::validation(format!("failed to read upload: {}", e)))?;

        upload = Some(UploadFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let upload = upload.ok_or_else(|| GalleryError::validation("missing multipart field `file`"))?;
    let photo = state.gallery.upload(upload).await?;
    Ok(Json(ApiResponse::success(photo)))
}

pub async fn list_photos(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PhotoQuery>,
) -> ApiResult<PhotoPage> {
    let page = Page::new(params.skip, params.limit);
    let photos = state
        .gallery
        .list_photos(params.person_id.as_ref(), page)
        .await?;
    Ok(Json(ApiResponse::success(photos)))
}

pub async fn delete_photo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<PhotoId>,
) -> ApiResult<()> {
    state.gallery.delete_photo(&id).await?;
    Ok(Json(ApiResponse::success(())))
}

pub async fn assign_face(
    State(state): State<Arc<AppState>>,
    Path(face_id): Path<FaceId>,
    Json(request): Json<AssignFaceRequest>,
) -> ApiResult<AssignFaceResponse> {
    let assigned = state.gallery.assign_face(&face_id, request).await?;
    Ok(Json(ApiResponse::success(assigned)))
}

pub async fn list_persons(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Person>> {
    let persons = state.gallery.list_persons().await?;
    Ok(Json(ApiResponse::success(persons)))
}

pub async fn update_person(
    State(state): State<Arc<AppState>>,
    Path(id): Path<PersonId>,
    Json(update): Json<PersonUpdate>,
) -> ApiResult<Person> {
    let person = state.gallery.rename_person(&id, &update.name).await?;
    Ok(Json(ApiResponse::success(person)))
}

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "smartgallery",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
