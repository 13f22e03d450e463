use async_trait::async_trait;
use reqwest::{multipart, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::handlers::ApiResponse;
use crate::client::GalleryBackend;
use crate::config::{ClientConfig, Session};
use crate::error::{GalleryError, Result};
use crate::models::{
    AssignFaceRequest, AssignFaceResponse, FaceId, Page, Person, PersonId, Photo, PhotoId,
    PhotoPage, UploadFile,
};
use crate::registry::PersonChoice;

/// Backend talking to a gallery server over its JSON API.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Where the stored image of a photo is served.
    pub fn image_url(&self, photo: &Photo) -> String {
        format!("{}/uploads/{}", self.base_url, photo.filename)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder, session: &Session) -> Result<RequestBuilder> {
        session.ensure_active()?;
        Ok(match session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>> {
        let response = request.send().await?;
        let status = response.status();

        let body: ApiResponse<T> = match response.json().await {
            Ok(body) => body,
            Err(e) if status.is_success() => {
                return Err(GalleryError::transport(format!("malformed response: {}", e)))
            }
            Err(_) => return Err(error_for_status(status, None)),
        };

        if status.is_success() && body.success {
            Ok(body.data)
        } else {
            Err(error_for_status(status, body.error))
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.send(request)
            .await?
            .ok_or_else(|| GalleryError::transport("response carried no data"))
    }
}

fn error_for_status(status: StatusCode, message: Option<String>) -> GalleryError {
    let message = message.unwrap_or_else(|| status.to_string());
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => GalleryError::Validation(message),
        StatusCode::NOT_FOUND => GalleryError::NotFound(message),
        StatusCode::CONFLICT => GalleryError::Consistency(message),
        _ => GalleryError::Transport(format!("{}: {}", status, message)),
    }
}

#[async_trait]
impl GalleryBackend for HttpBackend {
    async fn list_photos(&self, session: &Session, person_id: Option<&PersonId>) -> Result<Vec<Photo>> {
        let mut photos: Vec<Photo> = Vec::new();

        loop {
            let mut request = self.client.get(self.url("/gallery/photos")).query(&[
                ("skip", photos.len().to_string()),
                ("limit", Page::MAX_LIMIT.to_string()),
            ]);
            if let Some(id) = person_id {
                request = request.query(&[("person_id", id.as_str())]);
            }

            let page: PhotoPage = self.fetch(self.authorize(request, session)?).await?;
            let received = page.photos.len();
            photos.extend(page.photos);

            if received == 0 || photos.len() as i64 >= page.total {
                break;
            }
        }

        debug!("Fetched {} photos", photos.len());
        Ok(photos)
    }

    async fn list_persons(&self, session: &Session) -> Result<Vec<Person>> {
        let request = self.client.get(self.url("/gallery/persons"));
        self.fetch(self.authorize(request, session)?).await
    }

    async fn upload_photo(&self, session: &Session, file: UploadFile) -> Result<Photo> {
        let mut part = multipart::Part::bytes(file.bytes).file_name(file.file_name);
        if let Some(content_type) = &file.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| GalleryError::validation(format!("invalid content type: {}", e)))?;
        }

        let form = multipart::Form::new().part("file", part);
        let request = self.client.post(self.url("/gallery/upload")).multipart(form);
        self.fetch(self.authorize(request, session)?).await
    }

    async fn assign_face(
        &self,
        session: &Session,
        face_id: &FaceId,
        choice: &PersonChoice,
    ) -> Result<AssignFaceResponse> {
        let request = self
            .client
            .post(self.url(&format!("/gallery/faces/{}/assign", face_id)))
            .json(&AssignFaceRequest::from(choice));
        self.fetch(self.authorize(request, session)?).await
    }

    async fn delete_photo(&self, session: &Session, photo_id: &PhotoId) -> Result<()> {
        let request = self
            .client
            .delete(self.url(&format!("/gallery/photos/{}", photo_id)));
        self.send::<serde_json::Value>(self.authorize(request, session)?)
            .await
            .map(|_| ())
    }
}
