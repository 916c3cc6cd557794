use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use shelf_http::{csrf, error::AppError, found};
use tower_http::services::ServeDir;

use super::store::PhotoError;
use super::views::{self, PICS_PREFIX};
use crate::context::AppContext;

/// Form field holding the uploaded file
const FILE_FIELD: &str = "file";

/// HTTP routes for the gallery and uploads
pub fn router(ctx: AppContext) -> Router {
    let pics = ServeDir::new(ctx.photos.dir());

    Router::new()
        .route("/", get(gallery))
        .route("/up", get(upload_form).post(upload))
        .nest_service(PICS_PREFIX, pics)
        .with_state(ctx)
}

impl From<PhotoError> for AppError {
    fn from(err: PhotoError) -> Self {
        match err {
            PhotoError::Io(err) => AppError::Internal(err.into()),
            other => AppError::bad_request(other.to_string()),
        }
    }
}

async fn gallery(State(ctx): State<AppContext>) -> Result<Html<String>, AppError> {
    let filenames = ctx.photos.list().await?;
    Ok(Html(views::gallery(&filenames)))
}

async fn upload_form(State(ctx): State<AppContext>, jar: CookieJar) -> (CookieJar, Html<String>) {
    let (jar, token) = ctx.csrf.begin(jar);
    (jar, Html(views::upload_form(&token, None)))
}

async fn upload(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut nonce = None;
    let mut token = None;
    let mut file: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(csrf::NONCE_FIELD) => nonce = Some(field.text().await.map_err(multipart_error)?),
            Some(csrf::TOKEN_FIELD) => token = Some(field.text().await.map_err(multipart_error)?),
            Some(FILE_FIELD) => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((filename, bytes));
            }
            _ => {}
        }
    }

    ctx.csrf
        .verify(&jar, nonce.as_deref(), token.as_deref())
        .map_err(|err| AppError::forbidden(err.to_string()))?;

    let Some((filename, bytes)) = file else {
        return Ok(reject(&ctx, jar, &PhotoError::NoFileProvided));
    };

    match ctx.photos.save(&filename, &bytes).await {
        Ok(_) => Ok(found("/")),
        Err(err @ (PhotoError::NoFileProvided | PhotoError::InvalidFilename(_))) => {
            Ok(reject(&ctx, jar, &err))
        }
        Err(err) => Err(err.into()),
    }
}

/// Re-render the upload form explaining why nothing was stored.
fn reject(ctx: &AppContext, jar: CookieJar, err: &PhotoError) -> Response {
    tracing::debug!(error = %err, "upload rejected");
    let message = match err {
        PhotoError::NoFileProvided => "No file selected.".to_string(),
        other => other.to_string(),
    };
    let (jar, token) = ctx.csrf.begin(jar);
    let html = views::upload_form(&token, Some(&message));
    (StatusCode::BAD_REQUEST, jar, Html(html)).into_response()
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::bad_request(err.body_text())
}
