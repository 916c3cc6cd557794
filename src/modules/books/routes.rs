use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use shelf_http::{error::AppError, found};

use super::form::{self, BookForm, ValidationErrors};
use super::store::StoreError;
use super::views::{self, FormMode};
use crate::context::AppContext;

/// HTTP routes for the catalog
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/add", get(add_form).post(add_book))
        .route("/list", get(list_books))
        .route("/delete", get(delete_book))
        .route("/edit", get(edit_form).post(edit_book))
        .with_state(ctx)
}

#[derive(Debug, Deserialize)]
struct DeleteParams {
    book_id_to_delete: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EditParams {
    book_id_to_edit: Option<String>,
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AppError::not_found(format!("book {} does not exist", id)),
            err @ StoreError::DuplicateNumber(_) => AppError::conflict(err.to_string()),
            StoreError::Database(err) => AppError::Internal(err.into()),
        }
    }
}

async fn list_books(State(ctx): State<AppContext>) -> Result<Html<String>, AppError> {
    let books = ctx.books.list_ordered().await?;
    Ok(Html(views::book_list(&books)))
}

async fn add_form(State(ctx): State<AppContext>, jar: CookieJar) -> (CookieJar, Html<String>) {
    let (jar, token) = ctx.csrf.begin(jar);
    let html = views::book_form(
        FormMode::Add,
        &BookForm::default(),
        &ValidationErrors::default(),
        &token,
    );
    (jar, Html(html))
}

async fn add_book(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    Form(submitted): Form<BookForm>,
) -> Result<Response, AppError> {
    check_csrf(&ctx, &jar, &submitted)?;

    let new_book = match form::validate_new(&submitted) {
        Ok(book) => book,
        Err(errors) => {
            let fields: Vec<&str> = errors.fields().collect();
            tracing::debug!(?fields, "add form rejected");
            return Ok(rerender(
                &ctx,
                jar,
                FormMode::Add,
                &submitted,
                &errors,
                StatusCode::UNPROCESSABLE_ENTITY,
            ));
        }
    };

    match ctx.books.create(new_book).await {
        Ok(_) => Ok(found("/list")),
        Err(err @ StoreError::DuplicateNumber(_)) => {
            let mut errors = ValidationErrors::default();
            errors.add("number", err.to_string());
            Ok(rerender(
                &ctx,
                jar,
                FormMode::Add,
                &submitted,
                &errors,
                StatusCode::CONFLICT,
            ))
        }
        Err(err) => Err(err.into()),
    }
}

async fn delete_book(
    State(ctx): State<AppContext>,
    Query(params): Query<DeleteParams>,
) -> Result<Response, AppError> {
    let id = parse_id("book_id_to_delete", params.book_id_to_delete.as_deref())?;
    ctx.books.delete(id).await?;
    Ok(found("/list"))
}

async fn edit_form(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    Query(params): Query<EditParams>,
) -> Result<(CookieJar, Html<String>), AppError> {
    let id = parse_id("book_id_to_edit", params.book_id_to_edit.as_deref())?;
    let book = ctx.books.get(id).await?;

    let values = BookForm {
        title: book.title.clone(),
        author: book.author.clone(),
        year: book.year.to_string(),
        pages: book.pages.to_string(),
        ..BookForm::default()
    };

    let (jar, token) = ctx.csrf.begin(jar);
    let html = views::book_form(
        FormMode::Edit(&book),
        &values,
        &ValidationErrors::default(),
        &token,
    );
    Ok((jar, Html(html)))
}

async fn edit_book(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    Query(params): Query<EditParams>,
    Form(submitted): Form<BookForm>,
) -> Result<Response, AppError> {
    check_csrf(&ctx, &jar, &submitted)?;

    let id = parse_id("book_id_to_edit", params.book_id_to_edit.as_deref())?;
    let book = ctx.books.get(id).await?;

    match form::validate_edit(&submitted) {
        Ok(edit) => {
            ctx.books.update(book.id, edit).await?;
            Ok(found("/list"))
        }
        Err(errors) => Ok(rerender(
            &ctx,
            jar,
            FormMode::Edit(&book),
            &submitted,
            &errors,
            StatusCode::UNPROCESSABLE_ENTITY,
        )),
    }
}

fn check_csrf(ctx: &AppContext, jar: &CookieJar, submitted: &BookForm) -> Result<(), AppError> {
    ctx.csrf
        .verify(
            jar,
            submitted.csrf_nonce.as_deref(),
            submitted.csrf_token.as_deref(),
        )
        .map_err(|err| AppError::forbidden(err.to_string()))
}

fn rerender(
    ctx: &AppContext,
    jar: CookieJar,
    mode: FormMode<'_>,
    submitted: &BookForm,
    errors: &ValidationErrors,
    status: StatusCode,
) -> Response {
    let (jar, token) = ctx.csrf.begin(jar);
    let html = views::book_form(mode, submitted, errors, &token);
    (status, jar, Html(html)).into_response()
}

fn parse_id(param: &str, raw: Option<&str>) -> Result<i64, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::bad_request(format!("missing query parameter '{}'", param)))?;

    raw.parse()
        .map_err(|_| AppError::bad_request(format!("'{}' is not a valid book id", raw)))
}
