use shelf_http::csrf::CsrfToken;
use shelf_http::html::{escape, page};

/// Image URL prefix the upload directory is served under
pub const PICS_PREFIX: &str = "/pics";

pub fn gallery(filenames: &[String]) -> String {
    let body = if filenames.is_empty() {
        r#"<h1>Gallery</h1><p>No photos yet. <a href="/up">Upload one</a>.</p>"#.to_string()
    } else {
        let tiles: String = filenames
            .iter()
            .map(|name| {
                format!(
                    r#"<div class="col-sm-4"><a class="thumbnail" href="{src}"><img src="{src}" alt="{alt}"></a></div>
"#,
                    src = escape(&format!("{}/{}", PICS_PREFIX, urlencoding::encode(name))),
                    alt = escape(name),
                )
            })
            .collect();
        format!("<h1>Gallery</h1>\n<div class=\"row\">\n{tiles}</div>")
    };

    page("Gallery", &body)
}

pub fn upload_form(token: &CsrfToken, error: Option<&str>) -> String {
    let alert = error
        .map(|message| format!(r#"<div class="alert alert-warning">{}</div>"#, escape(message)))
        .unwrap_or_default();

    let body = format!(
        r#"<h1>Upload a photo</h1>
{alert}<form method="post" action="/up" enctype="multipart/form-data">
{hidden}
<div class="form-group"><input type="file" name="file" accept="image/*"></div>
<button type="submit" class="btn btn-primary">Upload</button>
</form>"#,
        hidden = token.hidden_fields(),
    );

    page("Upload", &body)
}
