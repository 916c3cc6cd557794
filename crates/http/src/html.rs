//! Minimal HTML rendering helpers shared by every page.

/// Escape HTML special characters.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Wrap `body` in the shared page chrome (head, stylesheet, navigation).
///
/// `title` is escaped; `body` must already be safe HTML.
pub fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/bootstrap@3.4.1/dist/css/bootstrap.min.css">
</head>
<body>
<nav class="navbar navbar-default">
<div class="container">
<a class="navbar-brand" href="/">Shelf</a>
<ul class="nav navbar-nav">
<li><a href="/">Gallery</a></li>
<li><a href="/up">Upload</a></li>
<li><a href="/list">Books</a></li>
<li><a href="/add">Add book</a></li>
</ul>
</div>
</nav>
<div class="container">
{body}
</div>
</body>
</html>
"#,
        title = escape(title),
        body = body,
    )
}
