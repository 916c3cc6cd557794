use shelf_http::csrf::CsrfToken;
use shelf_http::html::{escape, page};

use super::form::{BookForm, ValidationErrors};
use super::models::Book;

/// Which book form is being rendered.
pub enum FormMode<'a> {
    Add,
    Edit(&'a Book),
}

pub fn book_list(books: &[Book]) -> String {
    let rows: String = books
        .iter()
        .map(|book| {
            format!(
                r#"<tr>
<td>{number}</td><td>{title}</td><td>{author}</td><td>{year}</td><td>{pages}</td>
<td><a href="/edit?book_id_to_edit={id}">Edit</a> &middot; <a href="/delete?book_id_to_delete={id}">Delete</a></td>
</tr>
"#,
                number = book.number,
                title = escape(&book.title),
                author = escape(&book.author),
                year = book.year,
                pages = book.pages,
                id = book.id,
            )
        })
        .collect();

    let body = if books.is_empty() {
        r#"<h1>Books</h1><p>The library is empty. <a href="/add">Add a book</a>.</p>"#.to_string()
    } else {
        format!(
            r#"<h1>Books</h1>
<table class="table table-striped">
<thead><tr><th>#</th><th>Title</th><th>Author</th><th>Year</th><th>Pages</th><th></th></tr></thead>
<tbody>
{rows}</tbody>
</table>
<p><a class="btn btn-primary" href="/add">Add a book</a></p>"#
        )
    };

    page("Books", &body)
}

pub fn book_form(
    mode: FormMode<'_>,
    values: &BookForm,
    errors: &ValidationErrors,
    token: &CsrfToken,
) -> String {
    let (heading, action, number_field) = match mode {
        FormMode::Add => (
            "Add a book".to_string(),
            "/add".to_string(),
            input("number", "Number", "number", &values.number, errors),
        ),
        FormMode::Edit(book) => (
            format!("Edit \u{201c}{}\u{201d}", escape(&book.title)),
            format!("/edit?book_id_to_edit={}", book.id),
            format!(
                r#"<div class="form-group"><label>Number</label><p class="form-control-static">{}</p></div>"#,
                book.number
            ),
        ),
    };

    let body = format!(
        r#"<h1>{heading}</h1>
<form method="post" action="{action}">
{hidden}
{number_field}
{title}
{author}
{year}
{pages}
<button type="submit" class="btn btn-primary">Upload</button>
</form>"#,
        hidden = token.hidden_fields(),
        title = input("title", "Title", "text", &values.title, errors),
        author = input("author", "Author", "text", &values.author, errors),
        year = input("year", "Year", "number", &values.year, errors),
        pages = input("pages", "Pages", "number", &values.pages, errors),
    );

    page("Book", &body)
}

fn input(name: &str, label: &str, kind: &str, value: &str, errors: &ValidationErrors) -> String {
    let messages = errors.get(name);
    let state = if messages.is_empty() { "" } else { " has-error" };
    let help: String = messages
        .iter()
        .map(|message| format!(r#"<span class="help-block">{}</span>"#, escape(message)))
        .collect();

    format!(
        r#"<div class="form-group{state}"><label for="{name}">{label}</label><input class="form-control" id="{name}" name="{name}" type="{kind}" value="{value}">{help}</div>"#,
        value = escape(value),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn token() -> CsrfToken {
        shelf_http::csrf::CsrfGuard::new("views", Duration::from_secs(60))
            .unwrap()
            .issue("client")
    }

    fn book() -> Book {
        Book {
            id: 3,
            number: 5,
            title: "Dune & Co".to_string(),
            author: "Herbert".to_string(),
            year: 1965,
            pages: 412,
        }
    }

    #[test]
    fn list_links_edit_and_delete_by_id() {
        let html = book_list(&[book()]);
        assert!(html.contains("Dune &amp; Co"));
        assert!(html.contains("/edit?book_id_to_edit=3"));
        assert!(html.contains("/delete?book_id_to_delete=3"));
    }

    #[test]
    fn edit_form_does_not_bind_number() {
        let book = book();
        let values = BookForm {
            title: book.title.clone(),
            ..BookForm::default()
        };
        let html = book_form(
            FormMode::Edit(&book),
            &values,
            &ValidationErrors::default(),
            &token(),
        );

        assert!(!html.contains(r#"name="number""#));
        assert!(html.contains(r#"action="/edit?book_id_to_edit=3""#));
        assert!(html.contains(r#"value="Dune &amp; Co""#));
    }

    #[test]
    fn add_form_shows_field_errors() {
        let mut errors = ValidationErrors::default();
        errors.add("year", "Number must be between 0 and 2021.");
        let html = book_form(FormMode::Add, &BookForm::default(), &errors, &token());

        assert!(html.contains(r#"name="number""#));
        assert!(html.contains("has-error"));
        assert!(html.contains("Number must be between 0 and 2021."));
    }
}
