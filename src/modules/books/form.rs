//! Submitted book form fields and their validation rules.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::Deserialize;

use super::models::{BookEdit, NewBook};

pub const NUMBER_RANGE: RangeInclusive<i64> = 0..=100;
pub const YEAR_RANGE: RangeInclusive<i64> = 0..=2021;
pub const PAGES_RANGE: RangeInclusive<i64> = 0..=5000;
pub const MAX_TEXT_LEN: usize = 250;

const REQUIRED: &str = "This field is required.";
const NOT_AN_INTEGER: &str = "Not a valid integer value.";

/// Raw form submission. Every field arrives as text so that bad input is
/// reported per field instead of rejecting the whole request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookForm {
    pub number: String,
    pub title: String,
    pub author: String,
    pub year: String,
    pub pages: String,
    pub csrf_nonce: Option<String>,
    pub csrf_token: Option<String>,
}

/// Field name → messages for every rule that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<&'static str, Vec<String>>,
}

impl ValidationErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.keys().copied()
    }
}

/// Validate every field of the add form.
pub fn validate_new(form: &BookForm) -> Result<NewBook, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let number = integer_in(&mut errors, "number", &form.number, NUMBER_RANGE);
    let edit = edit_fields(&mut errors, form);

    match (number, edit) {
        (Some(number), Some(edit)) if errors.is_empty() => Ok(NewBook {
            number,
            title: edit.title,
            author: edit.author,
            year: edit.year,
            pages: edit.pages,
        }),
        _ => Err(errors),
    }
}

/// Validate the fields an edit may change. `number` is ignored.
pub fn validate_edit(form: &BookForm) -> Result<BookEdit, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    match edit_fields(&mut errors, form) {
        Some(edit) if errors.is_empty() => Ok(edit),
        _ => Err(errors),
    }
}

fn edit_fields(errors: &mut ValidationErrors, form: &BookForm) -> Option<BookEdit> {
    let title = required_text(errors, "title", &form.title);
    let author = required_text(errors, "author", &form.author);
    let year = integer_in(errors, "year", &form.year, YEAR_RANGE);
    let pages = integer_in(errors, "pages", &form.pages, PAGES_RANGE);

    Some(BookEdit {
        title: title?,
        author: author?,
        year: year?,
        pages: pages?,
    })
}

fn required_text(errors: &mut ValidationErrors, field: &'static str, raw: &str) -> Option<String> {
    let value = raw.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
        return None;
    }
    if value.chars().count() > MAX_TEXT_LEN {
        errors.add(
            field,
            format!("Field cannot be longer than {} characters.", MAX_TEXT_LEN),
        );
        return None;
    }
    Some(value.to_string())
}

fn integer_in(
    errors: &mut ValidationErrors,
    field: &'static str,
    raw: &str,
    range: RangeInclusive<i64>,
) -> Option<u32> {
    let value = raw.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
        return None;
    }

    let Ok(parsed) = value.parse::<i64>() else {
        errors.add(field, NOT_AN_INTEGER);
        return None;
    };

    if !range.contains(&parsed) {
        errors.add(
            field,
            format!(
                "Number must be between {} and {}.",
                range.start(),
                range.end()
            ),
        );
        return None;
    }

    u32::try_from(parsed).ok()
}
