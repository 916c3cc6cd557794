/// A catalog record as stored in the `books` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    /// Store-assigned identifier, never reused
    pub id: i64,
    /// Catalog number, unique across all books
    pub number: u32,
    pub title: String,
    pub author: String,
    /// Publication year
    pub year: u32,
    pub pages: u32,
}

/// Validated fields for creating a book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub number: u32,
    pub title: String,
    pub author: String,
    pub year: u32,
    pub pages: u32,
}

impl NewBook {
    pub(crate) fn into_book(self, id: i64) -> Book {
        Book {
            id,
            number: self.number,
            title: self.title,
            author: self.author,
            year: self.year,
            pages: self.pages,
        }
    }
}

/// Validated fields an edit may change. `id` and `number` are fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookEdit {
    pub title: String,
    pub author: String,
    pub year: u32,
    pub pages: u32,
}
