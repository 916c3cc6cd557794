//! SQLite-backed record store for books.

use rusqlite::{params, ErrorCode, OptionalExtension, Row};
use shelf_db::{Database, DbError};
use thiserror::Error;

use super::models::{Book, BookEdit, NewBook};

const BOOK_COLUMNS: &str = "id, number, title, author, year, pages";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("a book with number {0} already exists")]
    DuplicateNumber(u32),

    #[error("book {0} does not exist")]
    NotFound(i64),

    #[error(transparent)]
    Database(#[from] DbError),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(DbError::Sqlite(err))
    }
}

/// Book persistence. Every operation is a single statement; there is no cache.
#[derive(Clone)]
pub struct BookStore {
    db: Database,
}

impl BookStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new book. Fails with `DuplicateNumber` when the number is taken.
    pub async fn create(&self, book: NewBook) -> Result<Book, StoreError> {
        let number = book.number;
        let created = self
            .db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO books (number, title, author, year, pages) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![book.number, book.title, book.author, book.year, book.pages],
                )
                .map_err(|err| {
                    if is_unique_violation(&err) {
                        StoreError::DuplicateNumber(number)
                    } else {
                        err.into()
                    }
                })?;

                Ok::<_, StoreError>(book.into_book(conn.last_insert_rowid()))
            })
            .await?;

        tracing::info!(id = created.id, number = created.number, "book created");
        Ok(created)
    }

    /// All books, ascending by number.
    pub async fn list_ordered(&self) -> Result<Vec<Book>, StoreError> {
        self.db
            .call(|conn| {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {BOOK_COLUMNS} FROM books ORDER BY number ASC"
                ))?;
                let books = stmt
                    .query_map([], book_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok::<_, StoreError>(books)
            })
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Book, StoreError> {
        self.db
            .call(move |conn| {
                conn.query_row(
                    &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
                    params![id],
                    book_from_row,
                )
                .optional()?
                .ok_or(StoreError::NotFound(id))
            })
            .await
    }

    /// Replace title, author, year and pages of an existing book.
    pub async fn update(&self, id: i64, edit: BookEdit) -> Result<Book, StoreError> {
        let updated = self
            .db
            .call(move |conn| {
                conn.query_row(
                    &format!(
                        "UPDATE books SET title = ?1, author = ?2, year = ?3, pages = ?4 \
                         WHERE id = ?5 RETURNING {BOOK_COLUMNS}"
                    ),
                    params![edit.title, edit.author, edit.year, edit.pages, id],
                    book_from_row,
                )
                .optional()?
                .ok_or(StoreError::NotFound(id))
            })
            .await?;

        tracing::info!(id, number = updated.number, "book updated");
        Ok(updated)
    }

    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.db
            .call(move |conn| {
                match conn.execute("DELETE FROM books WHERE id = ?1", params![id])? {
                    0 => Err(StoreError::NotFound(id)),
                    _ => Ok(()),
                }
            })
            .await?;

        tracing::info!(id, "book deleted");
        Ok(())
    }
}

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        number: row.get(1)?,
        title: row.get(2)?,
        author: row.get(3)?,
        year: row.get(4)?,
        pages: row.get(5)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == ErrorCode::ConstraintViolation
                && failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::BooksModule;

    async fn store() -> BookStore {
        let db = Database::open_in_memory().unwrap();
        let migrations = BooksModule::schema()
            .into_iter()
            .map(|migration| ("books".to_string(), migration))
            .collect();
        db.migrate(migrations).await.unwrap();
        BookStore::new(db)
    }

    fn new_book(number: u32, title: &str) -> NewBook {
        NewBook {
            number,
            title: title.to_string(),
            author: "Herbert".to_string(),
            year: 1965,
            pages: 412,
        }
    }

    #[tokio::test]
    async fn list_is_ordered_by_number() {
        let store = store().await;
        store.create(new_book(40, "Children of Dune")).await.unwrap();
        store.create(new_book(7, "Dune Messiah")).await.unwrap();
        let dune = store.create(new_book(5, "Dune")).await.unwrap();

        let books = store.list_ordered().await.unwrap();
        let numbers: Vec<u32> = books.iter().map(|b| b.number).collect();
        assert_eq!(numbers, vec![5, 7, 40]);
        assert_eq!(books[0], dune);
    }

    #[tokio::test]
    async fn duplicate_number_keeps_first_book() {
        let store = store().await;
        let first = store.create(new_book(3, "First")).await.unwrap();

        let err = store.create(new_book(3, "Second")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateNumber(3)));

        assert_eq!(store.list_ordered().await.unwrap(), vec![first]);
    }

    #[tokio::test]
    async fn update_keeps_id_and_number() {
        let store = store().await;
        let book = store.create(new_book(12, "Dune")).await.unwrap();

        let edit = BookEdit {
            title: "Dune (revised)".to_string(),
            author: "Frank Herbert".to_string(),
            year: 1966,
            pages: 500,
        };
        let updated = store.update(book.id, edit).await.unwrap();

        let fetched = store.get(book.id).await.unwrap();
        assert_eq!(fetched, updated);
        assert_eq!(fetched.id, book.id);
        assert_eq!(fetched.number, 12);
        assert_eq!(fetched.title, "Dune (revised)");
        assert_eq!(fetched.author, "Frank Herbert");
        assert_eq!(fetched.year, 1966);
        assert_eq!(fetched.pages, 500);
    }

    #[tokio::test]
    async fn missing_ids_are_not_found() {
        let store = store().await;
        let edit = BookEdit {
            title: "x".to_string(),
            author: "y".to_string(),
            year: 1,
            pages: 1,
        };

        assert!(matches!(store.get(99).await, Err(StoreError::NotFound(99))));
        assert!(matches!(
            store.update(99, edit).await,
            Err(StoreError::NotFound(99))
        ));
        assert!(matches!(store.delete(99).await, Err(StoreError::NotFound(99))));
    }

    #[tokio::test]
    async fn delete_twice_fails_the_second_time() {
        let store = store().await;
        let keep = store.create(new_book(1, "Keep")).await.unwrap();
        let gone = store.create(new_book(2, "Gone")).await.unwrap();

        store.delete(gone.id).await.unwrap();
        assert_eq!(store.list_ordered().await.unwrap(), vec![keep]);

        assert!(matches!(
            store.delete(gone.id).await,
            Err(StoreError::NotFound(id)) if id == gone.id
        ));
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let store = store().await;
        let first = store.create(new_book(1, "One")).await.unwrap();
        store.delete(first.id).await.unwrap();

        let second = store.create(new_book(1, "One again")).await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn schema_rejects_overlong_titles() {
        let store = store().await;
        let err = store
            .create(new_book(9, &"x".repeat(251)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
        assert!(store.list_ordered().await.unwrap().is_empty());
    }
}
