use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    #[serde(rename = "nombre")]
    pub title: String,
    #[serde(rename = "autor")]
    pub author: String,
    #[serde(rename = "ano")]
    pub year: i32,
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "imagenURL")]
    pub image_url: String,
    #[serde(rename = "copias")]
    pub copies: u32,
    #[serde(rename = "disponible")]
    pub available: bool,
    #[serde(rename = "prestadoPorID")]
    pub borrowed_by: String,
}

/// Body of `GET /libros`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooksResponse {
    #[serde(rename = "libros")]
    pub books: Vec<Book>,
    #[serde(rename = "usuario")]
    pub user: String,
    #[serde(rename = "rol")]
    pub role: String,
}

fn book(id: &str, title: &str, author: &str, year: i32, copies: u32) -> Book {
    Book {
        id: id.to_string(),
        title: title.to_string(),
        author: author.to_string(),
        year,
        description: String::new(),
        image_url: String::new(),
        copies,
        available: copies > 0,
        borrowed_by: String::new(),
    }
}

pub fn default_catalogue() -> Vec<Book> {
    vec![
        book("1", "Cien años de soledad", "Gabriel García Márquez", 1967, 3),
        book("2", "Rayuela", "Julio Cortázar", 1963, 1),
        book("3", "Ficciones", "Jorge Luis Borges", 1944, 2),
        book("4", "Pedro Páramo", "Juan Rulfo", 1955, 0),
        book("5", "El amor en los tiempos del cólera", "Gabriel García Márquez", 1985, 1),
    ]
}

/// Books whose title or author contains `query`, ignoring case. An empty query matches everything.
pub fn search<'a>(books: &'a [Book], query: &str) -> Vec<&'a Book> {
    if query.is_empty() {
        return books.iter().collect();
    }

    let query = query.to_lowercase();
    books
        .iter()
        .filter(|b| {
            b.title.to_lowercase().contains(&query) || b.author.to_lowercase().contains(&query)
        })
        .collect()
}
