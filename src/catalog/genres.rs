use super::types::{Genre, GenreId};

/// TMDB movie genres, in display order for browse rows.
const GENRES: &[(GenreId, &str)] = &[
    (28, "Action"),
    (12, "Adventure"),
    (16, "Animation"),
    (35, "Comedy"),
    (80, "Crime"),
    (99, "Documentary"),
    (18, "Drama"),
    (10751, "Family"),
    (14, "Fantasy"),
    (36, "History"),
    (27, "Horror"),
    (10402, "Music"),
    (9648, "Mystery"),
    (10749, "Romance"),
    (878, "Science Fiction"),
    (10770, "TV Movie"),
    (53, "Thriller"),
    (10752, "War"),
    (37, "Western"),
];

pub fn genre_name(id: GenreId) -> Option<&'static str> {
    GENRES
        .iter()
        .find(|(genre_id, _)| *genre_id == id)
        .map(|(_, name)| *name)
}

pub fn all_genres() -> Vec<Genre> {
    GENRES
        .iter()
        .map(|(id, name)| Genre {
            id: *id,
            name: (*name).to_string(),
        })
        .collect()
}

/// Resolve a genre from user input: a numeric id or a case-insensitive name.
pub fn find_genre(input: &str) -> Option<Genre> {
    let trimmed = input.trim();
    let found = match trimmed.parse::<GenreId>() {
        Ok(id) => GENRES.iter().find(|(genre_id, _)| *genre_id == id),
        Err(_) => GENRES
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(trimmed)),
    };
    found.map(|(id, name)| Genre {
        id: *id,
        name: (*name).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genre_name_lookup() {
        assert_eq!(genre_name(878), Some("Science Fiction"));
        assert_eq!(genre_name(1), None);
    }

    #[test]
    fn test_find_genre_by_id_or_name() {
        assert_eq!(find_genre("35").map(|g| g.name), Some("Comedy".to_string()));
        assert_eq!(find_genre(" horror ").map(|g| g.id), Some(27));
        assert_eq!(find_genre("tv movie").map(|g| g.id), Some(10770));
        assert!(find_genre("polka").is_none());
        assert!(find_genre("4242").is_none());
    }

    #[test]
    fn test_all_genres_unique_ids() {
        let genres = all_genres();
        let mut ids: Vec<_> = genres.iter().map(|g| g.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), genres.len());
    }
}
