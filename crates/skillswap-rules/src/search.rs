use skillswap_types::api::SkillSummary;
use skillswap_types::models::Skill;

/// Anything the catalog search can match on.
pub trait Searchable {
    fn search_name(&self) -> &str;
}

impl Searchable for Skill {
    fn search_name(&self) -> &str {
        &self.name
    }
}

impl Searchable for SkillSummary {
    fn search_name(&self) -> &str {
        &self.name
    }
}

/// Case-insensitive substring match on the name.
pub fn matches<T: Searchable>(item: &T, query: &str) -> bool {
    let query = query.trim();
    query.is_empty() || item.search_name().to_lowercase().contains(&query.to_lowercase())
}

/// Keeps the items whose name contains `query`, in their original order.
/// A blank query keeps everything.
pub fn filter<T: Searchable>(items: Vec<T>, query: &str) -> Vec<T> {
    if query.trim().is_empty() {
        return items;
    }
    items.into_iter().filter(|item| matches(item, query)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl Searchable for Named {
        fn search_name(&self) -> &str {
            self.0
        }
    }

    fn names(items: Vec<Named>) -> Vec<&'static str> {
        items.into_iter().map(|n| n.0).collect()
    }

    fn catalog() -> Vec<Named> {
        vec![
            Named("Acoustic Guitar"),
            Named("Digital Illustration"),
            Named("Guitar Chords 101"),
            Named("Creative Writing"),
        ]
    }

    #[test]
    fn case_insensitive_substring() {
        assert_eq!(
            names(filter(catalog(), "guitar")),
            vec!["Acoustic Guitar", "Guitar Chords 101"]
        );
        assert_eq!(names(filter(catalog(), "WRIT")), vec!["Creative Writing"]);
    }

    #[test]
    fn blank_query_returns_everything_in_order() {
        assert_eq!(names(filter(catalog(), "")).len(), 4);
        assert_eq!(
            names(filter(catalog(), "   ")),
            names(catalog())
        );
    }

    #[test]
    fn no_match_is_empty() {
        assert!(filter(catalog(), "pottery").is_empty());
    }

    #[test]
    fn single_item_match() {
        assert!(matches(&Named("Acoustic Guitar"), "GUITAR"));
        assert!(!matches(&Named("Acoustic Guitar"), "piano"));
    }
}
