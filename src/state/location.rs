//! Server locations and the ordered catalog the SDK publishes.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A concrete VPN region (one city of one country).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Opaque SDK identifier.
    pub id: String,
    /// Display country name.
    pub country: String,
    /// ISO country code.
    pub country_code: String,
    /// Display city name.
    pub city: String,
    /// City code.
    pub city_code: String,
    /// Server load in percent, when the SDK reported one.
    #[serde(default)]
    pub load: Option<u8>,
}

/// A connect target from the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    /// "Pick for me". Always the first catalog entry.
    BestAvailable {
        /// Display and search name.
        search_name: String,
    },
    Region(Region),
}

impl Location {
    /// Builds a region location.
    pub fn region(
        id: impl Into<String>,
        country: impl Into<String>,
        country_code: impl Into<String>,
        city: impl Into<String>,
        city_code: impl Into<String>,
        load: Option<u8>,
    ) -> Self {
        Self::Region(Region {
            id: id.into(),
            country: country.into(),
            country_code: country_code.into(),
            city: city.into(),
            city_code: city_code.into(),
            load,
        })
    }

    #[must_use]
    pub const fn is_best_available(&self) -> bool {
        matches!(self, Self::BestAvailable { .. })
    }

    /// Identifier persisted as the selected location.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::BestAvailable { .. } => "",
            Self::Region(region) => &region.id,
        }
    }

    #[must_use]
    pub fn country_code(&self) -> Option<&str> {
        match self {
            Self::BestAvailable { .. } => None,
            Self::Region(region) => Some(&region.country_code),
        }
    }

    #[must_use]
    pub fn city_code(&self) -> Option<&str> {
        match self {
            Self::BestAvailable { .. } => None,
            Self::Region(region) => Some(&region.city_code),
        }
    }

    /// Case-insensitive match against country/city, or the search name.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        match self {
            Self::BestAvailable { search_name } => search_name.to_lowercase().contains(&query),
            Self::Region(region) => {
                region.country.to_lowercase().contains(&query)
                    || region.city.to_lowercase().contains(&query)
            }
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BestAvailable { search_name } => write!(f, "{search_name}"),
            Self::Region(region) => write!(f, "{}, {}", region.city, region.country),
        }
    }
}

/// Sort key for catalog presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortKey {
    Load,
    City,
}

/// Sort direction for catalog presentation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Ordered location catalog.
///
/// Index 0 always holds the single [`Location::BestAvailable`] entry when the
/// SDK published one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocationCatalog {
    entries: Vec<Location>,
}

impl LocationCatalog {
    /// Builds a catalog, moving the best-available entry to the front and
    /// dropping any duplicates of it.
    #[must_use]
    pub fn new(locations: Vec<Location>) -> Self {
        let mut best = None;
        let mut regions = Vec::with_capacity(locations.len());
        for location in locations {
            if location.is_best_available() {
                if best.is_none() {
                    best = Some(location);
                }
            } else {
                regions.push(location);
            }
        }
        let mut entries = Vec::with_capacity(regions.len() + 1);
        entries.extend(best);
        entries.extend(regions);
        Self { entries }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.entries.iter()
    }

    /// First catalog entry; the best-available marker when present.
    #[must_use]
    pub fn first(&self) -> Option<&Location> {
        self.entries.first()
    }

    #[must_use]
    pub fn by_id(&self, id: &str) -> Option<&Location> {
        self.entries.iter().find(|l| !id.is_empty() && l.id() == id)
    }

    #[must_use]
    pub fn by_city_code(&self, city_code: &str) -> Option<&Location> {
        self.entries
            .iter()
            .find(|l| l.city_code() == Some(city_code))
    }

    /// All regions of one country, in catalog order.
    #[must_use]
    pub fn in_country(&self, country_code: &str) -> Vec<Location> {
        self.entries
            .iter()
            .filter(|l| l.country_code() == Some(country_code))
            .cloned()
            .collect()
    }

    /// Entries matching a search query, best-available first.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<&Location> {
        self.entries.iter().filter(|l| l.matches(query)).collect()
    }

    /// Presentation order. Best-available stays first in both directions.
    #[must_use]
    pub fn sorted(&self, key: SortKey, direction: SortDirection) -> Vec<&Location> {
        let mut view: Vec<&Location> = self.entries.iter().collect();
        view.sort_by(|a, b| compare(a, b, key, direction));
        view
    }
}

fn compare(a: &Location, b: &Location, key: SortKey, direction: SortDirection) -> Ordering {
    let (a, b) = match (a, b) {
        (Location::BestAvailable { .. }, Location::BestAvailable { .. }) => return Ordering::Equal,
        (Location::BestAvailable { .. }, _) => return Ordering::Less,
        (_, Location::BestAvailable { .. }) => return Ordering::Greater,
        (Location::Region(a), Location::Region(b)) => (a, b),
    };

    let ordering = match key {
        // Unknown load sorts ahead of any reported load
        SortKey::Load => a.load.cmp(&b.load),
        SortKey::City => a.city.cmp(&b.city),
    };

    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn best() -> Location {
        Location::BestAvailable {
            search_name: "Best Available".to_string(),
        }
    }

    fn sample() -> LocationCatalog {
        LocationCatalog::new(vec![
            Location::region("1", "Netherlands", "NL", "Amsterdam", "ams", Some(40)),
            best(),
            Location::region("2", "United States", "US", "New York", "nyc", Some(10)),
            Location::region("3", "United States", "US", "Chicago", "chi", None),
            best(),
        ])
    }

    #[test]
    fn test_best_available_moved_first_and_deduplicated() {
        let catalog = sample();
        assert_eq!(catalog.len(), 4);
        assert!(catalog.first().is_some_and(Location::is_best_available));
        assert_eq!(catalog.iter().filter(|l| l.is_best_available()).count(), 1);
    }

    #[test]
    fn test_sort_by_load_keeps_best_available_first() {
        let catalog = sample();
        let asc: Vec<&str> = catalog
            .sorted(SortKey::Load, SortDirection::Ascending)
            .iter()
            .map(|l| l.id())
            .collect();
        assert_eq!(asc, vec!["", "3", "2", "1"]);

        let desc: Vec<&str> = catalog
            .sorted(SortKey::Load, SortDirection::Descending)
            .iter()
            .map(|l| l.id())
            .collect();
        assert_eq!(desc, vec!["", "1", "2", "3"]);
    }

    #[test]
    fn test_sort_by_city() {
        let catalog = sample();
        let names: Vec<String> = catalog
            .sorted(SortKey::City, SortDirection::Ascending)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            names,
            vec![
                "Best Available",
                "Amsterdam, Netherlands",
                "Chicago, United States",
                "New York, United States"
            ]
        );
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let catalog = sample();
        assert_eq!(catalog.search("united").len(), 2);
        assert_eq!(catalog.search("AMSTER").len(), 1);
        assert_eq!(catalog.search("best").len(), 1);
        assert_eq!(catalog.search("").len(), 4);
    }

    #[test]
    fn test_lookups() {
        let catalog = sample();
        assert_eq!(catalog.by_id("2").map(Location::id), Some("2"));
        assert!(catalog.by_id("").is_none());
        assert_eq!(catalog.by_city_code("chi").map(Location::id), Some("3"));
        assert_eq!(catalog.in_country("US").len(), 2);
        assert!(catalog.in_country("DE").is_empty());
    }
}
