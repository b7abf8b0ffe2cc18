//! Typed identifiers for set members.
//!
//! Every set member (region, technology, fuel, ...) is referred to through a
//! dedicated newtype over a shared string, so that index tuples cannot mix up
//! dimensions. IDs are cheap to clone and safe to move across worker threads.
use std::sync::Arc;

macro_rules! define_id_type {
    ($name:ident) => {
        /// An identifier for one member of the corresponding set
        #[derive(
            Clone,
            std::hash::Hash,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            serde::Deserialize,
            serde::Serialize,
            Debug,
        )]
        pub struct $name(pub Arc<str>);

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(Arc::from(s))
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(Arc::from(s))
            }
        }

        impl $name {
            /// Create a new ID from a string slice
            pub fn new(id: &str) -> Self {
                $name(Arc::from(id))
            }

            /// The ID as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id_type!(RegionID);
define_id_type!(TechnologyID);
define_id_type!(FuelID);
define_id_type!(EmissionID);
define_id_type!(ModeID);
define_id_type!(TimesliceID);
define_id_type!(StorageID);
define_id_type!(LineID);

/// A modeled year.
///
/// Years are plain integers rather than IDs: they are ordered, subtracted for
/// lifetime and discounting arithmetic, and serialized as numbers.
pub type Year = i32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_round_trip() {
        let id = RegionID::new("GBR");
        assert_eq!(id.as_str(), "GBR");
        assert_eq!(id.to_string(), "GBR");
        assert_eq!(id, "GBR".into());
    }

    #[test]
    fn test_id_ordering() {
        let mut ids: Vec<TechnologyID> = vec!["wind".into(), "coal".into(), "gas".into()];
        ids.sort();
        let names: Vec<_> = ids.iter().map(TechnologyID::as_str).collect();
        assert_eq!(names, ["coal", "gas", "wind"]);
    }
}
