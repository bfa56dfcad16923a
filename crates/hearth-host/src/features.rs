//! Feature bitset controlling optional host capabilities.
//!
//! Two derived effects hang off this set during `on_after_init`: a disabled
//! format feature adds its short name to the ignored-metadata-formats set,
//! and a disabled capability removes every plugin carrying that capability
//! descriptor from the registry.

use hearth_core::Format;
use serde::de::{SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A named optional capability of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// XML format endpoints.
    Xml,
    /// JSON format endpoints.
    Json,
    /// JSV format endpoints.
    Jsv,
    /// CSV format endpoints.
    Csv,
    /// HTML format endpoints.
    Html,
    /// SOAP 1.1 endpoints.
    Soap11,
    /// SOAP 1.2 endpoints.
    Soap12,
    /// Markdown format endpoints.
    Markdown,
    /// Predefined `/reply/{operation}` routes.
    PredefinedRoutes,
    /// The metadata/discovery surface.
    Metadata,
    /// The request-info diagnostic surface.
    RequestInfo,
    /// Razor view rendering.
    Razor,
    /// ProtoBuf format endpoints.
    ProtoBuf,
    /// MessagePack format endpoints.
    MsgPack,
}

impl Feature {
    const COUNT: u32 = 14;

    const fn bit(self) -> u32 {
        1 << self as u32
    }

    /// All features, in declaration order.
    pub const ALL: [Feature; Self::COUNT as usize] = [
        Feature::Xml,
        Feature::Json,
        Feature::Jsv,
        Feature::Csv,
        Feature::Html,
        Feature::Soap11,
        Feature::Soap12,
        Feature::Markdown,
        Feature::PredefinedRoutes,
        Feature::Metadata,
        Feature::RequestInfo,
        Feature::Razor,
        Feature::ProtoBuf,
        Feature::MsgPack,
    ];

    /// The format this feature gates, if it is a format feature.
    ///
    /// Only the formats listed here participate in the
    /// ignored-metadata-formats reconciliation; Markdown and the binary
    /// formats never appear on that surface.
    pub fn metadata_format(self) -> Option<Format> {
        match self {
            Feature::Xml => Some(Format::Xml),
            Feature::Json => Some(Format::Json),
            Feature::Jsv => Some(Format::Jsv),
            Feature::Csv => Some(Format::Csv),
            Feature::Html => Some(Format::Html),
            Feature::Soap11 => Some(Format::Soap11),
            Feature::Soap12 => Some(Format::Soap12),
            _ => None,
        }
    }
}

/// A set of [`Feature`]s backed by a bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSet(u32);

impl FeatureSet {
    /// The empty set.
    pub const EMPTY: FeatureSet = FeatureSet(0);

    /// Every feature enabled.
    pub const ALL: FeatureSet = FeatureSet((1 << Feature::COUNT) - 1);

    /// Whether `feature` is enabled.
    pub fn contains(self, feature: Feature) -> bool {
        self.0 & feature.bit() != 0
    }

    /// This set with `feature` enabled.
    #[must_use]
    pub fn with(self, feature: Feature) -> Self {
        FeatureSet(self.0 | feature.bit())
    }

    /// This set with `feature` disabled.
    #[must_use]
    pub fn without(self, feature: Feature) -> Self {
        FeatureSet(self.0 & !feature.bit())
    }

    /// Enabled features, in declaration order.
    pub fn iter(self) -> impl Iterator<Item = Feature> {
        Feature::ALL.into_iter().filter(move |f| self.contains(*f))
    }

    /// Number of enabled features.
    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether no feature is enabled.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for FeatureSet {
    fn default() -> Self {
        FeatureSet::ALL
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        iter.into_iter()
            .fold(FeatureSet::EMPTY, |set, f| set.with(f))
    }
}

// Serialized as the list of enabled feature names so config files stay
// readable; the bit mask is an in-memory representation only.
impl Serialize for FeatureSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for feature in self.iter() {
            seq.serialize_element(&feature)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for FeatureSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SetVisitor;

        impl<'de> Visitor<'de> for SetVisitor {
            type Value = FeatureSet;

            fn expecting(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str("a list of feature names")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<FeatureSet, A::Error> {
                let mut set = FeatureSet::EMPTY;
                while let Some(feature) = seq.next_element::<Feature>()? {
                    set = set.with(feature);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_seq(SetVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn all_contains_everything() {
        for feature in Feature::ALL {
            assert!(FeatureSet::ALL.contains(feature));
        }
        assert_eq!(FeatureSet::ALL.len(), Feature::ALL.len());
    }

    #[test]
    fn without_removes_only_the_named_feature() {
        let set = FeatureSet::ALL.without(Feature::Csv);
        assert!(!set.contains(Feature::Csv));
        assert!(set.contains(Feature::Json));
        assert_eq!(set.len(), Feature::ALL.len() - 1);
    }

    #[test]
    fn serde_round_trips_as_names() {
        let set = FeatureSet::EMPTY
            .with(Feature::Json)
            .with(Feature::PredefinedRoutes);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["json","predefined_routes"]"#);
        let back: FeatureSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    proptest! {
        #[test]
        fn with_then_without_is_identity_for_absent_features(idx in 0usize..Feature::ALL.len()) {
            let feature = Feature::ALL[idx];
            let base = FeatureSet::EMPTY;
            prop_assert_eq!(base.with(feature).without(feature), base);
        }

        #[test]
        fn iter_matches_contains(mask in 0u32..(1 << 14)) {
            let set = FeatureSet(mask);
            for f in set.iter() {
                prop_assert!(set.contains(f));
            }
            prop_assert_eq!(set.iter().count(), set.len());
        }
    }
}
