use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, ScrapeError};

use super::patterns::{
    EMAIL_PATTERN, LOCATION_SELECTOR, NAME_SELECTOR, PHONE_PATTERN, PROFILE_URL_FRAGMENTS,
    TITLE_KEYWORDS, TITLE_SELECTOR,
};

/// Contact fields, declared in extraction order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldName {
    Email,
    Phone,
    Name,
    Title,
    ProfileUrl,
    Location,
}

/// Fields are always resolved in this order; `name` may anchor on `email`.
pub const EXTRACTION_ORDER: [FieldName; 6] = [
    FieldName::Email,
    FieldName::Phone,
    FieldName::Name,
    FieldName::Title,
    FieldName::ProfileUrl,
    FieldName::Location,
];

impl FieldName {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::Email => "email",
            FieldName::Phone => "phone",
            FieldName::Name => "name",
            FieldName::Title => "title",
            FieldName::ProfileUrl => "profileUrl",
            FieldName::Location => "location",
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminant of [`MethodKind`], used for provenance and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MethodTag {
    LinkAttribute,
    SelectorAttribute,
    TextPattern,
    UrlPattern,
    ProximityToAnchor,
    FirstInternalLink,
    KeywordMatch,
    CoordinateFallback,
    OpticalText,
}

impl MethodTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodTag::LinkAttribute => "link-attribute",
            MethodTag::SelectorAttribute => "selector-attribute",
            MethodTag::TextPattern => "text-pattern",
            MethodTag::UrlPattern => "url-pattern",
            MethodTag::ProximityToAnchor => "proximity-to-anchor",
            MethodTag::FirstInternalLink => "first-internal-link",
            MethodTag::KeywordMatch => "keyword-match",
            MethodTag::CoordinateFallback => "coordinate-fallback",
            MethodTag::OpticalText => "optical-text",
        }
    }
}

impl fmt::Display for MethodTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preferred side of the anchor for proximity lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Above,
    Below,
    Left,
    Right,
    #[default]
    Any,
}

/// Stored hit-test point for the coordinate fallback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum CoordinatePosition {
    /// Offset from the card's top-left corner
    Relative { dx: f64, dy: f64 },
    /// Page coordinates
    Absolute { x: f64, y: f64 },
}

/// Screenshot region relative to the card's top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeRegion {
    pub dx: f64,
    pub dy: f64,
    pub width: f64,
    pub height: f64,
}

/// One extraction strategy with its parameters.
///
/// Serialized as `{"kind": "...", "params": {...}}`; param names are camelCase
/// like the field names they sit next to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "kind",
    content = "params",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum MethodKind {
    /// Anchor whose href starts with `scheme` (`mailto:`, `tel:`)
    LinkAttribute { scheme: String },
    /// Scoped lookup; reads visible text, or `attribute` when set
    SelectorAttribute {
        selector: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attribute: Option<String>,
    },
    /// Regex over the card's visible text; `group` 0 is the whole match
    TextPattern {
        pattern: String,
        #[serde(default)]
        group: usize,
    },
    /// First anchor whose href contains one of `fragments`
    UrlPattern { fragments: Vec<String> },
    /// Nearest text element to the element holding `anchor_field`'s value
    ProximityToAnchor {
        anchor_field: FieldName,
        #[serde(default)]
        direction: Direction,
        max_distance: f64,
    },
    /// First anchor pointing at the current page's host
    FirstInternalLink,
    /// First text element containing one of `keywords` (case-insensitive)
    KeywordMatch { keywords: Vec<String> },
    /// Hit-test a stored point
    CoordinateFallback { position: CoordinatePosition },
    /// Delegate to the text recognizer; the whole card when `region` is unset
    OpticalText {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        region: Option<RelativeRegion>,
    },
}

impl MethodKind {
    pub fn tag(&self) -> MethodTag {
        match self {
            MethodKind::LinkAttribute { .. } => MethodTag::LinkAttribute,
            MethodKind::SelectorAttribute { .. } => MethodTag::SelectorAttribute,
            MethodKind::TextPattern { .. } => MethodTag::TextPattern,
            MethodKind::UrlPattern { .. } => MethodTag::UrlPattern,
            MethodKind::ProximityToAnchor { .. } => MethodTag::ProximityToAnchor,
            MethodKind::FirstInternalLink => MethodTag::FirstInternalLink,
            MethodKind::KeywordMatch { .. } => MethodTag::KeywordMatch,
            MethodKind::CoordinateFallback { .. } => MethodTag::CoordinateFallback,
            MethodKind::OpticalText { .. } => MethodTag::OpticalText,
        }
    }
}

/// A prioritized extraction strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionMethod {
    /// Lower runs first
    pub priority: u32,
    #[serde(flatten)]
    pub kind: MethodKind,
    /// Static confidence in [0, 1] reported when this method wins
    pub confidence: f64,
}

impl ExtractionMethod {
    pub fn new(priority: u32, kind: MethodKind, confidence: f64) -> Self {
        Self {
            priority,
            kind,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn tag(&self) -> MethodTag {
        self.kind.tag()
    }
}

/// Acceptance predicate applied to a method's raw output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorKind {
    Email,
    Phone,
    Name,
    Url,
    Text,
}

impl ValidatorKind {
    pub fn for_field(field: FieldName) -> Self {
        match field {
            FieldName::Email => ValidatorKind::Email,
            FieldName::Phone => ValidatorKind::Phone,
            FieldName::Name => ValidatorKind::Name,
            FieldName::ProfileUrl => ValidatorKind::Url,
            FieldName::Title | FieldName::Location => ValidatorKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub field: FieldName,
    pub methods: Vec<ExtractionMethod>,
    pub validator: ValidatorKind,
}

impl FieldConfig {
    /// Config using the field's default validator
    pub fn new(field: FieldName, methods: Vec<ExtractionMethod>) -> Self {
        Self {
            field,
            methods,
            validator: ValidatorKind::for_field(field),
        }
    }
}

/// Persisted per-site configuration: field name to its ordered methods.
///
/// Method order and parameters survive a JSON round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionConfig {
    fields: BTreeMap<FieldName, Vec<ExtractionMethod>>,
}

impl ExtractionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, field: FieldName, methods: Vec<ExtractionMethod>) -> Self {
        self.fields.insert(field, methods);
        self
    }

    pub fn methods(&self, field: FieldName) -> Option<&[ExtractionMethod]> {
        self.fields.get(&field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field configs in extraction order, skipping unconfigured fields
    pub fn to_field_configs(&self) -> Vec<FieldConfig> {
        EXTRACTION_ORDER
            .iter()
            .filter_map(|field| {
                self.fields
                    .get(field)
                    .map(|methods| FieldConfig::new(*field, methods.clone()))
            })
            .collect()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject confidences outside [0, 1]
    pub fn validate(&self) -> Result<()> {
        for (field, methods) in &self.fields {
            for method in methods {
                if !(0.0..=1.0).contains(&method.confidence) {
                    return Err(ScrapeError::Config(format!(
                        "{} method '{}' has confidence {} outside [0, 1]",
                        field,
                        method.tag(),
                        method.confidence
                    )));
                }
            }
        }
        Ok(())
    }

    /// Built-in configuration for staff-directory style pages
    pub fn default_contact() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        Self::new()
            .with_field(
                FieldName::Email,
                vec![
                    ExtractionMethod::new(
                        1,
                        MethodKind::LinkAttribute {
                            scheme: "mailto:".to_string(),
                        },
                        0.95,
                    ),
                    ExtractionMethod::new(
                        2,
                        MethodKind::TextPattern {
                            pattern: EMAIL_PATTERN.to_string(),
                            group: 0,
                        },
                        0.85,
                    ),
                ],
            )
            .with_field(
                FieldName::Phone,
                vec![
                    ExtractionMethod::new(
                        1,
                        MethodKind::LinkAttribute {
                            scheme: "tel:".to_string(),
                        },
                        0.95,
                    ),
                    ExtractionMethod::new(
                        2,
                        MethodKind::TextPattern {
                            pattern: PHONE_PATTERN.to_string(),
                            group: 0,
                        },
                        0.8,
                    ),
                ],
            )
            .with_field(
                FieldName::Name,
                vec![
                    ExtractionMethod::new(
                        1,
                        MethodKind::SelectorAttribute {
                            selector: NAME_SELECTOR.to_string(),
                            attribute: None,
                        },
                        0.8,
                    ),
                    ExtractionMethod::new(
                        2,
                        MethodKind::ProximityToAnchor {
                            anchor_field: FieldName::Email,
                            direction: Direction::Above,
                            max_distance: 200.0,
                        },
                        0.6,
                    ),
                ],
            )
            .with_field(
                FieldName::Title,
                vec![
                    ExtractionMethod::new(
                        1,
                        MethodKind::SelectorAttribute {
                            selector: TITLE_SELECTOR.to_string(),
                            attribute: None,
                        },
                        0.8,
                    ),
                    ExtractionMethod::new(
                        2,
                        MethodKind::KeywordMatch {
                            keywords: strings(TITLE_KEYWORDS),
                        },
                        0.6,
                    ),
                ],
            )
            .with_field(
                FieldName::ProfileUrl,
                vec![
                    ExtractionMethod::new(
                        1,
                        MethodKind::UrlPattern {
                            fragments: strings(PROFILE_URL_FRAGMENTS),
                        },
                        0.8,
                    ),
                    ExtractionMethod::new(2, MethodKind::FirstInternalLink, 0.5),
                ],
            )
            .with_field(
                FieldName::Location,
                vec![ExtractionMethod::new(
                    1,
                    MethodKind::SelectorAttribute {
                        selector: LOCATION_SELECTOR.to_string(),
                        attribute: None,
                    },
                    0.7,
                )],
            )
    }
}
