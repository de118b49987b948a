//! Type definitions shared by the caption client, session and history.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

/// The three caption tiers returned for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionSet {
    pub short: String,
    pub medium: String,
    /// Accessibility-oriented description.
    #[serde(alias = "accessibility")]
    pub detailed: String,
}

impl CaptionSet {
    pub fn new(
        short: impl Into<String>,
        medium: impl Into<String>,
        detailed: impl Into<String>,
    ) -> Self {
        Self {
            short: short.into(),
            medium: medium.into(),
            detailed: detailed.into(),
        }
    }

    /// True when every tier has visible text.
    pub fn is_complete(&self) -> bool {
        [&self.short, &self.medium, &self.detailed]
            .iter()
            .all(|s| !s.trim().is_empty())
    }

    pub fn get(&self, field: CaptionField) -> &str {
        match field {
            CaptionField::Short => &self.short,
            CaptionField::Medium => &self.medium,
            CaptionField::Detailed => &self.detailed,
        }
    }

    pub fn set(&mut self, field: CaptionField, text: impl Into<String>) {
        let slot = match field {
            CaptionField::Short => &mut self.short,
            CaptionField::Medium => &mut self.medium,
            CaptionField::Detailed => &mut self.detailed,
        };
        *slot = text.into();
    }
}

/// Selects one tier of a [`CaptionSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionField {
    Short,
    Medium,
    Detailed,
}

impl CaptionField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionField::Short => "short",
            CaptionField::Medium => "medium",
            CaptionField::Detailed => "detailed",
        }
    }
}

impl FromStr for CaptionField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short" => Ok(CaptionField::Short),
            "medium" => Ok(CaptionField::Medium),
            "detailed" | "accessibility" => Ok(CaptionField::Detailed),
            other => Err(format!("Unknown caption field: '{}'", other)),
        }
    }
}

impl fmt::Display for CaptionField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mime type recorded for payloads that failed validation.
pub const UNRECOGNIZED_MIME_TYPE: &str = "application/octet-stream";

/// An image payload with its detected MIME type.
///
/// Serialized as a base64 data URI so persisted history contains only
/// strings. Equality compares the MIME type and the exact bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    mime_type: String,
    bytes: Vec<u8>,
}

impl ImageData {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Wrap bytes that are not a recognised image.
    pub fn unrecognized(bytes: Vec<u8>) -> Self {
        Self::new(UNRECOGNIZED_MIME_TYPE, bytes)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Raw base64 of the payload, without the `data:` prefix.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    pub fn from_data_uri(uri: &str) -> Result<Self, String> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| "Image data is not a data URI".to_string())?;
        let (mime_type, payload) = rest
            .split_once(";base64,")
            .ok_or_else(|| "Image data URI is not base64-encoded".to_string())?;
        if mime_type.is_empty() {
            return Err("Image data URI has no MIME type".to_string());
        }
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| format!("Invalid base64 in image data URI: {}", e))?;
        Ok(Self::new(mime_type, bytes))
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageData")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl Serialize for ImageData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_uri())
    }
}

impl<'de> Deserialize<'de> for ImageData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let uri = String::deserialize(deserializer)?;
        ImageData::from_data_uri(&uri).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caption_set_completeness() {
        assert!(CaptionSet::new("A cat", "A cat on a mat", "A photo of a cat").is_complete());
        assert!(!CaptionSet::new("A cat", " ", "A photo of a cat").is_complete());
        assert!(!CaptionSet::new("", "", "").is_complete());
    }

    #[test]
    fn test_caption_set_get_and_set() {
        let mut set = CaptionSet::new("a", "b", "c");
        set.set(CaptionField::Medium, "edited");
        assert_eq!(set.get(CaptionField::Short), "a");
        assert_eq!(set.get(CaptionField::Medium), "edited");
        assert_eq!(set.get(CaptionField::Detailed), "c");
    }

    #[test]
    fn test_caption_set_accepts_accessibility_alias() {
        let json = r#"{"short":"s","medium":"m","accessibility":"d"}"#;
        let set: CaptionSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.detailed, "d");
    }

    #[test]
    fn test_caption_field_parsing() {
        assert_eq!("short".parse::<CaptionField>(), Ok(CaptionField::Short));
        assert_eq!(" Medium ".parse::<CaptionField>(), Ok(CaptionField::Medium));
        assert_eq!("accessibility".parse::<CaptionField>(), Ok(CaptionField::Detailed));
        assert!("long".parse::<CaptionField>().is_err());

        let json = serde_json::to_string(&CaptionField::Detailed).unwrap();
        assert_eq!(json, r#""detailed""#);
    }

    #[test]
    fn test_image_data_uri_round_trip() {
        let image = ImageData::new("image/png", vec![0x89, b'P', b'N', b'G', 0, 255]);
        let uri = image.to_data_uri();
        assert!(uri.starts_with("data:image/png;base64,"));

        let parsed = ImageData::from_data_uri(&uri).unwrap();
        assert_eq!(parsed, image);
    }

    #[test]
    fn test_image_data_uri_rejects_garbage() {
        assert!(ImageData::from_data_uri("hello").is_err());
        assert!(ImageData::from_data_uri("data:image/png,raw").is_err());
        assert!(ImageData::from_data_uri("data:;base64,AAAA").is_err());
        assert!(ImageData::from_data_uri("data:image/png;base64,***").is_err());
    }

    #[test]
    fn test_image_data_serializes_as_string() {
        let image = ImageData::new("image/jpeg", vec![1, 2, 3]);
        let json = serde_json::to_string(&image).unwrap();
        assert_eq!(json, r#""data:image/jpeg;base64,AQID""#);

        let back: ImageData = serde_json::from_str(&json).unwrap();
        assert_eq!(back.bytes(), &[1, 2, 3]);
    }

    #[test]
    fn test_image_data_equality_is_by_content() {
        let a = ImageData::new("image/png", vec![1, 2, 3]);
        let b = ImageData::new("image/png", vec![1, 2, 3]);
        let c = ImageData::new("image/png", vec![1, 2, 4]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
