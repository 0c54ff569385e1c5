//! Encoded image payloads and captured sections

use base64::Engine as Base64Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// An opaque encoded bitmap (PNG bytes as produced by the capture backend).
///
/// Over the message contract it travels as a `data:image/png;base64,...` URL.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage(Vec<u8>);

impl EncodedImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_data_url(&self) -> String {
        let b64 = Base64Engine::encode(&base64::engine::general_purpose::STANDARD, &self.0);
        format!("{}{}", PNG_DATA_URL_PREFIX, b64)
    }

    /// Parse a base64 data URL. Any `data:<mime>;base64,` header is accepted.
    pub fn from_data_url(url: &str) -> std::result::Result<Self, String> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| "not a data URL".to_string())?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| "data URL has no payload".to_string())?;
        if !header.ends_with(";base64") {
            return Err(format!("unsupported data URL encoding: {}", header));
        }
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| format!("invalid base64 payload: {}", e))?;
        Ok(Self(bytes))
    }
}

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncodedImage({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for EncodedImage {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Serialize for EncodedImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_data_url())
    }
}

impl<'de> Deserialize<'de> for EncodedImage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let url = String::deserialize(deserializer)?;
        EncodedImage::from_data_url(&url).map_err(serde::de::Error::custom)
    }
}

/// One viewport-height slice of the page, in capture order.
///
/// `height` is the number of rows of `image` that belong to the page; the last
/// section is usually captured at full viewport height but only partly wanted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSection {
    pub image: EncodedImage,
    pub height: u32,
}

/// Split sections into the parallel image/height lists the merge request carries.
pub fn split_sections(sections: Vec<CaptureSection>) -> (Vec<EncodedImage>, Vec<u32>) {
    sections.into_iter().map(|s| (s.image, s.height)).unzip()
}
