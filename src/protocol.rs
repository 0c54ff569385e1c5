//! Typed message contract between the caller, the relay and the compositor
//!
//! Each action is one variant; handlers match exhaustively, so a new action
//! cannot fall through unhandled. The JSON shape keeps the action names and
//! field names of the wire format (`action`, `status`, `dataUrl`).

use crate::{EncodedImage, Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Request {
    /// Capture the visible viewport and store it
    #[serde(rename = "capture_visible")]
    CaptureVisible,

    /// Capture the whole page and store the composite
    #[serde(rename = "capture_full")]
    CaptureFull,

    /// Single-viewport capture primitive used by the walker
    #[serde(rename = "capture_visible_tab")]
    CaptureViewport,

    /// Stitch sections; `heights` may be omitted
    #[serde(rename = "merge_images")]
    MergeSections {
        images: Vec<EncodedImage>,
        #[serde(default)]
        heights: Vec<u32>,
    },
}

/// Outcome of the store-and-report actions (`capture_visible`, `capture_full`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Status {
    Success,
    Error { error: String },
}

/// Reply carrying an image (`capture_visible_tab`, `merge_images`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageReply {
    #[serde(rename = "dataUrl", default, skip_serializing_if = "Option::is_none")]
    pub data_url: Option<EncodedImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImageReply {
    pub fn image(image: EncodedImage) -> Self {
        Self {
            data_url: Some(image),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            data_url: None,
            error: Some(message.into()),
        }
    }

    /// An explicit error wins over data; a reply with neither is a failure too.
    #[cfg(test)]
    pub(crate) fn into_result(self) -> Result<EncodedImage> {
        if let Some(error) = self.error {
            return Err(Error::HostingContextError(error));
        }
        self.data_url
            .ok_or_else(|| Error::HostingContextError("Failed to generate merged image".into()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Status(Status),
    Image(ImageReply),
}

impl Response {
    pub fn success() -> Self {
        Response::Status(Status::Success)
    }

    /// Status-style failure with the error's human-readable message.
    pub fn failure(err: &Error) -> Self {
        Response::Status(Status::Error {
            error: err.to_string(),
        })
    }

    pub fn is_success(&self) -> bool {
        match self {
            Response::Status(Status::Success) => true,
            Response::Status(Status::Error { .. }) => false,
            Response::Image(reply) => reply.error.is_none() && reply.data_url.is_some(),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Response::Status(Status::Error { error }) => Some(error.as_str()),
            Response::Image(ImageReply { error: Some(error), .. }) => Some(error.as_str()),
            _ => None,
        }
    }
}

impl From<Result<EncodedImage>> for ImageReply {
    fn from(res: Result<EncodedImage>) -> Self {
        match res {
            Ok(image) => ImageReply::image(image),
            Err(e) => ImageReply::error(e.to_string()),
        }
    }
}
