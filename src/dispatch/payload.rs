//! Multipart payload sent to the generation service

use reqwest::multipart::{Form, Part};

use crate::dispatch::mode::DispatchMode;
use crate::dispatch::request::GenerationRequest;
use crate::error::{AppError, Result};

pub const INTENT_FIELD: &str = "intent";
pub const IMAGE_FIELD: &str = "control_image";
pub const BATCH_SIZE_FIELD: &str = "batch_size";

/// One part of the multipart body
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadField {
    Text {
        name: &'static str,
        value: String,
    },
    File {
        name: &'static str,
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    },
}

impl PayloadField {
    pub fn name(&self) -> &'static str {
        match self {
            PayloadField::Text { name, .. } | PayloadField::File { name, .. } => *name,
        }
    }
}

/// Mode plus ordered fields, independent of the transport
#[derive(Debug, Clone)]
pub struct Payload {
    pub mode: DispatchMode,
    pub fields: Vec<PayloadField>,
}

impl Payload {
    pub fn from_request(request: &GenerationRequest) -> Self {
        let mode = request.mode();
        let image = &request.reference_image;

        let mut fields = vec![
            PayloadField::Text {
                name: INTENT_FIELD,
                value: request.intent.clone(),
            },
            PayloadField::File {
                name: IMAGE_FIELD,
                file_name: image.file_name().to_string(),
                content_type: image.content_type().to_string(),
                bytes: image.bytes().to_vec(),
            },
        ];

        if mode == DispatchMode::Batch {
            fields.push(PayloadField::Text {
                name: BATCH_SIZE_FIELD,
                value: request.batch_size.to_string(),
            });
        }

        Self { mode, fields }
    }

    pub fn field(&self, name: &str) -> Option<&PayloadField> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn field_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(PayloadField::name).collect()
    }

    /// Encode as a multipart form, one part per field
    pub fn into_form(self) -> Result<Form> {
        let mut form = Form::new();
        for field in self.fields {
            form = match field {
                PayloadField::Text { name, value } => form.text(name, value),
                PayloadField::File {
                    name,
                    file_name,
                    content_type,
                    bytes,
                } => {
                    let part = Part::bytes(bytes)
                        .file_name(file_name)
                        .mime_str(&content_type)
                        .map_err(|e| {
                            AppError::Internal(format!(
                                "invalid content type '{}': {}",
                                content_type, e
                            ))
                        })?;
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}
