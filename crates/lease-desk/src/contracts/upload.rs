//! Validation for landlord-supplied contract files.

use serde::{Deserialize, Serialize};

use super::error::ContractError;

/// Upload ceiling: 10 MiB.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// The specific constraint an upload broke.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UploadViolation {
    #[error("unsupported file type '{declared}': only PDF and DOCX contracts are accepted")]
    UnsupportedType { declared: String },
    #[error("file is {size} bytes, above the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
    #[error("file is empty")]
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractFileKind {
    Pdf,
    Docx,
}

impl ContractFileKind {
    pub const fn mime(self) -> &'static str {
        match self {
            ContractFileKind::Pdf => PDF_MIME,
            ContractFileKind::Docx => DOCX_MIME,
        }
    }

    fn from_mime(declared: &str) -> Option<Self> {
        let parsed: mime::Mime = declared.trim().parse().ok()?;
        let essence = parsed.essence_str();
        if essence.eq_ignore_ascii_case(mime::APPLICATION_PDF.essence_str()) {
            Some(ContractFileKind::Pdf)
        } else if essence.eq_ignore_ascii_case(DOCX_MIME) {
            Some(ContractFileKind::Docx)
        } else {
            None
        }
    }
}

/// An accepted contract file. Bytes are kept verbatim; they are what gets signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedContract {
    pub file_name: String,
    pub kind: ContractFileKind,
    pub bytes: Vec<u8>,
}

impl UploadedContract {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// One-line description used as the placeholder page for uploaded contracts.
    pub fn summary(&self) -> String {
        format!(
            "Attached contract file: {} ({}, {} bytes)",
            self.file_name,
            self.kind.mime(),
            self.size()
        )
    }
}

/// Check the declared type against the allow-list, then the size ceiling.
pub fn validate_upload(
    file_name: &str,
    declared_mime: &str,
    bytes: Vec<u8>,
    max_bytes: usize,
) -> Result<UploadedContract, ContractError> {
    let kind = ContractFileKind::from_mime(declared_mime).ok_or_else(|| {
        UploadViolation::UnsupportedType {
            declared: declared_mime.trim().to_string(),
        }
    })?;

    if bytes.len() > max_bytes {
        return Err(UploadViolation::TooLarge {
            size: bytes.len(),
            limit: max_bytes,
        }
        .into());
    }
    if bytes.is_empty() {
        return Err(UploadViolation::Empty.into());
    }

    Ok(UploadedContract {
        file_name: file_name.trim().to_string(),
        kind,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_pdf_and_docx() {
        let pdf = validate_upload(
            "lease.pdf",
            "application/pdf",
            b"%PDF-1.7".to_vec(),
            MAX_UPLOAD_BYTES,
        )
        .expect("pdf accepted");
        assert_eq!(pdf.kind, ContractFileKind::Pdf);

        let docx = validate_upload("lease.docx", DOCX_MIME, b"PK".to_vec(), MAX_UPLOAD_BYTES)
            .expect("docx accepted");
        assert_eq!(docx.kind, ContractFileKind::Docx);
    }

    #[test]
    fn twelve_megabytes_is_rejected_for_size() {
        let bytes = vec![0u8; 12 * 1024 * 1024];
        let err = validate_upload("lease.pdf", PDF_MIME, bytes, MAX_UPLOAD_BYTES)
            .expect_err("too large");
        assert_eq!(
            err,
            ContractError::Validation(UploadViolation::TooLarge {
                size: 12 * 1024 * 1024,
                limit: MAX_UPLOAD_BYTES,
            })
        );
    }

    #[test]
    fn png_is_rejected_for_type() {
        let err = validate_upload("scan.png", "image/png", vec![1, 2, 3], MAX_UPLOAD_BYTES)
            .expect_err("wrong type");
        assert_eq!(
            err,
            ContractError::Validation(UploadViolation::UnsupportedType {
                declared: "image/png".to_string(),
            })
        );
    }

    #[test]
    fn exact_limit_is_allowed() {
        let bytes = vec![7u8; 1024];
        assert!(validate_upload("lease.pdf", PDF_MIME, bytes, 1024).is_ok());
    }

    #[test]
    fn mime_parameters_are_ignored() {
        let upload = validate_upload(
            "lease.pdf",
            "Application/PDF; name=lease.pdf",
            b"%PDF".to_vec(),
            MAX_UPLOAD_BYTES,
        )
        .expect("parameters tolerated");
        assert_eq!(upload.kind, ContractFileKind::Pdf);
    }

    #[test]
    fn garbage_mime_is_a_type_violation() {
        assert!(matches!(
            validate_upload("x", "not a mime", b"x".to_vec(), MAX_UPLOAD_BYTES),
            Err(ContractError::Validation(UploadViolation::UnsupportedType { .. }))
        ));
    }
}
