//! Product image upload policy: which files are kept and what they are called on disk.

use time::{
    OffsetDateTime, UtcOffset, format_description::BorrowedFormatItem,
    macros::format_description,
};

/// Declared media types accepted for the product image field.
pub const ACCEPTED_IMAGE_TYPES: [&str; 3] = ["image/png", "image/jpg", "image/jpeg"];

/// Multipart field carrying the product image.
pub const IMAGE_FIELD: &str = "image";

const ISO_TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

/// A file part as declared by the client, before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    pub field_name: String,
    pub content_type: String,
    pub original_name: String,
}

impl IncomingFile {
    pub fn is_accepted(&self) -> bool {
        is_accepted_image(&self.content_type)
    }
}

/// Decide whether a declared media type may be stored. Rejection is not an error.
pub fn is_accepted_image(content_type: &str) -> bool {
    ACCEPTED_IMAGE_TYPES.contains(&content_type)
}

/// Build the on-disk name for an accepted file: UTC acceptance time, a dash, then the
/// client-supplied name unchanged.
pub fn stored_image_name(
    accepted_at: OffsetDateTime,
    original_name: &str,
) -> Result<String, time::error::Format> {
    let timestamp = accepted_at.to_offset(UtcOffset::UTC).format(ISO_TIMESTAMP)?;
    Ok(format!("{timestamp}-{original_name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn accepts_only_the_image_allow_list() {
        for accepted in ["image/png", "image/jpg", "image/jpeg"] {
            assert!(is_accepted_image(accepted), "{accepted} should be accepted");
        }
        for rejected in [
            "image/gif",
            "image/webp",
            "image/svg+xml",
            "application/octet-stream",
            "text/plain",
            "IMAGE/PNG",
            "image/png; charset=binary",
            "",
        ] {
            assert!(!is_accepted_image(rejected), "{rejected} should be rejected");
        }
    }

    #[test]
    fn incoming_file_uses_declared_type() {
        let file = IncomingFile {
            field_name: IMAGE_FIELD.to_string(),
            content_type: "image/gif".to_string(),
            original_name: "cat.png".to_string(),
        };
        assert!(!file.is_accepted());
    }

    #[test]
    fn stored_name_prefixes_millisecond_utc_timestamp() {
        let accepted_at = datetime!(2024-05-01 10:20:30.123456 UTC);
        let name = stored_image_name(accepted_at, "shoe.png").expect("format");
        assert_eq!(name, "2024-05-01T10:20:30.123Z-shoe.png");
    }

    #[test]
    fn stored_name_normalises_offsets_to_utc() {
        let accepted_at = datetime!(2024-05-01 12:00:00 +02:00);
        let name = stored_image_name(accepted_at, "a b.jpeg").expect("format");
        assert_eq!(name, "2024-05-01T10:00:00.000Z-a b.jpeg");
    }
}
