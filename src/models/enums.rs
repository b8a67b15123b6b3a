use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when a stored or user-supplied string names no known variant.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field} value: {value}")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(
    /// Input media accepted by the extraction pipeline.
    MediaKind {
        Pdf => "pdf",
        Jpeg => "jpeg",
        Png => "png",
        Tiff => "tiff",
        Bmp => "bmp",
    }
);

str_enum!(
    /// Structured fields a credential can carry. `raw_text` and
    /// `confidence_score` are not fields: they describe the extraction itself.
    CredentialField {
        Name => "name",
        RollNumber => "roll_number",
        Degree => "degree",
        IssueYear => "issue_year",
        Institution => "institution",
        Grade => "grade",
        Specialization => "specialization",
        CertificateNumber => "certificate_number",
    }
);

/// File extensions accepted at intake, lower-case, without the dot.
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "tiff", "tif", "bmp"];

impl MediaKind {
    /// Map a file extension (any case, with or without the leading dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "tif" | "tiff" => Some(Self::Tiff),
            "bmp" => Some(Self::Bmp),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn media_kind_from_extension_is_case_insensitive() {
        assert_eq!(MediaKind::from_extension("PDF"), Some(MediaKind::Pdf));
        assert_eq!(MediaKind::from_extension(".Jpg"), Some(MediaKind::Jpeg));
        assert_eq!(MediaKind::from_extension("jpeg"), Some(MediaKind::Jpeg));
        assert_eq!(MediaKind::from_extension("tif"), Some(MediaKind::Tiff));
        assert_eq!(MediaKind::from_extension("bmp"), Some(MediaKind::Bmp));
    }

    #[test]
    fn media_kind_rejects_unknown_extensions() {
        assert_eq!(MediaKind::from_extension("docx"), None);
        assert_eq!(MediaKind::from_extension(""), None);
        assert_eq!(MediaKind::from_path(Path::new("notes")), None);
    }

    #[test]
    fn media_kind_from_path_uses_extension() {
        assert_eq!(
            MediaKind::from_path(Path::new("/tmp/scan.PNG")),
            Some(MediaKind::Png)
        );
    }

    #[test]
    fn every_allowed_extension_maps_to_a_kind() {
        for ext in ALLOWED_EXTENSIONS {
            assert!(MediaKind::from_extension(ext).is_some(), "{ext} unmapped");
        }
    }

    #[test]
    fn credential_field_round_trips_through_str() {
        for field in CredentialField::ALL {
            assert_eq!(CredentialField::from_str(field.as_str()).unwrap(), *field);
        }
    }

    #[test]
    fn credential_field_serde_matches_as_str() {
        let json = serde_json::to_string(&CredentialField::CertificateNumber).unwrap();
        assert_eq!(json, "\"certificate_number\"");
    }

    #[test]
    fn invalid_enum_names_the_type() {
        let err = MediaKind::from_str("gif").unwrap_err();
        assert_eq!(err.field, "MediaKind");
        assert_eq!(err.value, "gif");
    }
}
