use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const VARIANTS: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Status {
    Complete => "complete",
    AwaitingCleaning => "awaiting-cleaning",
    AwaitingCsv => "awaiting-csv",
    AutoExtracted => "auto-extracted",
    AwaitingReading => "awaiting-reading",
    AwaitingExtraction => "awaiting-extraction",
    SupportingDocument => "supporting-document",
    CaseDoc => "case-doc",
    NonRequest => "non-request",
    ExemptionLog => "exemption-log",
    Unchecked => "unchecked",
});

impl Status {
    /// Human-readable label used by admin tooling.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Complete => "Complete",
            Self::AwaitingCleaning => "Awaiting final cleaning",
            Self::AwaitingCsv => "Awaiting conversion to CSV",
            Self::AutoExtracted => "Auto-extracted (needs review)",
            Self::AwaitingReading => "Awaiting reading/processing",
            Self::AwaitingExtraction => "Awaiting extraction",
            Self::SupportingDocument => "Supporting document",
            Self::CaseDoc => "Case document",
            Self::NonRequest => "Misc file/unrelated to response",
            Self::ExemptionLog => "Exemption log",
            Self::Unchecked => "New/Unprocessed",
        }
    }

    /// Statuses that artifact-driven recomputation never overwrites.
    /// Only a completed merge may move a document out of these.
    pub fn is_sticky(&self) -> bool {
        matches!(
            self,
            Self::Complete | Self::CaseDoc | Self::SupportingDocument | Self::NonRequest
        )
    }

    /// Parse a value read back from storage. Labels written by older status
    /// tables (or by hand) degrade to `Unchecked` instead of failing the read.
    pub fn from_stored(value: &str) -> Self {
        match value.parse() {
            Ok(status) => status,
            Err(_) => {
                tracing::warn!(value, "Unknown stored status, treating as unchecked");
                Self::Unchecked
            }
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Self::Unchecked
    }
}
