use chrono::{DateTime, Utc};
use thiserror::Error;

/// Declares a closed set of lowercase string values stored as `TEXT` columns
/// and exchanged as JSON strings.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident ($field:literal) {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(crate::CoreError::InvalidValue {
                        field: $field,
                        value: other.to_string(),
                        expected: [$($text),+].join(", "),
                    }),
                }
            }
        }
    };
}

pub mod analytics;
pub mod app_config;
pub mod catalog;
pub mod config;
pub mod dates;
pub mod orders;
pub mod outreach;
pub mod reviews;
pub mod visitors;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use dates::DateRange;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoreError {
    #[error("invalid {field} '{value}', expected one of: {expected}")]
    InvalidValue {
        field: &'static str,
        value: String,
        expected: String,
    },
    #[error("invalid {field} '{value}', expected an ISO-8601 date or datetime")]
    InvalidDate { field: &'static str, value: String },
    #[error("date_from ({from}) is after date_to ({to})")]
    InvertedRange {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    #[error("{0}")]
    Validation(String),
}
