//! Format registry: the closed target vocabularies and the fixed MIME table.

use std::fmt;
use std::str::FromStr;

/// Fixed token → MIME type table shared by every codec.
pub const MIME_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("ico", "image/x-icon"),
    ("json", "application/json"),
    ("csv", "text/csv"),
    ("txt", "text/plain"),
    ("pdf", "application/pdf"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("html", "text/html"),
];

/// MIME type used for the PDF → "docx" HTML masquerade.
pub const MSWORD_MIME: &str = "application/msword";

/// Look up the MIME type for a format token (case-insensitive).
pub fn mime_for_token(token: &str) -> Option<&'static str> {
    let token = token.to_ascii_lowercase();
    MIME_TYPES
        .iter()
        .find(|(t, _)| *t == token)
        .map(|(_, mime)| *mime)
}

/// The three conversion categories a caller can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Image,
    Data,
    Document,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Image, Category::Data, Category::Document];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Image => "image",
            Category::Data => "data",
            Category::Document => "document",
        }
    }
}

/// Error returned when a string is not a token of the requested vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {vocabulary} format: {token}")]
pub struct UnknownFormat {
    pub vocabulary: &'static str,
    pub token: String,
}

macro_rules! format_vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident, $vocabulary:literal {
            $($variant:ident => $token:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The lower-case token naming this format.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $token),+
                }
            }

            /// MIME type from the fixed table.
            pub fn mime_type(self) -> &'static str {
                mime_for_token(self.as_str()).unwrap_or("application/octet-stream")
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownFormat;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lower = s.trim().to_ascii_lowercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|f| f.as_str() == lower)
                    .ok_or_else(|| UnknownFormat {
                        vocabulary: $vocabulary,
                        token: s.to_string(),
                    })
            }
        }
    };
}

format_vocabulary! {
    /// Raster image targets.
    ImageFormat, "image" {
        Jpg => "jpg",
        Png => "png",
        Webp => "webp",
        Gif => "gif",
        Bmp => "bmp",
        Ico => "ico",
    }
}

format_vocabulary! {
    /// Delimited-text and JSON targets.
    DataFormat, "data" {
        Json => "json",
        Csv => "csv",
        Txt => "txt",
    }
}

format_vocabulary! {
    /// Office document targets.
    ///
    /// `Jpg` and `Png` are included because a PDF source may be rasterized;
    /// the caller-facing document vocabulary proper is `pdf, docx, txt, html,
    /// csv, json, xlsx`.
    DocumentFormat, "document" {
        Pdf => "pdf",
        Docx => "docx",
        Txt => "txt",
        Html => "html",
        Csv => "csv",
        Json => "json",
        Xlsx => "xlsx",
        Jpg => "jpg",
        Png => "png",
    }
}

impl ImageFormat {
    /// Formats without an alpha channel get a white pre-fill before drawing.
    pub fn is_opaque(self) -> bool {
        matches!(self, ImageFormat::Jpg | ImageFormat::Bmp)
    }
}

/// A target format qualified by the category it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Image(ImageFormat),
    Data(DataFormat),
    Document(DocumentFormat),
}

impl Target {
    /// Parse a token within the given category's vocabulary.
    pub fn parse(category: Category, token: &str) -> Result<Self, UnknownFormat> {
        Ok(match category {
            Category::Image => Target::Image(token.parse()?),
            Category::Data => Target::Data(token.parse()?),
            Category::Document => Target::Document(token.parse()?),
        })
    }

    pub fn category(self) -> Category {
        match self {
            Target::Image(_) => Category::Image,
            Target::Data(_) => Category::Data,
            Target::Document(_) => Category::Document,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Target::Image(f) => f.as_str(),
            Target::Data(f) => f.as_str(),
            Target::Document(f) => f.as_str(),
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Target::Image(f) => f.mime_type(),
            Target::Data(f) => f.mime_type(),
            Target::Document(f) => f.mime_type(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
