use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    /// Source file does not exist or is not a regular file.
    FileNotFound(PathBuf),
    /// A path that cannot be resolved to a `.pdf` destination, e.g. a
    /// source path without an extension separator, or a non-UTF-8 path.
    InvalidPath(String),
    /// Conversion that is deliberately not implemented (legacy binary
    /// PowerPoint decks).
    Unsupported(String),
    /// The OOXML container is missing a required part.
    InvalidPackage(String),
    /// A rendering capability could not produce PDF bytes.
    Render(String),
    Zip(zip::result::ZipError),
    Xml(roxmltree::Error),
    Sheet(calamine::Error),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::FileNotFound(path) => write!(f, "file not found: {}", path.display()),
            Error::InvalidPath(reason) => write!(f, "invalid path: {reason}"),
            Error::Unsupported(what) => write!(f, "unsupported conversion: {what}"),
            Error::InvalidPackage(reason) => write!(f, "invalid package: {reason}"),
            Error::Render(reason) => write!(f, "rendering failed: {reason}"),
            Error::Zip(e) => write!(f, "ZIP error: {e}"),
            Error::Xml(e) => write!(f, "XML error: {e}"),
            Error::Sheet(e) => write!(f, "spreadsheet error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Zip(e)
    }
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Error::Xml(e)
    }
}

impl From<calamine::Error> for Error {
    fn from(e: calamine::Error) -> Self {
        Error::Sheet(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
