use std::path::PathBuf;

use miette::Diagnostic;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum Error {
    #[error("Cannot load paks")]
    #[diagnostic(help("Are these valid .pak files?"))]
    LoadPaks {
        #[source]
        source: pakfs::BuildError,
    },

    #[error("Cannot read directory `{}`", path.display())]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No .pak files found in `{}`", path.display())]
    NoPaks { path: PathBuf },

    #[error("Path not found: `{path}`")]
    #[diagnostic(help("Paths are relative to the pak root, e.g. `resource/uistring/uistring.xml`"))]
    NotFound { path: String },

    #[error("`{path}` is a directory")]
    #[diagnostic(help("Use `pak extract` to write a whole directory"))]
    IsDirectory { path: String },

    #[error("Cannot load `{path}`")]
    LoadFile {
        path: String,
        #[source]
        source: pakfs::LoadError,
    },

    #[error("Extraction failed")]
    Export {
        #[source]
        source: pakfs::ExportError,
    },

    #[error("Cannot determine the current directory")]
    CurrentDir {
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write output")]
    Output {
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot serialize listing")]
    Json {
        #[source]
        source: serde_json::Error,
    },

    #[error("Interrupted")]
    Interrupted,
}
