//! services/studio/src/bin/openapi.rs
//!
//! Prints the OpenAPI document of the studio API.
//!
//! Usage: `openapi [PATH | -]`. Without an argument the document is written to
//! `openapi.json`; `-` prints it to stdout.

use std::io::Write;
use std::path::PathBuf;
use studio_lib::{error::StudioError, web::ApiDoc};
use utoipa::OpenApi;

enum Target {
    Stdout,
    File(PathBuf),
}

impl Target {
    fn from_arg(arg: Option<String>) -> Self {
        match arg.as_deref() {
            Some("-") => Self::Stdout,
            Some(path) => Self::File(PathBuf::from(path)),
            None => Self::File(PathBuf::from("openapi.json")),
        }
    }
}

fn main() -> Result<(), StudioError> {
    let document = ApiDoc::openapi().to_pretty_json()?;
    match Target::from_arg(std::env::args().nth(1)) {
        Target::Stdout => {
            let mut out = std::io::stdout().lock();
            writeln!(out, "{document}")?;
        }
        Target::File(path) => {
            std::fs::write(&path, document)?;
            eprintln!(
                "Wrote {} paths to {}",
                ApiDoc::openapi().paths.paths.len(),
                path.display()
            );
        }
    }
    Ok(())
}
