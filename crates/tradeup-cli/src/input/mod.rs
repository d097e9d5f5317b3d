pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Read the command's document from `--input`, or from piped stdin.
pub fn read_document<T: DeserializeOwned>(
    path: Option<&str>,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return file::read_document(path);
    }
    match stdin::read_stdin()? {
        Some(data) => Ok(serde_json::from_value(data)?),
        None => Err("--input is required (or pipe JSON on stdin)".into()),
    }
}
