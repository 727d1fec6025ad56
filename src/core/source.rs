use crate::utils::error::{NoteError, Result};
use url::{ParseError, Url};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// Local filesystem path, or the full URL (fragment included) when remote.
    pub location: String,
    pub is_remote: bool,
}

fn unresolvable(location: &str, reason: impl Into<String>) -> NoteError {
    NoteError::ResolutionError {
        location: location.to_string(),
        reason: reason.into(),
    }
}

/// Classifies a note location as a local path or a remote http(s) URL.
pub fn resolve(location: &str) -> Result<ResolvedSource> {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        return Err(unresolvable(location, "location is empty"));
    }

    match Url::parse(trimmed) {
        Ok(url) => match url.scheme() {
            "http" | "https" => {
                if url.host_str().map_or(true, str::is_empty) {
                    return Err(unresolvable(location, "URL has no host"));
                }
                Ok(ResolvedSource {
                    location: url.to_string(),
                    is_remote: true,
                })
            }
            "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| unresolvable(location, "file URL is not a valid path"))?;
                Ok(ResolvedSource {
                    location: path.to_string_lossy().into_owned(),
                    is_remote: false,
                })
            }
            // Windows drive letters parse as one-letter schemes.
            scheme if scheme.len() == 1 => Ok(local(trimmed)),
            scheme => Err(unresolvable(
                location,
                format!("unsupported URL scheme '{}'", scheme),
            )),
        },
        Err(ParseError::RelativeUrlWithoutBase) => Ok(local(trimmed)),
        Err(e) => Err(unresolvable(location, e.to_string())),
    }
}

fn local(path: &str) -> ResolvedSource {
    ResolvedSource {
        location: path.to_string(),
        is_remote: false,
    }
}
