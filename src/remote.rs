// Errors shared by the REST collaborators (Supabase, Discord)

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{service} is not configured: missing {field}")]
    NotConfigured { service: &'static str, field: &'static str },

    #[error("{service} request failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },
}

impl RemoteError {
    pub fn http(service: &'static str) -> impl FnOnce(reqwest::Error) -> RemoteError {
        move |source| RemoteError::Http { service, source }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Turn a non-2xx response into `RemoteError::Status`
pub fn check_status(
    service: &'static str,
    resp: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(RemoteError::Status {
        service,
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let e = RemoteError::NotConfigured {
            service: "supabase",
            field: "url",
        };
        assert_eq!(e.to_string(), "supabase is not configured: missing url");
        assert_eq!(e.status_code(), None);

        let e = RemoteError::Status {
            service: "discord",
            status: 401,
            body: "unauthorized".to_string(),
        };
        assert_eq!(e.status_code(), Some(401));
        assert!(e.to_string().contains("HTTP 401"));
    }
}
