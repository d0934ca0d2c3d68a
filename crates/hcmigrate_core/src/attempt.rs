use tracing::debug;

use crate::client::{ApiError, ApiSurface};

/// Run `operation` against each surface in order and return the first success along with
/// the surface that produced it. When every surface fails the last error is returned.
pub fn first_success<T, F>(
    label: &str,
    surfaces: &[ApiSurface],
    mut operation: F,
) -> Result<(ApiSurface, T), ApiError>
where
    F: FnMut(ApiSurface) -> Result<T, ApiError>,
{
    let mut last_error = None;
    for surface in surfaces {
        match operation(*surface) {
            Ok(value) => return Ok((*surface, value)),
            Err(error) => {
                debug!(operation = label, surface = surface.as_str(), %error, "attempt failed");
                last_error = Some(error);
            }
        }
    }
    Err(last_error.unwrap_or(ApiError::Empty { what: "api surface" }))
}

/// [`first_success`] over the standard surface, then the guide surface.
pub fn standard_then_guide<T, F>(label: &str, operation: F) -> Result<(ApiSurface, T), ApiError>
where
    F: FnMut(ApiSurface) -> Result<T, ApiError>,
{
    first_success(label, &ApiSurface::ORDER, operation)
}

/// Treat an empty listing as a failed attempt so the next surface gets a chance.
pub fn non_empty<T>(items: Vec<T>, what: &'static str) -> Result<Vec<T>, ApiError> {
    if items.is_empty() {
        Err(ApiError::Empty { what })
    } else {
        Ok(items)
    }
}
