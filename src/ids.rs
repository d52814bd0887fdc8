//! Composed resource IDs.
//!
//! Some resources have no single server-side identifier, e.g. a policy rule
//! only exists inside its policy. Their Terraform ID joins the identifiers
//! with a separator and is split again on read and import.

use crate::error::ProviderError;

/// Separator used by every composed ID in this provider.
pub const ID_SEPARATOR: &str = "/";

/// Join identifiers into a composed ID.
pub fn marshal_composed_id<S: AsRef<str>>(ids: &[S], separator: &str) -> String {
    ids.iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join(separator)
}

/// Split a composed ID into exactly `num_fields` identifiers.
///
/// Fails when the separator count does not match. Empty fields are kept.
pub fn unmarshal_composed_id(
    id: &str,
    separator: &str,
    num_fields: usize,
) -> Result<Vec<String>, ProviderError> {
    let fields: Vec<String> = id.split(separator).map(str::to_string).collect();
    if fields.len() != num_fields {
        let expected = (1..=num_fields)
            .map(|i| format!("{{field{}}}", i))
            .collect::<Vec<_>>()
            .join(separator);
        return Err(ProviderError::InvalidId {
            id: id.to_string(),
            expected,
        });
    }
    Ok(fields)
}

/// Split a composed ID whose fields have known names. The names only feed the
/// error message.
pub fn unmarshal_named_id(
    id: &str,
    separator: &str,
    names: &[&str],
) -> Result<Vec<String>, ProviderError> {
    unmarshal_composed_id(id, separator, names.len()).map_err(|_| ProviderError::InvalidId {
        id: id.to_string(),
        expected: names
            .iter()
            .map(|n| format!("{{{}}}", n))
            .collect::<Vec<_>>()
            .join(separator),
    })
}
