//! Response shapes shared by several resources.

use serde::Deserialize;

use super::operation::SchemaWriter;
use crate::error::ProviderError;
use crate::state::ResourceData;

/// `{"id": "..."}` returned by most create calls.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IdBasedResponse {
    /// Server-assigned identifier.
    pub id: String,
}

impl SchemaWriter for IdBasedResponse {
    fn write_to_schema(&self, data: &mut ResourceData) -> Result<(), ProviderError> {
        data.set_id(self.id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_based_response() {
        let response: IdBasedResponse = serde_json::from_str(r#"{"id":"repo-1","extra":1}"#).unwrap();
        let mut data = ResourceData::new();
        response.write_to_schema(&mut data).unwrap();
        assert_eq!(data.id(), Some("repo-1"));
    }
}
