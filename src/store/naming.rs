use crate::error::{Error, Result};

const DATA_TABLE_PREFIX: &str = "data_c_";

/// Name of the table holding a collection's Data records.
///
/// Collection ids are restricted to ASCII alphanumerics, `-` and `_` so the
/// result can be spliced into DDL safely.
pub fn data_table(collection_id: &str) -> Result<String> {
    if collection_id.is_empty() {
        return Err(Error::BadRequest("collection id cannot be empty".to_string()));
    }
    if !collection_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::BadRequest(format!(
            "collection id '{collection_id}' contains invalid characters"
        )));
    }
    Ok(format!(
        "{DATA_TABLE_PREFIX}{}",
        collection_id.replace('-', "_").to_ascii_lowercase()
    ))
}
