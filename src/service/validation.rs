use crate::error::{Error, Result};
use crate::types::ResourceType;

const MAX_CODE_LEN: usize = 64;
const MAX_NAME_LEN: usize = 255;

fn is_valid_code_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Codes address resources in URLs: ASCII alphanumerics, hyphens and
/// underscores, not starting with either special character.
pub fn validate_code(code: &str, entity: ResourceType) -> Result<()> {
    if code.is_empty() {
        return Err(Error::BadRequest(format!("{entity} code cannot be empty")));
    }
    if code.len() > MAX_CODE_LEN {
        return Err(Error::BadRequest(format!(
            "{entity} code cannot exceed {MAX_CODE_LEN} characters"
        )));
    }
    if !code.chars().all(is_valid_code_char) {
        return Err(Error::BadRequest(format!(
            "{entity} code can only contain alphanumeric characters, hyphens, and underscores"
        )));
    }
    if code.starts_with('-') || code.starts_with('_') {
        return Err(Error::BadRequest(format!(
            "{entity} code cannot start with a hyphen or underscore"
        )));
    }
    Ok(())
}

pub fn validate_name(name: &str, entity: ResourceType) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::BadRequest(format!("{entity} name cannot be empty")));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(Error::BadRequest(format!(
            "{entity} name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Attribute ids are free-form keys but must be non-empty and printable.
pub fn validate_attribute_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(Error::BadRequest("attribute id cannot be empty".to_string()));
    }
    if id.chars().count() > MAX_NAME_LEN {
        return Err(Error::BadRequest(format!(
            "attribute id cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    if id.chars().any(char::is_control) {
        return Err(Error::BadRequest(
            "attribute id cannot contain control characters".to_string(),
        ));
    }
    Ok(())
}
