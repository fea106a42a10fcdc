mod models;
mod permission;
mod value;

pub use models::*;
pub use permission::{Permissions, Principal, Roles};
pub use value::{DataRecord, MetaData, Value, record_from_json, try_record_from_json};
