pub mod error;
pub mod record;
mod utils;

pub use error::DeserializeError;
pub use record::{is_valid_record, ConfigRecord, ConfigRecordView, MAX_RECORD_LEN, MAX_TOKEN_LEN, RECORD_VERSION};
pub use utils::{read_array, read_bytes};
