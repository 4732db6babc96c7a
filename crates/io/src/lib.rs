pub mod csv;
pub mod json;
pub mod resource;
pub mod sftp;
pub mod transform;

pub use csv::{CsvReader, CsvWriter};
pub use json::JsonReader;
pub use resource::{HttpResource, LocalResource, MemoryResource, Resource};
pub use sftp::{expand_tilde, SftpAuth, SftpResource};
pub use transform::{FieldTransformer, TimeTransformer};
