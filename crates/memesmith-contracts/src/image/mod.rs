mod data_url;

pub use data_url::{mime_type_of, payload_of, DataUrlError, EncodedImage, DEFAULT_MIME_TYPE};
