use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::Error;

#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn store(&self, bytes: Vec<u8>, extension: &str) -> Result<String, Error>;
    async fn delete(&self, reference: &str) -> Result<(), Error>;
}

// Accepts a plain base64 string or a `data:image/<ext>;base64,<payload>`
// data url.
pub fn decode_image_payload(payload: &str) -> Result<(Vec<u8>, String), Error> {
    let (extension, encoded) = match payload.strip_prefix("data:image/") {
        Some(rest) => match rest.split_once(";base64,") {
            Some((ext, data)) => (ext.to_string(), data),
            None => return Err(Error::validation("image", "malformed image data url")),
        },
        None => (String::from("png"), payload),
    };

    let bytes = STANDARD
        .decode(encoded)
        .map_err(|_| Error::validation("image", "image payload is not valid base64"))?;

    Ok((bytes, extension))
}

pub fn image_file_name(extension: &str) -> String {
    format!("recipes/{}.{}", uuid::Uuid::new_v4(), extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_data_url() {
        let (bytes, ext) = decode_image_payload("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(ext, "png");
    }

    #[test]
    fn decodes_a_bare_base64_payload() {
        let (bytes, ext) = decode_image_payload("aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(ext, "png");
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_image_payload("data:image/png;base64,???").is_err());
        assert!(decode_image_payload("data:image/png,missing-marker").is_err());
    }
}
