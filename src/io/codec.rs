//! Binary encoding of stored ACL values.

use bincode::config::{self, Config};
use bincode::serde::{decode_from_slice, encode_to_vec};

use crate::error::{ArborError, Result};
use crate::types::Acl;

fn codec_config() -> impl Config {
    config::standard()
}

pub fn encode_acl(acl: &Acl) -> Result<Vec<u8>> {
    Ok(encode_to_vec(acl, codec_config())?)
}

pub fn decode_acl(bytes: &[u8]) -> Result<Acl> {
    if bytes.is_empty() {
        return Ok(Acl::new());
    }
    let (acl, read) = decode_from_slice::<Acl, _>(bytes, codec_config())?;
    if read != bytes.len() {
        return Err(ArborError::Decode {
            reason: format!("{} trailing bytes after acl", bytes.len() - read),
        });
    }
    Ok(acl)
}
