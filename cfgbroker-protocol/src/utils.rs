use crate::error::DeserializeError;

pub fn read_bytes<'a>(buf: &mut &'a [u8], len: usize) -> Result<&'a [u8], DeserializeError> {
    if buf.len() < len {
        return Err(DeserializeError::UnexpectedEOF);
    }
    let (head, rest) = buf.split_at(len);
    *buf = rest;
    Ok(head)
}

pub fn read_array<const N: usize>(buf: &mut &[u8]) -> Result<[u8; N], DeserializeError> {
    read_bytes(buf, N)?
        .try_into()
        .map_err(|_| DeserializeError::UnexpectedEOF)
}
