use byteorder::{BigEndian, WriteBytesExt};
use std::io::{self, Write};
use tracing::trace;
use crate::bytes::{be32_at, tail};
use crate::codec::{get_codec, get_codec_by_tag, CodecError, CompType, MAX_RAW_SIZE};
pub const BLOCK_HEADER_SIZE: usize = 8;
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub raw_size: u32,
    pub comp_type: u32,
}
impl BlockHeader {
    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<BigEndian>(self.raw_size)?;
        writer.write_u32::<BigEndian>(self.comp_type)?;
        Ok(())
    }
    /// Lenient: a header cut short by the end of `src` reads as zeros.
    pub fn parse(src: &[u8]) -> Self {
        Self {
            raw_size: be32_at(src, 0),
            comp_type: be32_at(src, 4),
        }
    }
}
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBlock {
    pub comp_type: CompType,
    pub data: Vec<u8>,
    /// Bytes the block occupies on disk: header, payload and padding.
    pub block_len: usize,
}
#[inline]
fn pad_even(len: usize) -> usize {
    len + (len & 1)
}
/// Header, payload and one pad byte when the total would be odd.
pub fn encode_block(data: &[u8], comp_type: CompType) -> Result<Vec<u8>, CodecError> {
    let raw_size = u32::try_from(data.len()).map_err(|_| CodecError::TooLarge(data.len()))?;
    let payload = get_codec(comp_type).encode(data);
    let mut out = Vec::with_capacity(pad_even(BLOCK_HEADER_SIZE + payload.len()));
    let header = BlockHeader { raw_size, comp_type: comp_type.tag() };
    header.write(&mut out)?;
    out.extend_from_slice(&payload);
    if out.len() % 2 != 0 {
        out.push(0);
    }
    trace!(raw = data.len(), packed = out.len(), comp = %comp_type, "encoded block");
    Ok(out)
}
/// Decode the block starting at `src[0]`.  `src` may run past the block.
pub fn decode_block(src: &[u8]) -> Result<DecodedBlock, CodecError> {
    let header = BlockHeader::parse(src);
    let codec = get_codec_by_tag(header.comp_type)?;
    let raw_size = header.raw_size as usize;
    if raw_size > MAX_RAW_SIZE {
        return Err(CodecError::Oversized { raw_size });
    }
    let decoded = codec.decode(tail(src, BLOCK_HEADER_SIZE), raw_size);
    Ok(DecodedBlock {
        comp_type: CompType::try_from(header.comp_type)?,
        data: decoded.data,
        block_len: BLOCK_HEADER_SIZE + pad_even(decoded.consumed),
    })
}
