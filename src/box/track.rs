use std::io::Write;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use fixed::types::{U16F16, U8F8};
use fixed_macro::types::{U16F16, U8F8};

use crate::{
    r#box::{Decode, Encode, Matrix},
    Error, Result,
};

// 8.3.2
#[derive(Debug)]
pub struct TrackHeader {
    pub creation_time: u64,
    pub modification_time: u64,
    pub track_id: u32,
    pub duration: u64,
    pub layer: u16,
    pub alternate_group: u16,
    pub volume: U8F8,
    pub matrix: Matrix,
    pub width: U16F16,
    pub height: U16F16,
}

impl Default for TrackHeader {
    fn default() -> Self {
        Self {
            creation_time: 0,
            modification_time: 0,
            track_id: 0,
            duration: 0,
            layer: 0,
            alternate_group: 0,
            volume: U8F8!(1),
            matrix: Matrix::identity(),
            width: U16F16!(0),
            height: U16F16!(0),
        }
    }
}

impl Encode for TrackHeader {
    fn size(&self) -> u64 {
        4 + 4 + 1 + 3 + 5 * 4 + 2 * 4 + 2 + 2 + 2 + 2 + self.matrix.size() + 4 + 4
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        (self.size() as u32).encode(output)?; // size
        u32::from_be_bytes(*b"tkhd").encode(output)?; // type
        output.write_u8(0)?; // version
        output.write_u24::<BigEndian>(0x000001)?; // flags: track_enabled

        (self.creation_time as u32).encode(output)?;
        (self.modification_time as u32).encode(output)?;
        self.track_id.encode(output)?;
        0u32.encode(output)?; // reserved
        (self.duration as u32).encode(output)?;
        0u32.encode(output)?; // reserved
        0u32.encode(output)?; // reserved
        self.layer.encode(output)?;
        self.alternate_group.encode(output)?;
        self.volume.encode(output)?;
        0u16.encode(output)?; // reserved
        self.matrix.encode(output)?;
        self.width.encode(output)?;
        self.height.encode(output)
    }
}

impl Decode for TrackHeader {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        let version = input.read_u8()?;
        input.read_u24::<BigEndian>()?; // flags

        let creation_time;
        let modification_time;
        let track_id;
        let duration;
        match version {
            0 => {
                creation_time = input.read_u32::<BigEndian>()? as u64;
                modification_time = input.read_u32::<BigEndian>()? as u64;
                track_id = input.read_u32::<BigEndian>()?;
                input.read_u32::<BigEndian>()?; // reserved
                duration = input.read_u32::<BigEndian>()? as u64;
            }
            1 => {
                creation_time = input.read_u64::<BigEndian>()?;
                modification_time = input.read_u64::<BigEndian>()?;
                track_id = input.read_u32::<BigEndian>()?;
                input.read_u32::<BigEndian>()?; // reserved
                duration = input.read_u64::<BigEndian>()?;
            }
            _ => return Err(Error::MalformedContainer("unsupported tkhd version")),
        }
        input.read_u32::<BigEndian>()?; // reserved
        input.read_u32::<BigEndian>()?; // reserved
        let layer = input.read_u16::<BigEndian>()?;
        let alternate_group = input.read_u16::<BigEndian>()?;
        let volume = Decode::decode(input)?;
        input.read_u16::<BigEndian>()?; // reserved
        let matrix = Decode::decode(input)?;
        let width = Decode::decode(input)?;
        let height = Decode::decode(input)?;

        Ok(Self {
            creation_time,
            modification_time,
            track_id,
            duration,
            layer,
            alternate_group,
            volume,
            matrix,
            width,
            height,
        })
    }
}
