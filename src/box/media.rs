use std::io::Write;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use fixed::types::U8F8;
use fixed_macro::types::U8F8;

use crate::{
    r#box::{Decode, Encode, FourCC, Language},
    Error, Result,
};

// 8.4.2
#[derive(Debug)]
pub struct MediaHeader {
    pub creation_time: u64,
    pub modification_time: u64,
    pub timescale: u32,
    pub duration: u64,
    pub language: Language,
}

impl Default for MediaHeader {
    fn default() -> Self {
        Self {
            creation_time: 0,
            modification_time: 0,
            timescale: 0,
            duration: 0,
            language: Language::UND,
        }
    }
}

impl Encode for MediaHeader {
    fn size(&self) -> u64 {
        4 + 4 + 1 + 3 + 4 + 4 + 4 + 4 + 2 + 2
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        (self.size() as u32).encode(output)?; // size
        u32::from_be_bytes(*b"mdhd").encode(output)?; // type
        output.write_u8(0)?; // version
        output.write_u24::<BigEndian>(0)?; // flags

        (self.creation_time as u32).encode(output)?;
        (self.modification_time as u32).encode(output)?;
        self.timescale.encode(output)?;
        (self.duration as u32).encode(output)?;
        self.language.0.encode(output)?;
        0u16.encode(output) // pre_defined
    }
}

impl Decode for MediaHeader {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        let version = input.read_u8()?;
        input.read_u24::<BigEndian>()?; // flags

        let creation_time;
        let modification_time;
        let timescale;
        let duration;
        match version {
            0 => {
                creation_time = input.read_u32::<BigEndian>()? as u64;
                modification_time = input.read_u32::<BigEndian>()? as u64;
                timescale = input.read_u32::<BigEndian>()?;
                duration = input.read_u32::<BigEndian>()? as u64;
            }
            1 => {
                creation_time = input.read_u64::<BigEndian>()?;
                modification_time = input.read_u64::<BigEndian>()?;
                timescale = input.read_u32::<BigEndian>()?;
                duration = input.read_u64::<BigEndian>()?;
            }
            _ => return Err(Error::MalformedContainer("unsupported mdhd version")),
        }
        let language = Language(input.read_u16::<BigEndian>()?);
        input.read_u16::<BigEndian>()?; // pre_defined

        Ok(Self {
            creation_time,
            modification_time,
            timescale,
            duration,
            language,
        })
    }
}

// 8.4.3
#[derive(Debug)]
pub struct Handler {
    pub r#type: FourCC,
    pub name: String,
}

impl Encode for Handler {
    fn size(&self) -> u64 {
        4 + 4 + 1 + 3 + 4 + 4 + 4 + 4 + 4 + self.name.size()
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        (self.size() as u32).encode(output)?; // size
        u32::from_be_bytes(*b"hdlr").encode(output)?; // type
        output.write_u8(0)?; // version
        output.write_u24::<BigEndian>(0)?; // flags

        0u32.encode(output)?; // pre_defined
        self.r#type.0.encode(output)?;
        0u32.encode(output)?; // reserved
        0u32.encode(output)?; // reserved
        0u32.encode(output)?; // reserved
        self.name.encode(output)
    }
}

impl Decode for Handler {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        input.read_u8()?; // version
        input.read_u24::<BigEndian>()?; // flags

        input.read_u32::<BigEndian>()?; // pre_defined
        let r#type = FourCC(input.read_u32::<BigEndian>()?);
        input.read_u32::<BigEndian>()?; // reserved
        input.read_u32::<BigEndian>()?; // reserved
        input.read_u32::<BigEndian>()?; // reserved
        let name = Decode::decode(input)?;

        Ok(Self { r#type, name })
    }
}

// 8.4.5.3
#[derive(Debug)]
pub struct SoundMediaHeader {
    pub balance: U8F8,
}

impl Default for SoundMediaHeader {
    fn default() -> Self {
        Self { balance: U8F8!(0) }
    }
}

impl Encode for SoundMediaHeader {
    fn size(&self) -> u64 {
        4 + 4 + 1 + 3 + 2 + 2
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        (self.size() as u32).encode(output)?; // size
        u32::from_be_bytes(*b"smhd").encode(output)?; // type
        output.write_u8(0)?; // version
        output.write_u24::<BigEndian>(0)?; // flags

        self.balance.encode(output)?;
        0u16.encode(output) // reserved
    }
}

impl Decode for SoundMediaHeader {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        input.read_u8()?; // version
        input.read_u24::<BigEndian>()?; // flags

        let balance = U8F8::from_bits(input.read_u16::<BigEndian>()?);
        input.read_u16::<BigEndian>()?; // reserved

        Ok(Self { balance })
    }
}

// 8.7.2
#[derive(Debug)]
pub struct DataEntryUrl {
    pub location: String,
}

impl Encode for DataEntryUrl {
    fn size(&self) -> u64 {
        4 + 4 + 1 + 3 + self.location.size()
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        (self.size() as u32).encode(output)?; // size
        u32::from_be_bytes(*b"url ").encode(output)?; // type
        output.write_u8(0)?; // version
        // flags: self-contained when the media sits in this very file
        output.write_u24::<BigEndian>(u32::from(self.location.is_empty()))?;

        self.location.encode(output)
    }
}

#[derive(Debug)]
pub struct DataReference {
    pub entries: Vec<DataEntryUrl>,
}

impl Encode for DataReference {
    fn size(&self) -> u64 {
        4 + 4 + 1 + 3 + 4 + self.entries.iter().map(Encode::size).sum::<u64>()
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        (self.size() as u32).encode(output)?; // size
        u32::from_be_bytes(*b"dref").encode(output)?; // type
        output.write_u8(0)?; // version
        output.write_u24::<BigEndian>(0)?; // flags

        (self.entries.len() as u32).encode(output)?;
        for entry in &self.entries {
            entry.encode(output)?;
        }
        Ok(())
    }
}

// 8.7.1
#[derive(Debug)]
pub struct DataInformation {
    pub reference: DataReference,
}

impl Default for DataInformation {
    fn default() -> Self {
        Self {
            reference: DataReference {
                entries: vec![DataEntryUrl {
                    location: String::new(),
                }],
            },
        }
    }
}

impl Encode for DataInformation {
    fn size(&self) -> u64 {
        4 + 4 + self.reference.size()
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        (self.size() as u32).encode(output)?; // size
        u32::from_be_bytes(*b"dinf").encode(output)?; // type

        self.reference.encode(output)
    }
}
