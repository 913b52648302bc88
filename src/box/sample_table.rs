use std::io::Write;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use derivative::Derivative;
use fixed::types::U16F16;

use crate::{
    descriptor::EsDescriptor,
    r#box::{next_box, Decode, Encode, FourCC},
    Error, Result,
};

// 8.5.2
#[derive(Debug)]
pub struct SampleDescription {
    /// The first mp4a entry; other entry kinds are skipped, never rebuilt.
    pub mp4a: Option<Mp4AudioSampleEntry>,
}

impl Encode for SampleDescription {
    fn size(&self) -> u64 {
        4 + 4 + 1 + 3 + 4 + self.mp4a.as_ref().map_or(0, Encode::size)
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        (self.size() as u32).encode(output)?; // size
        u32::from_be_bytes(*b"stsd").encode(output)?; // type
        output.write_u8(0)?; // version
        output.write_u24::<BigEndian>(0)?; // flags

        (self.mp4a.iter().len() as u32).encode(output)?;
        if let Some(mp4a) = &self.mp4a {
            mp4a.encode(output)?;
        }
        Ok(())
    }
}

impl Decode for SampleDescription {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        input.read_u8()?; // version
        input.read_u24::<BigEndian>()?; // flags

        let mut mp4a = None;

        let entry_count = input.read_u32::<BigEndian>()?;
        for _ in 0..entry_count {
            let (kind, mut data) = next_box(input)?;
            if kind == FourCC::new(*b"mp4a") && mp4a.is_none() {
                mp4a = Some(Decode::decode(&mut data)?)
            }
        }

        Ok(Self { mp4a })
    }
}

// 12.2.3, with the esds child unwrapped into the entry
#[derive(Debug)]
pub struct Mp4AudioSampleEntry {
    pub data_reference_index: u16,
    pub channel_count: u16,
    pub sample_size: u16,
    pub sample_rate: U16F16,
    pub es: EsDescriptor,
}

impl Encode for Mp4AudioSampleEntry {
    fn size(&self) -> u64 {
        4 + 4 + 6 + 2 + 2 * 4 + 2 + 2 + 2 + 2 + 4 + (4 + 4 + 1 + 3 + self.es.size())
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        (self.size() as u32).encode(output)?; // size
        u32::from_be_bytes(*b"mp4a").encode(output)?; // type

        for _ in 0..6 {
            output.write_u8(0)?; // reserved
        }
        self.data_reference_index.encode(output)?;
        0u32.encode(output)?; // reserved
        0u32.encode(output)?; // reserved
        self.channel_count.encode(output)?;
        self.sample_size.encode(output)?;
        0u16.encode(output)?; // pre_defined
        0u16.encode(output)?; // reserved
        self.sample_rate.encode(output)?;

        ((4 + 4 + 1 + 3 + self.es.size()) as u32).encode(output)?; // size
        u32::from_be_bytes(*b"esds").encode(output)?; // type
        output.write_u8(0)?; // version
        output.write_u24::<BigEndian>(0)?; // flags
        self.es.encode(output)
    }
}

impl Decode for Mp4AudioSampleEntry {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        for _ in 0..6 {
            input.read_u8()?; // reserved
        }
        let data_reference_index = Decode::decode(input)?;
        input.read_u32::<BigEndian>()?; // reserved
        input.read_u32::<BigEndian>()?; // reserved
        let channel_count = Decode::decode(input)?;
        let sample_size = Decode::decode(input)?;
        input.read_u16::<BigEndian>()?; // pre_defined
        input.read_u16::<BigEndian>()?; // reserved
        let sample_rate = Decode::decode(input)?;

        let mut es = None;
        while !input.is_empty() {
            let (kind, mut data) = next_box(input)?;
            if kind == FourCC::new(*b"esds") && es.is_none() {
                data.read_u8()?; // version
                data.read_u24::<BigEndian>()?; // flags
                es = Some(Decode::decode(&mut data)?)
            }
        }

        Ok(Self {
            data_reference_index,
            channel_count,
            sample_size,
            sample_rate,
            es: es.ok_or(Error::MalformedContainer("mp4a entry without esds"))?,
        })
    }
}

// 8.6.1.2
#[derive(Debug)]
pub struct TimeToSample {
    pub entries: Vec<TimeToSampleEntry>,
}

#[derive(Debug)]
pub struct TimeToSampleEntry {
    pub sample_count: u32,
    pub sample_delta: u32,
}

impl Encode for TimeToSample {
    fn size(&self) -> u64 {
        4 + 4 + 1 + 3 + 4 + self.entries.len() as u64 * (4 + 4)
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        (self.size() as u32).encode(output)?; // size
        u32::from_be_bytes(*b"stts").encode(output)?; // type
        output.write_u8(0)?; // version
        output.write_u24::<BigEndian>(0)?; // flags

        (self.entries.len() as u32).encode(output)?;
        for entry in &self.entries {
            entry.sample_count.encode(output)?;
            entry.sample_delta.encode(output)?;
        }
        Ok(())
    }
}

impl Decode for TimeToSample {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        input.read_u8()?; // version
        input.read_u24::<BigEndian>()?; // flags

        let entry_count = input.read_u32::<BigEndian>()?;
        let mut entries = Vec::default();
        for _ in 0..entry_count {
            entries.push(TimeToSampleEntry {
                sample_count: input.read_u32::<BigEndian>()?,
                sample_delta: input.read_u32::<BigEndian>()?,
            })
        }

        Ok(Self { entries })
    }
}

// 8.7.4
#[derive(Debug)]
pub struct SampleToChunk {
    pub entries: Vec<SampleToChunkEntry>,
}

#[derive(Debug)]
pub struct SampleToChunkEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

impl Encode for SampleToChunk {
    fn size(&self) -> u64 {
        4 + 4 + 1 + 3 + 4 + self.entries.len() as u64 * (4 + 4 + 4)
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        (self.size() as u32).encode(output)?; // size
        u32::from_be_bytes(*b"stsc").encode(output)?; // type
        output.write_u8(0)?; // version
        output.write_u24::<BigEndian>(0)?; // flags

        (self.entries.len() as u32).encode(output)?;
        for entry in &self.entries {
            entry.first_chunk.encode(output)?;
            entry.samples_per_chunk.encode(output)?;
            entry.sample_description_index.encode(output)?;
        }
        Ok(())
    }
}

impl Decode for SampleToChunk {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        input.read_u8()?; // version
        input.read_u24::<BigEndian>()?; // flags

        let entry_count = input.read_u32::<BigEndian>()?;
        let mut entries = Vec::default();
        for _ in 0..entry_count {
            entries.push(SampleToChunkEntry {
                first_chunk: input.read_u32::<BigEndian>()?,
                samples_per_chunk: input.read_u32::<BigEndian>()?,
                sample_description_index: input.read_u32::<BigEndian>()?,
            })
        }

        Ok(Self { entries })
    }
}

// 8.7.3.2
#[derive(Derivative)]
#[derivative(Debug)]
pub enum SampleSize {
    Global {
        sample_size: u32,
        sample_count: u32,
    },
    Unique(#[derivative(Debug = "ignore")] Vec<u32>),
}

impl SampleSize {
    pub fn sample_count(&self) -> u32 {
        match self {
            SampleSize::Global { sample_count, .. } => *sample_count,
            SampleSize::Unique(sizes) => sizes.len() as u32,
        }
    }

    /// Byte size of one sample; `index` must be below [Self::sample_count].
    pub fn at(&self, index: u32) -> u32 {
        match self {
            SampleSize::Global { sample_size, .. } => *sample_size,
            SampleSize::Unique(sizes) => sizes[index as usize],
        }
    }
}

impl Encode for SampleSize {
    fn size(&self) -> u64 {
        4 + 4
            + 1
            + 3
            + 4
            + 4
            + match self {
                SampleSize::Global { .. } => 0,
                SampleSize::Unique(sizes) => sizes.len() as u64 * 4,
            }
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        (self.size() as u32).encode(output)?; // size
        u32::from_be_bytes(*b"stsz").encode(output)?; // type
        output.write_u8(0)?; // version
        output.write_u24::<BigEndian>(0)?; // flags

        match self {
            SampleSize::Global {
                sample_size,
                sample_count,
            } => {
                sample_size.encode(output)?;
                sample_count.encode(output)?;
            }
            SampleSize::Unique(sizes) => {
                0u32.encode(output)?; // sample_size
                (sizes.len() as u32).encode(output)?;
                for size in sizes {
                    size.encode(output)?;
                }
            }
        }
        Ok(())
    }
}

impl Decode for SampleSize {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        input.read_u8()?; // version
        input.read_u24::<BigEndian>()?; // flags

        let sample_size = input.read_u32::<BigEndian>()?;
        let sample_count = input.read_u32::<BigEndian>()?;
        if sample_size != 0 {
            return Ok(SampleSize::Global {
                sample_size,
                sample_count,
            });
        }

        let mut sizes = Vec::default();
        for _ in 0..sample_count {
            sizes.push(input.read_u32::<BigEndian>()?)
        }

        Ok(SampleSize::Unique(sizes))
    }
}

// 8.7.5
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ChunkOffset {
    #[derivative(Debug = "ignore")]
    pub entries: Vec<u32>,
}

impl ChunkOffset {
    /// Serialized size of an stco holding `entry_count` offsets, known before
    /// the offsets themselves are.
    pub fn size_for(entry_count: usize) -> u64 {
        4 + 4 + 1 + 3 + 4 + entry_count as u64 * 4
    }
}

impl Encode for ChunkOffset {
    fn size(&self) -> u64 {
        Self::size_for(self.entries.len())
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        (self.size() as u32).encode(output)?; // size
        u32::from_be_bytes(*b"stco").encode(output)?; // type
        output.write_u8(0)?; // version
        output.write_u24::<BigEndian>(0)?; // flags

        (self.entries.len() as u32).encode(output)?;
        for entry in &self.entries {
            entry.encode(output)?;
        }
        Ok(())
    }
}

impl Decode for ChunkOffset {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        input.read_u8()?; // version
        input.read_u24::<BigEndian>()?; // flags

        let entry_count = input.read_u32::<BigEndian>()?;
        let mut entries = Vec::default();
        for _ in 0..entry_count {
            entries.push(input.read_u32::<BigEndian>()?)
        }

        Ok(Self { entries })
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
pub struct ChunkOffset64 {
    #[derivative(Debug = "ignore")]
    pub entries: Vec<u64>,
}

impl Encode for ChunkOffset64 {
    fn size(&self) -> u64 {
        4 + 4 + 1 + 3 + 4 + self.entries.len() as u64 * 8
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        (self.size() as u32).encode(output)?; // size
        u32::from_be_bytes(*b"co64").encode(output)?; // type
        output.write_u8(0)?; // version
        output.write_u24::<BigEndian>(0)?; // flags

        (self.entries.len() as u32).encode(output)?;
        for entry in &self.entries {
            entry.encode(output)?;
        }
        Ok(())
    }
}

impl Decode for ChunkOffset64 {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        input.read_u8()?; // version
        input.read_u24::<BigEndian>()?; // flags

        let entry_count = input.read_u32::<BigEndian>()?;
        let mut entries = Vec::default();
        for _ in 0..entry_count {
            entries.push(input.read_u64::<BigEndian>()?)
        }

        Ok(Self { entries })
    }
}
