use std::io::Write;

use derivative::Derivative;

use crate::{
    r#box::{Decode, Encode, FourCC},
    Result,
};

// 4.3
#[derive(Debug)]
pub struct FileType {
    pub major_brand: FourCC,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCC>,
}

impl FileType {
    /// The brand set written on every M4A this crate produces.
    pub fn m4a() -> Self {
        Self {
            major_brand: FourCC::new(*b"M4A "),
            minor_version: 1,
            compatible_brands: vec![
                FourCC::new(*b"isom"),
                FourCC::new(*b"M4A "),
                FourCC::new(*b"mp42"),
            ],
        }
    }
}

impl Encode for FileType {
    fn size(&self) -> u64 {
        4 + 4 + 4 + 4 + self.compatible_brands.len() as u64 * 4
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        (self.size() as u32).encode(output)?; // size
        u32::from_be_bytes(*b"ftyp").encode(output)?; // type

        self.major_brand.0.encode(output)?;
        self.minor_version.encode(output)?;
        for compatible_brand in &self.compatible_brands {
            compatible_brand.0.encode(output)?;
        }
        Ok(())
    }
}

impl Decode for FileType {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        let major_brand = FourCC(Decode::decode(input)?);
        let minor_version = Decode::decode(input)?;
        let compatible_brands = input
            .chunks_exact(4)
            .map(|chunk| FourCC(u32::from_be_bytes(chunk.try_into().unwrap())))
            .collect();
        *input = &input[input.len()..];

        Ok(Self {
            major_brand,
            minor_version,
            compatible_brands,
        })
    }
}

// 8.1.1
#[derive(Derivative)]
#[derivative(Debug)]
pub struct MediaData<'a> {
    #[derivative(Debug = "ignore")]
    pub chunks: Vec<&'a [u8]>,
}

impl Encode for MediaData<'_> {
    fn size(&self) -> u64 {
        4 + 4 + self.chunks.iter().map(|chunk| chunk.len() as u64).sum::<u64>()
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        (self.size() as u32).encode(output)?; // size
        u32::from_be_bytes(*b"mdat").encode(output)?; // type

        for chunk in &self.chunks {
            output.write_all(chunk)?;
        }
        Ok(())
    }
}
