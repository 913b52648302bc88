use std::{
    borrow::Cow,
    fmt::{Debug, Formatter},
    io::Write,
};

use bstringify::bstringify;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use derivative::Derivative;
use fixed::types::{U16F16, U2F30, U8F8};
use fixed_macro::types::{U16F16, U2F30};

use crate::{Error, Result};

pub mod file;
pub mod media;
pub mod movie;
pub mod sample_table;
pub mod track;

use self::{
    file::FileType,
    media::{Handler, MediaHeader, SoundMediaHeader},
    movie::MovieHeader,
    sample_table::{
        ChunkOffset, ChunkOffset64, SampleDescription, SampleSize, SampleToChunk, TimeToSample,
    },
    track::TrackHeader,
};

pub trait Encode {
    fn size(&self) -> u64;

    fn encode(&self, output: &mut impl Write) -> Result<()>;

    fn encode_to_vec(&self) -> Result<Vec<u8>>
    where
        Self: Sized,
    {
        let mut output = Vec::with_capacity(self.size() as usize);
        self.encode(&mut output)?;
        Ok(output)
    }
}

pub trait Decode: Sized {
    fn decode(input: &mut &[u8]) -> Result<Self>;
}

impl Encode for u16 {
    fn size(&self) -> u64 {
        2
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        output.write_u16::<BigEndian>(*self)?;
        Ok(())
    }
}

impl Decode for u16 {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        Ok(input.read_u16::<BigEndian>()?)
    }
}

impl Encode for u32 {
    fn size(&self) -> u64 {
        4
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        output.write_u32::<BigEndian>(*self)?;
        Ok(())
    }
}

impl Decode for u32 {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        Ok(input.read_u32::<BigEndian>()?)
    }
}

impl Encode for u64 {
    fn size(&self) -> u64 {
        8
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        output.write_u64::<BigEndian>(*self)?;
        Ok(())
    }
}

impl Decode for u64 {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        Ok(input.read_u64::<BigEndian>()?)
    }
}

impl Encode for U8F8 {
    fn size(&self) -> u64 {
        2
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        output.write_u16::<BigEndian>(self.to_bits())?;
        Ok(())
    }
}

impl Decode for U8F8 {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        Ok(Self::from_bits(input.read_u16::<BigEndian>()?))
    }
}

impl Encode for U16F16 {
    fn size(&self) -> u64 {
        4
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        output.write_u32::<BigEndian>(self.to_bits())?;
        Ok(())
    }
}

impl Decode for U16F16 {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        Ok(Self::from_bits(input.read_u32::<BigEndian>()?))
    }
}

impl Encode for U2F30 {
    fn size(&self) -> u64 {
        4
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        output.write_u32::<BigEndian>(self.to_bits())?;
        Ok(())
    }
}

impl Decode for U2F30 {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        Ok(Self::from_bits(input.read_u32::<BigEndian>()?))
    }
}

impl Encode for String {
    fn size(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.as_bytes().len() as u64 + 1
        }
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        if !self.is_empty() {
            output.write_all(self.as_bytes())?;
            output.write_u8(0)?;
        }
        Ok(())
    }
}

impl Decode for String {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        let length = input.iter().position(|&c| c == 0).unwrap_or(input.len());
        let (data, remaining_data) = input.split_at(length);
        *input = remaining_data.get(1..).unwrap_or_default();
        String::from_utf8(data.to_owned())
            .map_err(|_| Error::MalformedContainer("string is not UTF-8"))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FourCC(pub u32);

impl FourCC {
    pub const fn new(value: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(value))
    }
}

impl Debug for FourCC {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for c in self.0.to_be_bytes() {
            std::fmt::Write::write_char(f, c as char)?;
        }
        Ok(())
    }
}

pub struct Language(pub u16);

impl Language {
    // "und", packed as three 5-bit letters
    pub const UND: Language = Language(0x55C4);
}

impl Debug for Language {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let bytes = self.0.to_be_bytes();
        let c0 = (bytes[0] >> 2 & 0x1F) + 0x60;
        let c1 = (((bytes[0] & 0x3) << 3) | (bytes[1] >> 5)) + 0x60;
        let c2 = (bytes[1] & 0x1F) + 0x60;
        for c in [c0, c1, c2] {
            std::fmt::Write::write_char(f, c as char)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Matrix {
    pub a: U16F16,
    pub b: U16F16,
    pub u: U2F30,
    pub c: U16F16,
    pub d: U16F16,
    pub v: U2F30,
    pub x: U16F16,
    pub y: U16F16,
    pub w: U2F30,
}

impl Matrix {
    pub fn identity() -> Self {
        Self {
            a: U16F16!(1),
            b: U16F16!(0),
            u: U2F30!(0),
            c: U16F16!(0),
            d: U16F16!(1),
            v: U2F30!(0),
            x: U16F16!(0),
            y: U16F16!(0),
            w: U2F30!(1),
        }
    }
}

impl Encode for Matrix {
    fn size(&self) -> u64 {
        9 * 4
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        self.a.encode(output)?;
        self.b.encode(output)?;
        self.u.encode(output)?;
        self.c.encode(output)?;
        self.d.encode(output)?;
        self.v.encode(output)?;
        self.x.encode(output)?;
        self.y.encode(output)?;
        self.w.encode(output)
    }
}

impl Decode for Matrix {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            a: Decode::decode(input)?,
            b: Decode::decode(input)?,
            u: Decode::decode(input)?,
            c: Decode::decode(input)?,
            d: Decode::decode(input)?,
            v: Decode::decode(input)?,
            x: Decode::decode(input)?,
            y: Decode::decode(input)?,
            w: Decode::decode(input)?,
        })
    }
}

/// Splits the next size-prefixed box off `input`, returning its type and body.
pub(crate) fn next_box<'a>(input: &mut &'a [u8]) -> Result<(FourCC, &'a [u8])> {
    let size = input.read_u32::<BigEndian>()? as usize;
    let kind = FourCC(input.read_u32::<BigEndian>()?);
    let body = size
        .checked_sub(4 + 4)
        .filter(|&length| length <= input.len())
        .ok_or(Error::MalformedContainer("box size past end of buffer"))?;
    let (data, remaining_data) = input.split_at(body);
    *input = remaining_data;
    Ok((kind, data))
}

/// Type of the synthetic root node returned by [parse].
pub const ROOT: FourCC = FourCC(0);

#[derive(Derivative)]
#[derivative(Debug)]
pub struct BoxNode<'a> {
    pub kind: FourCC,
    /// Exact source bytes backing this box, header included.
    #[derivative(Debug = "ignore")]
    pub data: &'a [u8],
    pub payload: Payload,
    pub children: Vec<BoxNode<'a>>,
}

#[derive(Debug)]
pub enum Payload {
    FileType(FileType),
    MovieHeader(MovieHeader),
    TrackHeader(TrackHeader),
    MediaHeader(MediaHeader),
    Handler(Handler),
    SoundMediaHeader(SoundMediaHeader),
    SampleDescription(SampleDescription),
    TimeToSample(TimeToSample),
    SampleToChunk(SampleToChunk),
    SampleSize(SampleSize),
    ChunkOffset(ChunkOffset),
    ChunkOffset64(ChunkOffset64),
    Container,
    Unknown,
}

fn is_container(kind: &[u8; 4]) -> bool {
    matches!(kind, b"moov" | b"trak" | b"mdia" | b"minf" | b"stbl" | b"dinf")
}

/// Parses an ISO-BMFF buffer into a box tree rooted at a synthetic [ROOT]
/// node whose children are the top-level boxes (ftyp, moov, mdat, ...).
///
/// Nodes borrow the input; no box bytes are copied.
pub fn parse(buffer: &[u8]) -> Result<BoxNode<'_>> {
    Ok(BoxNode {
        kind: ROOT,
        data: buffer,
        payload: Payload::Container,
        children: parse_boxes(buffer)?,
    })
}

fn parse_boxes(buffer: &[u8]) -> Result<Vec<BoxNode<'_>>> {
    let mut children = Vec::new();
    let mut offset = 0;
    while offset < buffer.len() {
        let child = parse_box(&buffer[offset..])?;
        offset += child.data.len();
        children.push(child);
    }
    Ok(children)
}

macro_rules! decode_payload {(
    $kind:ident, $body:ident,
    $(
        $type:ident => $variant:ident
    ),* $(,)?
) => (
    match &$kind.0.to_be_bytes() {
        $(
            bstringify!($type) => Payload::$variant(Decode::decode(&mut $body)?),
        )*
        _ => Payload::Unknown,
    }
)}

fn parse_box(input: &[u8]) -> Result<BoxNode<'_>> {
    if input.len() < 4 + 4 {
        return Err(Error::MalformedContainer("truncated box header"));
    }
    let declared = u32::from_be_bytes(input[..4].try_into().unwrap());
    let kind = FourCC(u32::from_be_bytes(input[4..8].try_into().unwrap()));
    let tag = kind.0.to_be_bytes();
    if tag.iter().any(|&c| !(0x20..=0x7E).contains(&c) && c != 0xA9) {
        return Err(Error::MalformedContainer("box type is not printable"));
    }

    let (size, header) = match declared {
        // size 0: box extends to the end of the enclosing scope
        0 => (input.len() as u64, 4 + 4),
        // size 1: 64-bit size follows the type
        1 => {
            if input.len() < 16 {
                return Err(Error::MalformedContainer("truncated box header"));
            }
            let largesize = u64::from_be_bytes(input[8..16].try_into().unwrap());
            if largesize < 16 {
                return Err(Error::MalformedContainer("box size below header length"));
            }
            (largesize, 16)
        }
        2..=7 => return Err(Error::MalformedContainer("box size below header length")),
        _ => (declared as u64, 4 + 4),
    };
    if size > input.len() as u64 {
        return Err(Error::MalformedContainer("box size past end of buffer"));
    }

    let data = &input[..size as usize];
    if is_container(&tag) {
        return Ok(BoxNode {
            kind,
            data,
            payload: Payload::Container,
            children: parse_boxes(&data[header..])?,
        });
    }

    let mut body = &data[header..];
    let payload = decode_payload! {
        kind, body,
        ftyp => FileType,
        mvhd => MovieHeader,
        tkhd => TrackHeader,
        mdhd => MediaHeader,
        hdlr => Handler,
        smhd => SoundMediaHeader,
        stsd => SampleDescription,
        stts => TimeToSample,
        stsc => SampleToChunk,
        stsz => SampleSize,
        stco => ChunkOffset,
        co64 => ChunkOffset64,
    };
    Ok(BoxNode {
        kind,
        data,
        payload,
        children: Vec::new(),
    })
}

/// Container box composer over already-serialized children, so rebuilt boxes
/// can sit next to byte ranges spliced straight out of a source file.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct ContainerBox<'a> {
    pub kind: [u8; 4],
    #[derivative(Debug = "ignore")]
    pub children: Vec<Cow<'a, [u8]>>,
}

impl<'a> ContainerBox<'a> {
    pub fn new(kind: [u8; 4], children: Vec<Cow<'a, [u8]>>) -> Self {
        Self { kind, children }
    }
}

impl Encode for ContainerBox<'_> {
    fn size(&self) -> u64 {
        4 + 4
            + self
                .children
                .iter()
                .map(|child| child.len() as u64)
                .sum::<u64>()
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        (self.size() as u32).encode(output)?; // size
        u32::from_be_bytes(self.kind).encode(output)?; // type

        for child in &self.children {
            output.write_all(child)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_top_level_boxes() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&[0, 0, 0, 16, b'f', b't', b'y', b'p']);
        buffer.extend_from_slice(b"M4A \x00\x00\x00\x01");
        buffer.extend_from_slice(&[0, 0, 0, 9, b'm', b'd', b'a', b't', 0xAB]);

        let tree = parse(&buffer).unwrap();
        assert_eq!(tree.kind, ROOT);
        assert_eq!(tree.children.len(), 2);
        assert_eq!(tree.children[0].kind, FourCC::new(*b"ftyp"));
        assert_eq!(tree.children[1].kind, FourCC::new(*b"mdat"));
        assert_eq!(tree.children[1].data, &buffer[16..]);

        match &tree.children[0].payload {
            Payload::FileType(file_type) => {
                assert_eq!(file_type.major_brand, FourCC::new(*b"M4A "));
                assert_eq!(file_type.minor_version, 1);
            }
            payload => panic!("unexpected payload: {payload:?}"),
        }
    }

    #[test]
    fn parse_descends_into_containers() {
        let mut hdlr = vec![0, 0, 0, 32 + 5, b'h', b'd', b'l', b'r'];
        hdlr.extend_from_slice(&[0; 4]); // version + flags
        hdlr.extend_from_slice(&[0; 4]); // pre_defined
        hdlr.extend_from_slice(b"soun");
        hdlr.extend_from_slice(&[0; 12]); // reserved
        hdlr.extend_from_slice(b"test\x00");

        let mut mdia = vec![0, 0, 0, 8 + hdlr.len() as u8, b'm', b'd', b'i', b'a'];
        mdia.extend_from_slice(&hdlr);
        let mut trak = vec![0, 0, 0, 8 + mdia.len() as u8, b't', b'r', b'a', b'k'];
        trak.extend_from_slice(&mdia);

        let tree = parse(&trak).unwrap();
        let trak = &tree.children[0];
        assert!(matches!(trak.payload, Payload::Container));
        let hdlr = &trak.children[0].children[0];
        match &hdlr.payload {
            Payload::Handler(handler) => {
                assert_eq!(handler.r#type, FourCC::new(*b"soun"));
                assert_eq!(handler.name, "test");
            }
            payload => panic!("unexpected payload: {payload:?}"),
        }
    }

    #[test]
    fn parse_reads_extended_size() {
        let mut buffer = vec![0, 0, 0, 1, b'm', b'd', b'a', b't'];
        buffer.extend_from_slice(&20u64.to_be_bytes());
        buffer.extend_from_slice(&[1, 2, 3, 4]);

        let tree = parse(&buffer).unwrap();
        assert_eq!(tree.children[0].data.len(), 20);
    }

    #[test]
    fn parse_accepts_open_ended_final_box() {
        let mut buffer = vec![0, 0, 0, 0, b'm', b'd', b'a', b't'];
        buffer.extend_from_slice(&[0xFF; 32]);

        let tree = parse(&buffer).unwrap();
        assert_eq!(tree.children[0].data.len(), 40);
    }

    #[test]
    fn parse_rejects_size_past_end_of_buffer() {
        let buffer = [0, 0, 1, 0, b'm', b'o', b'o', b'v'];
        assert!(matches!(
            parse(&buffer),
            Err(Error::MalformedContainer(_))
        ));
    }

    #[test]
    fn parse_rejects_size_below_header_length() {
        let buffer = [0, 0, 0, 7, b'f', b'r', b'e', b'e'];
        assert!(matches!(
            parse(&buffer),
            Err(Error::MalformedContainer(_))
        ));
    }

    #[test]
    fn parse_rejects_unprintable_type() {
        let buffer = [0, 0, 0, 8, 0x01, b'a', b'b', b'c'];
        assert!(matches!(
            parse(&buffer),
            Err(Error::MalformedContainer(_))
        ));
    }

    #[test]
    fn container_box_concatenates_children() {
        let stbl = ContainerBox::new(
            *b"stbl",
            vec![
                Cow::Borrowed(&[0, 0, 0, 8, b'f', b'r', b'e', b'e'][..]),
                Cow::Owned(vec![0, 0, 0, 9, b'f', b'r', b'e', b'e', 1]),
            ],
        );
        assert_eq!(stbl.size(), 8 + 8 + 9);

        let bytes = stbl.encode_to_vec().unwrap();
        assert_eq!(bytes.len() as u64, stbl.size());
        assert_eq!(&bytes[..8], &[0, 0, 0, 25, b's', b't', b'b', b'l']);
    }
}
