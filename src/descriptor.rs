//! MPEG-4 (ISO/IEC 14496-1) elementary stream descriptors, as carried in the
//! esds child of an mp4a sample entry, plus the codec constants shared by the
//! extraction and mux paths.

use std::{
    fmt::{self, Display, Formatter},
    io::Write,
};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::{
    r#box::{Decode, Encode},
    Error, Result,
};

const ES_DESCR_TAG: u8 = 0x03;
const DECODER_CONFIG_DESCR_TAG: u8 = 0x04;
const DECODER_SPECIFIC_INFO_TAG: u8 = 0x05;
const SL_CONFIG_DESCR_TAG: u8 = 0x06;

pub const OBJECT_TYPE_AAC: u8 = 0x40;
pub const OBJECT_TYPE_MP3: u8 = 0x6B;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Codec {
    Aac,
    Mp3,
}

impl Codec {
    pub fn from_object_type(object_type_indication: u8) -> Result<Self> {
        match object_type_indication {
            OBJECT_TYPE_AAC => Ok(Codec::Aac),
            OBJECT_TYPE_MP3 => Ok(Codec::Mp3),
            _ => Err(Error::UnsupportedCodec(object_type_indication)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Codec::Aac => "aac",
            Codec::Mp3 => "mp3",
        }
    }
}

impl Display for Codec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ISO/IEC 14496-3 sampling frequency table; the index into it is what ADTS
/// headers and the AudioSpecificConfig carry instead of a rate in Hz.
pub const SAMPLE_RATES: [u32; 12] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000,
];

pub fn frequency_index(sample_rate: u32) -> Result<u8> {
    SAMPLE_RATES
        .iter()
        .position(|&rate| rate == sample_rate)
        .map(|index| index as u8)
        .ok_or(Error::UnsupportedSampleRate(sample_rate))
}

pub fn sample_rate(frequency_index: u8) -> Option<u32> {
    SAMPLE_RATES.get(frequency_index as usize).copied()
}

/// Builds the 2-byte AudioSpecificConfig for AAC-LC (audio object type 2).
pub fn audio_specific_config(sample_rate: u32, channels: u8) -> Result<[u8; 2]> {
    let frequency_index = frequency_index(sample_rate)?;
    Ok([
        2 << 3 | frequency_index >> 1,
        frequency_index << 7 | channels << 3,
    ])
}

// Descriptors are length-prefixed like boxes, but with a one-byte tag and an
// expandable length of 1-4 bytes, 7 bits each, high bit flagging continuation.

fn length_of_length(length: u64) -> u64 {
    let mut count = 1;
    let mut value = length >> 7;
    while value != 0 {
        count += 1;
        value >>= 7;
    }
    count
}

fn descriptor_size(body: u64) -> u64 {
    1 + length_of_length(body) + body
}

fn encode_length(output: &mut impl Write, length: u64) -> Result<()> {
    for index in (0..length_of_length(length)).rev() {
        let byte = (length >> (7 * index)) as u8 & 0x7F;
        output.write_u8(if index == 0 { byte } else { byte | 0x80 })?;
    }
    Ok(())
}

fn decode_length(input: &mut &[u8]) -> Result<u64> {
    let mut length = 0;
    for _ in 0..4 {
        let byte = input.read_u8()?;
        length = length << 7 | (byte & 0x7F) as u64;
        if byte & 0x80 == 0 {
            return Ok(length);
        }
    }
    Err(Error::MalformedContainer("descriptor length over 4 bytes"))
}

fn next_descriptor<'a>(input: &mut &'a [u8]) -> Result<(u8, &'a [u8])> {
    let tag = input.read_u8()?;
    let length = decode_length(input)? as usize;
    if length > input.len() {
        return Err(Error::MalformedContainer(
            "descriptor length past end of buffer",
        ));
    }
    let (data, remaining_data) = input.split_at(length);
    *input = remaining_data;
    Ok((tag, data))
}

// 7.2.6.5
#[derive(Debug)]
pub struct EsDescriptor {
    pub es_id: u16,
    pub depends_on_es_id: Option<u16>,
    pub url: Option<String>,
    pub ocr_es_id: Option<u16>,
    pub stream_priority: u8,
    pub decoder_config: DecoderConfigDescriptor,
    pub sl_config: SlConfigDescriptor,
}

impl EsDescriptor {
    fn body_size(&self) -> u64 {
        2 + 1
            + self.depends_on_es_id.map_or(0, |_| 2)
            + self.url.as_ref().map_or(0, |url| 1 + url.len() as u64)
            + self.ocr_es_id.map_or(0, |_| 2)
            + self.decoder_config.size()
            + self.sl_config.size()
    }
}

impl Encode for EsDescriptor {
    fn size(&self) -> u64 {
        descriptor_size(self.body_size())
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        output.write_u8(ES_DESCR_TAG)?;
        encode_length(output, self.body_size())?;

        self.es_id.encode(output)?;
        output.write_u8(
            (self.depends_on_es_id.is_some() as u8) << 7
                | (self.url.is_some() as u8) << 6
                | (self.ocr_es_id.is_some() as u8) << 5
                | self.stream_priority & 0x1F,
        )?;
        if let Some(depends_on_es_id) = self.depends_on_es_id {
            depends_on_es_id.encode(output)?;
        }
        if let Some(url) = &self.url {
            output.write_u8(url.len() as u8)?;
            output.write_all(url.as_bytes())?;
        }
        if let Some(ocr_es_id) = self.ocr_es_id {
            ocr_es_id.encode(output)?;
        }
        self.decoder_config.encode(output)?;
        self.sl_config.encode(output)
    }
}

impl Decode for EsDescriptor {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        let (tag, mut body) = next_descriptor(input)?;
        if tag != ES_DESCR_TAG {
            return Err(Error::MalformedContainer("expected an ES descriptor"));
        }

        let es_id = body.read_u16::<BigEndian>()?;
        let flags = body.read_u8()?;
        let stream_priority = flags & 0x1F;
        let depends_on_es_id = if flags & 0x80 != 0 {
            Some(body.read_u16::<BigEndian>()?)
        } else {
            None
        };
        let url = if flags & 0x40 != 0 {
            let length = body.read_u8()? as usize;
            if length > body.len() {
                return Err(Error::MalformedContainer("url length past end of buffer"));
            }
            let (data, remaining_data) = body.split_at(length);
            body = remaining_data;
            Some(
                String::from_utf8(data.to_owned())
                    .map_err(|_| Error::MalformedContainer("url is not UTF-8"))?,
            )
        } else {
            None
        };
        let ocr_es_id = if flags & 0x20 != 0 {
            Some(body.read_u16::<BigEndian>()?)
        } else {
            None
        };

        let mut decoder_config = None;
        let mut sl_config = None;
        while !body.is_empty() {
            let (tag, mut data) = next_descriptor(&mut body)?;
            match tag {
                DECODER_CONFIG_DESCR_TAG if decoder_config.is_none() => {
                    decoder_config = Some(Decode::decode(&mut data)?)
                }
                SL_CONFIG_DESCR_TAG if sl_config.is_none() => {
                    sl_config = Some(SlConfigDescriptor {
                        predefined: data.read_u8()?,
                    })
                }
                _ => {}
            }
        }

        Ok(Self {
            es_id,
            depends_on_es_id,
            url,
            ocr_es_id,
            stream_priority,
            decoder_config: decoder_config
                .ok_or(Error::MalformedContainer("esds without a decoder config"))?,
            sl_config: sl_config
                .ok_or(Error::MalformedContainer("esds without an SL config"))?,
        })
    }
}

// 7.2.6.6
#[derive(Debug)]
pub struct DecoderConfigDescriptor {
    pub object_type_indication: u8,
    pub stream_type: u8,
    pub up_stream: bool,
    pub buffer_size_db: u32,
    pub max_bitrate: u32,
    pub avg_bitrate: u32,
    /// DecoderSpecificInfo payload, raw; the AudioSpecificConfig for AAC.
    pub specific_info: Vec<u8>,
}

impl DecoderConfigDescriptor {
    fn body_size(&self) -> u64 {
        13 + if self.specific_info.is_empty() {
            0
        } else {
            descriptor_size(self.specific_info.len() as u64)
        }
    }
}

impl Encode for DecoderConfigDescriptor {
    fn size(&self) -> u64 {
        descriptor_size(self.body_size())
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        output.write_u8(DECODER_CONFIG_DESCR_TAG)?;
        encode_length(output, self.body_size())?;

        output.write_u8(self.object_type_indication)?;
        output.write_u8(self.stream_type << 2 | (self.up_stream as u8) << 1 | 1)?;
        output.write_u24::<BigEndian>(self.buffer_size_db)?;
        self.max_bitrate.encode(output)?;
        self.avg_bitrate.encode(output)?;
        if !self.specific_info.is_empty() {
            output.write_u8(DECODER_SPECIFIC_INFO_TAG)?;
            encode_length(output, self.specific_info.len() as u64)?;
            output.write_all(&self.specific_info)?;
        }
        Ok(())
    }
}

impl Decode for DecoderConfigDescriptor {
    fn decode(input: &mut &[u8]) -> Result<Self> {
        let object_type_indication = input.read_u8()?;
        let flags = input.read_u8()?;
        let stream_type = flags >> 2;
        let up_stream = flags & 0x02 != 0;
        let buffer_size_db = input.read_u24::<BigEndian>()?;
        let max_bitrate = input.read_u32::<BigEndian>()?;
        let avg_bitrate = input.read_u32::<BigEndian>()?;

        let mut specific_info = Vec::new();
        while !input.is_empty() {
            let (tag, data) = next_descriptor(input)?;
            if tag == DECODER_SPECIFIC_INFO_TAG && specific_info.is_empty() {
                specific_info = data.to_owned()
            }
        }

        Ok(Self {
            object_type_indication,
            stream_type,
            up_stream,
            buffer_size_db,
            max_bitrate,
            avg_bitrate,
            specific_info,
        })
    }
}

// 7.3.2.3
#[derive(Debug)]
pub struct SlConfigDescriptor {
    pub predefined: u8,
}

impl Encode for SlConfigDescriptor {
    fn size(&self) -> u64 {
        descriptor_size(1)
    }

    fn encode(&self, output: &mut impl Write) -> Result<()> {
        output.write_u8(SL_CONFIG_DESCR_TAG)?;
        encode_length(output, 1)?;
        output.write_u8(self.predefined)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_specific_config_is_bit_exact() {
        // object type 2, frequency index 4, channel configuration 2
        assert_eq!(audio_specific_config(44100, 2).unwrap(), [0x12, 0x10]);
        assert_eq!(audio_specific_config(96000, 1).unwrap(), [0x10, 0x08]);
        assert_eq!(audio_specific_config(8000, 2).unwrap(), [0x15, 0x90]);
    }

    #[test]
    fn audio_specific_config_rejects_unknown_rates() {
        assert!(matches!(
            audio_specific_config(44000, 2),
            Err(Error::UnsupportedSampleRate(44000))
        ));
    }

    #[test]
    fn frequency_index_matches_table_order() {
        assert_eq!(frequency_index(96000).unwrap(), 0);
        assert_eq!(frequency_index(44100).unwrap(), 4);
        assert_eq!(frequency_index(8000).unwrap(), 11);
        assert_eq!(sample_rate(4), Some(44100));
        assert_eq!(sample_rate(12), None);
    }

    #[test]
    fn expandable_length_round_trip() {
        for length in [0u64, 1, 127, 128, 300, 16383, 16384, 1 << 21] {
            let mut bytes = Vec::new();
            encode_length(&mut bytes, length).unwrap();
            assert_eq!(bytes.len() as u64, length_of_length(length));
            assert_eq!(decode_length(&mut bytes.as_slice()).unwrap(), length);
        }
        // the canonical two-byte form
        let mut bytes = Vec::new();
        encode_length(&mut bytes, 300).unwrap();
        assert_eq!(bytes, [0x82, 0x2C]);
    }

    #[test]
    fn es_descriptor_round_trip() {
        let es = EsDescriptor {
            es_id: 0,
            depends_on_es_id: None,
            url: None,
            ocr_es_id: None,
            stream_priority: 0,
            decoder_config: DecoderConfigDescriptor {
                object_type_indication: OBJECT_TYPE_AAC,
                stream_type: 0x05,
                up_stream: false,
                buffer_size_db: 6144,
                max_bitrate: 128000,
                avg_bitrate: 96000,
                specific_info: vec![0x12, 0x10],
            },
            sl_config: SlConfigDescriptor { predefined: 2 },
        };
        let bytes = es.encode_to_vec().unwrap();
        assert_eq!(bytes.len() as u64, es.size());

        let decoded = EsDescriptor::decode(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded.es_id, 0);
        assert_eq!(decoded.stream_priority, 0);
        let config = &decoded.decoder_config;
        assert_eq!(config.object_type_indication, OBJECT_TYPE_AAC);
        assert_eq!(config.stream_type, 0x05);
        assert!(!config.up_stream);
        assert_eq!(config.buffer_size_db, 6144);
        assert_eq!(config.max_bitrate, 128000);
        assert_eq!(config.avg_bitrate, 96000);
        assert_eq!(config.specific_info, [0x12, 0x10]);
        assert_eq!(decoded.sl_config.predefined, 2);
    }

    #[test]
    fn es_descriptor_with_optional_fields() {
        let es = EsDescriptor {
            es_id: 7,
            depends_on_es_id: Some(3),
            url: Some("stream".to_string()),
            ocr_es_id: Some(5),
            stream_priority: 9,
            decoder_config: DecoderConfigDescriptor {
                object_type_indication: OBJECT_TYPE_MP3,
                stream_type: 0x05,
                up_stream: true,
                buffer_size_db: 0,
                max_bitrate: 0,
                avg_bitrate: 0,
                specific_info: Vec::new(),
            },
            sl_config: SlConfigDescriptor { predefined: 2 },
        };
        let bytes = es.encode_to_vec().unwrap();
        assert_eq!(bytes.len() as u64, es.size());

        let decoded = EsDescriptor::decode(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded.es_id, 7);
        assert_eq!(decoded.depends_on_es_id, Some(3));
        assert_eq!(decoded.url.as_deref(), Some("stream"));
        assert_eq!(decoded.ocr_es_id, Some(5));
        assert_eq!(decoded.stream_priority, 9);
        assert!(decoded.decoder_config.up_stream);
        assert!(decoded.decoder_config.specific_info.is_empty());
    }

    #[test]
    fn codec_from_object_type() {
        assert_eq!(Codec::from_object_type(OBJECT_TYPE_AAC).unwrap(), Codec::Aac);
        assert_eq!(Codec::from_object_type(OBJECT_TYPE_MP3).unwrap(), Codec::Mp3);
        assert!(matches!(
            Codec::from_object_type(0x20),
            Err(Error::UnsupportedCodec(0x20))
        ));
        assert_eq!(Codec::Aac.to_string(), "aac");
        assert_eq!(Codec::Mp3.to_string(), "mp3");
    }
}
