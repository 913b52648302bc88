use std::borrow::Cow;

use fixed::types::U16F16;

use crate::{
    bit::BitReader,
    descriptor::{
        audio_specific_config, sample_rate, DecoderConfigDescriptor, EsDescriptor,
        SlConfigDescriptor, OBJECT_TYPE_AAC,
    },
    r#box::{
        file::{FileType, MediaData},
        media::{DataInformation, Handler, MediaHeader, SoundMediaHeader},
        movie::MovieHeader,
        sample_table::{
            ChunkOffset, Mp4AudioSampleEntry, SampleDescription, SampleSize, SampleToChunk,
            SampleToChunkEntry, TimeToSample, TimeToSampleEntry,
        },
        track::TrackHeader,
        ContainerBox, Encode, FourCC,
    },
    Error, Result,
};

const TIMESCALE: u32 = 600;
const SAMPLES_PER_CHUNK: u32 = 16;

/// Stream-wide parameters, identical in every frame of one ADTS stream.
#[derive(Debug)]
struct FixedHeader {
    sampling_frequency_index: u8,
    channel_configuration: u8,
}

impl FixedHeader {
    fn decode(reader: &mut BitReader) -> Result<Self> {
        if reader.read_bits(12)? != 0xFFF {
            return Err(Error::MalformedContainer("missing adts syncword"));
        }
        reader.skip_bits(1 + 2 + 1)?; // id, layer, protection_absent
        reader.skip_bits(2)?; // profile
        let sampling_frequency_index = reader.read_bits(4)? as u8;
        reader.skip_bits(1)?; // private_bit
        let channel_configuration = reader.read_bits(3)? as u8;

        Ok(Self {
            sampling_frequency_index,
            channel_configuration,
        })
    }
}

/// Packages a raw ADTS stream into an M4A container.
///
/// Two passes over the input: a peek at the first fixed header for the
/// stream-wide rate and channel count, then a rewind and a frame walk that
/// collects every payload as one MP4 sample.
pub fn aac_to_m4a(buffer: &[u8]) -> Result<Vec<u8>> {
    let mut reader = BitReader::new(buffer);
    let header = FixedHeader::decode(&mut reader)?;
    reader.rewind();

    let mut samples = Vec::new();
    let mut buffer_size_db = 0u32;
    while !reader.eof() {
        reader.skip_bits(30)?; // fixed header up to the frame length
        let frame_length = reader.read_bits(13)?;
        reader.skip_bits(11 + 2)?; // buffer fullness, raw data block count
        let payload = frame_length
            .checked_sub(7)
            .ok_or(Error::MalformedContainer("adts frame shorter than its header"))?;
        samples.push(reader.read_bytes(payload as usize)?);
        buffer_size_db = buffer_size_db.max(payload);
    }

    let sample_rate = sample_rate(header.sampling_frequency_index)
        .ok_or(Error::MalformedContainer("reserved sampling frequency index"))?;
    let duration = samples.len() as u64 * 1024 * TIMESCALE as u64 / sample_rate as u64;
    let channels = header.channel_configuration;

    let file_type = FileType::m4a();
    let movie_header = MovieHeader {
        timescale: TIMESCALE,
        duration,
        next_track_id: 2,
        ..Default::default()
    };
    let track_header = TrackHeader {
        track_id: 1,
        duration,
        ..Default::default()
    };
    let media_header = MediaHeader {
        timescale: TIMESCALE,
        duration,
        ..Default::default()
    };
    let handler = Handler {
        r#type: FourCC::new(*b"soun"),
        name: "SoundHandler".to_string(),
    };
    let sound_header = SoundMediaHeader::default();
    let data_information = DataInformation::default();

    let description = SampleDescription {
        mp4a: Some(Mp4AudioSampleEntry {
            data_reference_index: 1,
            channel_count: channels as u16,
            sample_size: 16,
            sample_rate: U16F16::from_bits(sample_rate << 16),
            es: EsDescriptor {
                es_id: 0,
                depends_on_es_id: None,
                url: None,
                ocr_es_id: None,
                stream_priority: 0,
                decoder_config: DecoderConfigDescriptor {
                    object_type_indication: OBJECT_TYPE_AAC,
                    stream_type: 0x05,
                    up_stream: false,
                    buffer_size_db,
                    max_bitrate: 0,
                    avg_bitrate: 0,
                    specific_info: audio_specific_config(sample_rate, channels)?.to_vec(),
                },
                sl_config: SlConfigDescriptor { predefined: 2 },
            },
        }),
    };
    let time_to_sample = TimeToSample {
        entries: vec![TimeToSampleEntry {
            sample_count: samples.len() as u32,
            sample_delta: 1024,
        }],
    };
    let sample_size =
        SampleSize::Unique(samples.iter().map(|sample| sample.len() as u32).collect());

    // chunks of 16 samples; a short trailing chunk gets its own stsc entry
    let remainder = samples.len() as u32 % SAMPLES_PER_CHUNK;
    let mut entries = vec![SampleToChunkEntry {
        first_chunk: 1,
        samples_per_chunk: SAMPLES_PER_CHUNK,
        sample_description_index: 1,
    }];
    if remainder != 0 {
        entries.push(SampleToChunkEntry {
            first_chunk: samples.len() as u32 / SAMPLES_PER_CHUNK + 1,
            samples_per_chunk: remainder,
            sample_description_index: 1,
        });
    }
    let sample_to_chunk = SampleToChunk { entries };
    let chunk_count = samples.len().div_ceil(SAMPLES_PER_CHUNK as usize);

    // Layout pass: all sizes above are pure functions of the structure, so
    // the first sample's absolute position is known before stco is filled.
    let mut offset = file_type.size()
        + 6 * (4 + 4) // moov, trak, mdia, minf, stbl, mdat headers
        + movie_header.size()
        + track_header.size()
        + media_header.size()
        + handler.size()
        + sound_header.size()
        + data_information.size()
        + description.size()
        + time_to_sample.size()
        + sample_size.size()
        + sample_to_chunk.size()
        + ChunkOffset::size_for(chunk_count);

    let mut chunk_offsets = Vec::with_capacity(chunk_count);
    for (index, sample) in samples.iter().enumerate() {
        if index as u32 % SAMPLES_PER_CHUNK == 0 {
            chunk_offsets.push(offset as u32);
        }
        offset += sample.len() as u64;
    }
    let chunk_offset = ChunkOffset {
        entries: chunk_offsets,
    };

    let stbl = ContainerBox::new(
        *b"stbl",
        vec![
            Cow::Owned(description.encode_to_vec()?),
            Cow::Owned(time_to_sample.encode_to_vec()?),
            Cow::Owned(sample_size.encode_to_vec()?),
            Cow::Owned(sample_to_chunk.encode_to_vec()?),
            Cow::Owned(chunk_offset.encode_to_vec()?),
        ],
    );
    let minf = ContainerBox::new(
        *b"minf",
        vec![
            Cow::Owned(sound_header.encode_to_vec()?),
            Cow::Owned(data_information.encode_to_vec()?),
            Cow::Owned(stbl.encode_to_vec()?),
        ],
    );
    let mdia = ContainerBox::new(
        *b"mdia",
        vec![
            Cow::Owned(media_header.encode_to_vec()?),
            Cow::Owned(handler.encode_to_vec()?),
            Cow::Owned(minf.encode_to_vec()?),
        ],
    );
    let trak = ContainerBox::new(
        *b"trak",
        vec![
            Cow::Owned(track_header.encode_to_vec()?),
            Cow::Owned(mdia.encode_to_vec()?),
        ],
    );
    let moov = ContainerBox::new(
        *b"moov",
        vec![
            Cow::Owned(movie_header.encode_to_vec()?),
            Cow::Owned(trak.encode_to_vec()?),
        ],
    );
    let media_data = MediaData { chunks: samples };

    let mut output =
        Vec::with_capacity((file_type.size() + moov.size() + media_data.size()) as usize);
    file_type.encode(&mut output)?;
    moov.encode(&mut output)?;
    media_data.encode(&mut output)?;
    Ok(output)
}
