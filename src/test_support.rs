//! Hand-assembled fixtures shared across the test modules.

use std::borrow::Cow;

use fixed_macro::types::U16F16;

use crate::{
    descriptor::{DecoderConfigDescriptor, EsDescriptor, SlConfigDescriptor, OBJECT_TYPE_AAC},
    r#box::{
        media::{DataInformation, Handler, MediaHeader, SoundMediaHeader},
        movie::MovieHeader,
        sample_table::{
            ChunkOffset, Mp4AudioSampleEntry, SampleDescription, SampleSize, SampleToChunk,
            SampleToChunkEntry, TimeToSample, TimeToSampleEntry,
        },
        track::TrackHeader,
        ContainerBox, Encode, FourCC,
    },
};

pub(crate) fn container(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut bytes = ((4 + 4 + body.len()) as u32).to_be_bytes().to_vec();
    bytes.extend_from_slice(kind);
    bytes.extend_from_slice(body);
    bytes
}

/// Offset of the first box whose type matches, by naive pattern scan; good
/// enough to patch fields inside synthetic fixtures.
pub(crate) fn find_box(buffer: &[u8], kind: &[u8; 4]) -> Option<usize> {
    (0..buffer.len().saturating_sub(8)).find(|&offset| &buffer[offset + 4..offset + 8] == kind)
}

/// A bare trak > mdia > hdlr chain, just enough to select tracks by handler.
pub(crate) fn track(handler: &[u8; 4]) -> Vec<u8> {
    let hdlr = Handler {
        r#type: FourCC::new(*handler),
        name: String::new(),
    }
    .encode_to_vec()
    .unwrap();
    container(b"trak", &container(b"mdia", &hdlr))
}

pub(crate) fn audio_entry(object_type_indication: u8) -> Mp4AudioSampleEntry {
    Mp4AudioSampleEntry {
        data_reference_index: 1,
        channel_count: 2,
        sample_size: 16,
        sample_rate: U16F16!(44100),
        es: EsDescriptor {
            es_id: 0,
            depends_on_es_id: None,
            url: None,
            ocr_es_id: None,
            stream_priority: 0,
            decoder_config: DecoderConfigDescriptor {
                object_type_indication,
                stream_type: 0x05,
                up_stream: false,
                buffer_size_db: 0,
                max_bitrate: 0,
                avg_bitrate: 0,
                specific_info: if object_type_indication == OBJECT_TYPE_AAC {
                    vec![0x12, 0x10]
                } else {
                    Vec::new()
                },
            },
            sl_config: SlConfigDescriptor { predefined: 2 },
        },
    }
}

pub(crate) fn audio_file(samples: &[&[u8]], chunk_sizes: &[u32]) -> Vec<u8> {
    audio_file_with(samples, chunk_sizes, OBJECT_TYPE_AAC)
}

/// An [mdat][moov] file holding one soun track over `samples`, grouped into
/// chunks of `chunk_sizes` samples each, with a minimal run-length stsc.
pub(crate) fn audio_file_with(
    samples: &[&[u8]],
    chunk_sizes: &[u32],
    object_type_indication: u8,
) -> Vec<u8> {
    assert_eq!(chunk_sizes.iter().sum::<u32>() as usize, samples.len());

    let mut mdat_body = Vec::new();
    let mut offsets = Vec::new();
    let mut cursor = 0;
    for &count in chunk_sizes {
        offsets.push((4 + 4 + mdat_body.len()) as u32);
        for _ in 0..count {
            mdat_body.extend_from_slice(samples[cursor]);
            cursor += 1;
        }
    }

    let mut stsc_entries: Vec<SampleToChunkEntry> = Vec::new();
    for (index, &count) in chunk_sizes.iter().enumerate() {
        if stsc_entries
            .last()
            .map_or(true, |entry| entry.samples_per_chunk != count)
        {
            stsc_entries.push(SampleToChunkEntry {
                first_chunk: index as u32 + 1,
                samples_per_chunk: count,
                sample_description_index: 1,
            });
        }
    }

    let stbl = ContainerBox::new(
        *b"stbl",
        vec![
            Cow::Owned(
                SampleDescription {
                    mp4a: Some(audio_entry(object_type_indication)),
                }
                .encode_to_vec()
                .unwrap(),
            ),
            Cow::Owned(
                TimeToSample {
                    entries: vec![TimeToSampleEntry {
                        sample_count: samples.len() as u32,
                        sample_delta: 1024,
                    }],
                }
                .encode_to_vec()
                .unwrap(),
            ),
            Cow::Owned(
                SampleToChunk {
                    entries: stsc_entries,
                }
                .encode_to_vec()
                .unwrap(),
            ),
            Cow::Owned(
                SampleSize::Unique(samples.iter().map(|sample| sample.len() as u32).collect())
                    .encode_to_vec()
                    .unwrap(),
            ),
            Cow::Owned(ChunkOffset { entries: offsets }.encode_to_vec().unwrap()),
        ],
    );
    let minf = ContainerBox::new(
        *b"minf",
        vec![
            Cow::Owned(SoundMediaHeader::default().encode_to_vec().unwrap()),
            Cow::Owned(DataInformation::default().encode_to_vec().unwrap()),
            Cow::Owned(stbl.encode_to_vec().unwrap()),
        ],
    );
    let mdia = ContainerBox::new(
        *b"mdia",
        vec![
            Cow::Owned(
                MediaHeader {
                    timescale: 600,
                    ..Default::default()
                }
                .encode_to_vec()
                .unwrap(),
            ),
            Cow::Owned(
                Handler {
                    r#type: FourCC::new(*b"soun"),
                    name: "SoundHandler".to_string(),
                }
                .encode_to_vec()
                .unwrap(),
            ),
            Cow::Owned(minf.encode_to_vec().unwrap()),
        ],
    );
    let trak = ContainerBox::new(
        *b"trak",
        vec![
            Cow::Owned(
                TrackHeader {
                    track_id: 1,
                    ..Default::default()
                }
                .encode_to_vec()
                .unwrap(),
            ),
            Cow::Owned(mdia.encode_to_vec().unwrap()),
        ],
    );
    let moov = ContainerBox::new(
        *b"moov",
        vec![
            Cow::Owned(
                MovieHeader {
                    timescale: 600,
                    next_track_id: 2,
                    ..Default::default()
                }
                .encode_to_vec()
                .unwrap(),
            ),
            Cow::Owned(trak.encode_to_vec().unwrap()),
        ],
    );

    let mut file = container(b"mdat", &mdat_body);
    file.extend_from_slice(&moov.encode_to_vec().unwrap());
    file
}

/// A raw ADTS stream of the given frame payloads.
pub(crate) fn adts_stream(payloads: &[&[u8]], frequency_index: u8, channels: u8) -> Vec<u8> {
    let mut stream = Vec::new();
    for payload in payloads {
        let frame_length = payload.len() + 7;
        stream.extend_from_slice(&[
            0xFF,
            0xF9,
            0x40 | frequency_index << 2 | channels >> 2,
            channels << 6 | (frame_length >> 11) as u8,
            (frame_length >> 3) as u8,
            (frame_length << 5) as u8 | 0x1F,
            0xFC,
        ]);
        stream.extend_from_slice(payload);
    }
    stream
}
