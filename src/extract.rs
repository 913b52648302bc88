use std::borrow::Cow;

use crate::{
    descriptor::{frequency_index, Codec},
    finder::find_one,
    r#box::{
        file::{FileType, MediaData},
        parse,
        sample_table::{ChunkOffset, ChunkOffset64},
        BoxNode, ContainerBox, Encode, FourCC, Payload,
    },
    sample::{audio_track, Chunk, SampleTableRefs},
    Error, Result,
};

/// Raw elementary stream pulled out of a container, tagged with its codec.
#[derive(Debug)]
pub struct RawAudio {
    pub codec: Codec,
    pub data: Vec<u8>,
}

fn required<'t, 'a>(
    root: &'t BoxNode<'a>,
    kind: [u8; 4],
    missing: &'static str,
) -> Result<&'t BoxNode<'a>> {
    find_one(root, FourCC::new(kind)).ok_or(Error::MalformedContainer(missing))
}

/// Remuxes the audio track of an MP4 into a standalone M4A.
///
/// Every box along the moov chain is spliced through byte-identical from the
/// source; only ftyp, the chunk offsets and mdat are rebuilt, because the
/// absolute sample positions move with the new layout.
pub fn extract_audio(buffer: &[u8]) -> Result<Vec<u8>> {
    let tree = parse(buffer)?;
    let mvhd = required(&tree, *b"mvhd", "file without mvhd")?;
    let track = audio_track(&tree)?;
    let tkhd = required(track, *b"tkhd", "track without tkhd")?;
    let mdhd = required(track, *b"mdhd", "track without mdhd")?;
    let hdlr = required(track, *b"hdlr", "track without hdlr")?;
    let smhd = required(track, *b"smhd", "track without smhd")?;
    let dinf = required(track, *b"dinf", "track without dinf")?;
    let tables = SampleTableRefs::gather(track)?;
    let chunks = tables.chunks(buffer)?;

    let file_type = FileType::m4a();
    let wide_offsets = matches!(tables.stco.payload, Payload::ChunkOffset64(_));
    let chunk_offset_size = 4 + 4 + 1 + 3 + 4 + chunks.len() as u64 * if wide_offsets { 8 } else { 4 };

    // Layout pass: ftyp, the six container headers (moov trak mdia minf stbl
    // mdat), every kept leaf, and a chunk-offset table of unchanged entry
    // count and width put the first sample at a known absolute position.
    let mut offset = file_type.size()
        + 6 * (4 + 4)
        + (mvhd.data.len()
            + tkhd.data.len()
            + mdhd.data.len()
            + hdlr.data.len()
            + smhd.data.len()
            + dinf.data.len()
            + tables.stsd.data.len()
            + tables.stts.data.len()
            + tables.stsc.data.len()
            + tables.stsz.data.len()) as u64
        + chunk_offset_size;

    let mut chunk_offsets = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        chunk_offsets.push(offset);
        offset += chunk.data.len() as u64;
    }
    let chunk_offset_bytes = if wide_offsets {
        ChunkOffset64 {
            entries: chunk_offsets,
        }
        .encode_to_vec()?
    } else {
        ChunkOffset {
            entries: chunk_offsets.iter().map(|&offset| offset as u32).collect(),
        }
        .encode_to_vec()?
    };

    let stbl = ContainerBox::new(
        *b"stbl",
        vec![
            Cow::Borrowed(tables.stsd.data),
            Cow::Borrowed(tables.stts.data),
            Cow::Borrowed(tables.stsc.data),
            Cow::Borrowed(tables.stsz.data),
            Cow::Owned(chunk_offset_bytes),
        ],
    );
    let minf = ContainerBox::new(
        *b"minf",
        vec![
            Cow::Borrowed(smhd.data),
            Cow::Borrowed(dinf.data),
            Cow::Owned(stbl.encode_to_vec()?),
        ],
    );
    let mdia = ContainerBox::new(
        *b"mdia",
        vec![
            Cow::Borrowed(mdhd.data),
            Cow::Borrowed(hdlr.data),
            Cow::Owned(minf.encode_to_vec()?),
        ],
    );
    let trak = ContainerBox::new(
        *b"trak",
        vec![Cow::Borrowed(tkhd.data), Cow::Owned(mdia.encode_to_vec()?)],
    );
    let moov = ContainerBox::new(
        *b"moov",
        vec![Cow::Borrowed(mvhd.data), Cow::Owned(trak.encode_to_vec()?)],
    );
    let media_data = MediaData {
        chunks: chunks.iter().map(|chunk| chunk.data).collect(),
    };

    let mut output =
        Vec::with_capacity((file_type.size() + moov.size() + media_data.size()) as usize);
    file_type.encode(&mut output)?;
    moov.encode(&mut output)?;
    media_data.encode(&mut output)?;
    Ok(output)
}

/// Extracts the audio track as a raw elementary stream: per-sample ADTS
/// framing for AAC, plain chunk concatenation for MP3.
pub fn extract_raw_audio(buffer: &[u8]) -> Result<RawAudio> {
    let tree = parse(buffer)?;
    let track = audio_track(&tree)?;
    let tables = SampleTableRefs::gather(track)?;
    let entry = tables.audio_entry()?;

    let codec = Codec::from_object_type(entry.es.decoder_config.object_type_indication)?;
    let chunks = tables.chunks(buffer)?;
    let data = match codec {
        Codec::Aac => {
            let frequency_index = frequency_index(entry.sample_rate.to_num())?;
            frame_adts(&tables, &chunks, frequency_index, entry.channel_count)?
        }
        Codec::Mp3 => {
            let mut data =
                Vec::with_capacity(chunks.iter().map(|chunk| chunk.data.len()).sum());
            for chunk in &chunks {
                data.extend_from_slice(chunk.data);
            }
            data
        }
    };
    Ok(RawAudio { codec, data })
}

/// Prefixes every sample with a 7-byte ADTS header carrying the stream-wide
/// profile/rate/channel bits and the per-frame 13-bit length (sample + 7).
fn frame_adts(
    tables: &SampleTableRefs,
    chunks: &[Chunk],
    frequency_index: u8,
    channels: u16,
) -> Result<Vec<u8>> {
    let sample_size = tables.sample_size()?;
    let payload: usize = chunks.iter().map(|chunk| chunk.data.len()).sum();
    let mut output = Vec::with_capacity(payload + sample_size.sample_count() as usize * 7);

    for chunk in chunks {
        let mut position = 0;
        for index in chunk.first_sample..chunk.first_sample + chunk.sample_count {
            let size = sample_size.at(index) as usize;
            let frame_length = size + 7;
            output.extend_from_slice(&[
                0xFF,
                0xF9,
                0x40 | frequency_index << 2 | (channels >> 2) as u8,
                (channels as u8) << 6 | (frame_length >> 11) as u8,
                (frame_length >> 3) as u8,
                (frame_length << 5) as u8 | 0x1F,
                0xFC,
            ]);
            output.extend_from_slice(&chunk.data[position..position + size]);
            position += size;
        }
    }
    Ok(output)
}
