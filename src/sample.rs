use crate::{
    finder::{find_all, find_one},
    r#box::{
        sample_table::{Mp4AudioSampleEntry, SampleSize, SampleToChunk},
        BoxNode, FourCC, Payload,
    },
    Error, Result,
};

/// First trak whose handler declares sound media, the track every extraction
/// operation works on.
pub fn audio_track<'t, 'a>(root: &'t BoxNode<'a>) -> Result<&'t BoxNode<'a>> {
    find_all(root, FourCC::new(*b"trak"))
        .find(|track| {
            find_one(track, FourCC::new(*b"hdlr")).is_some_and(|node| match &node.payload {
                Payload::Handler(handler) => handler.r#type == FourCC::new(*b"soun"),
                _ => false,
            })
        })
        .ok_or(Error::NoAudioTrack)
}

/// The five sample-table boxes of one track, still borrowing the parsed tree
/// so remuxing can splice their source bytes through unchanged.
pub struct SampleTableRefs<'t, 'a> {
    pub stsd: &'t BoxNode<'a>,
    pub stts: &'t BoxNode<'a>,
    pub stsc: &'t BoxNode<'a>,
    pub stsz: &'t BoxNode<'a>,
    /// stco, or co64 when the source carries 64-bit offsets.
    pub stco: &'t BoxNode<'a>,
}

/// One chunk of consecutive samples, sliced out of the source buffer.
pub struct Chunk<'a> {
    pub data: &'a [u8],
    pub first_sample: u32,
    pub sample_count: u32,
}

impl<'t, 'a> SampleTableRefs<'t, 'a> {
    pub fn gather(track: &'t BoxNode<'a>) -> Result<Self> {
        let gather = |kind: &[u8; 4], missing| {
            find_one(track, FourCC::new(*kind)).ok_or(Error::MalformedContainer(missing))
        };
        Ok(Self {
            stsd: gather(b"stsd", "track without stsd")?,
            stts: gather(b"stts", "track without stts")?,
            stsc: gather(b"stsc", "track without stsc")?,
            stsz: gather(b"stsz", "track without stsz")?,
            stco: find_one(track, FourCC::new(*b"stco"))
                .or_else(|| find_one(track, FourCC::new(*b"co64")))
                .ok_or(Error::MalformedContainer("track without stco or co64"))?,
        })
    }

    pub fn audio_entry(&self) -> Result<&'t Mp4AudioSampleEntry> {
        match &self.stsd.payload {
            Payload::SampleDescription(description) => description
                .mp4a
                .as_ref()
                .ok_or(Error::MalformedContainer("stsd without an mp4a entry")),
            _ => Err(Error::MalformedContainer("stsd payload did not parse")),
        }
    }

    pub fn sample_to_chunk(&self) -> Result<&'t SampleToChunk> {
        match &self.stsc.payload {
            Payload::SampleToChunk(sample_to_chunk) => Ok(sample_to_chunk),
            _ => Err(Error::MalformedContainer("stsc payload did not parse")),
        }
    }

    pub fn sample_size(&self) -> Result<&'t SampleSize> {
        match &self.stsz.payload {
            Payload::SampleSize(sample_size) => Ok(sample_size),
            _ => Err(Error::MalformedContainer("stsz payload did not parse")),
        }
    }

    /// Chunk offsets widened to u64, whichever width the source used.
    pub fn chunk_offsets(&self) -> Result<Vec<u64>> {
        match &self.stco.payload {
            Payload::ChunkOffset(chunk_offset) => {
                Ok(chunk_offset.entries.iter().map(|&entry| entry as u64).collect())
            }
            Payload::ChunkOffset64(chunk_offset) => Ok(chunk_offset.entries.clone()),
            _ => Err(Error::MalformedContainer("stco payload did not parse")),
        }
    }

    /// Resolves stsc, stsz and stco into the track's chunks, in chunk-index
    /// order, slicing sample bytes straight out of `buffer`.
    ///
    /// Samples are taken as contiguous within a chunk; a source that pads
    /// between samples of one chunk would come through corrupted, as it also
    /// would have in every player relying on the same layout.
    pub fn chunks(&self, buffer: &'a [u8]) -> Result<Vec<Chunk<'a>>> {
        let sample_to_chunk = self.sample_to_chunk()?;
        let sample_size = self.sample_size()?;
        let offsets = self.chunk_offsets()?;
        let expected = sample_size.sample_count() as u64;

        let mut chunks = Vec::with_capacity(offsets.len());
        let mut cursor = 0u64;
        for (index, entry) in sample_to_chunk.entries.iter().enumerate() {
            let first = entry
                .first_chunk
                .checked_sub(1)
                .ok_or(Error::MalformedContainer("stsc first chunk is zero"))?
                as usize;
            // the last entry runs to the final chunk stco knows about
            let end = match sample_to_chunk.entries.get(index + 1) {
                Some(next) => next
                    .first_chunk
                    .checked_sub(1)
                    .ok_or(Error::MalformedContainer("stsc first chunk is zero"))?
                    as usize,
                None => offsets.len(),
            };
            if first > end || end > offsets.len() {
                return Err(Error::MalformedContainer("stsc entries out of order"));
            }

            for &offset in &offsets[first..end] {
                if cursor + entry.samples_per_chunk as u64 > expected {
                    return Err(Error::SampleTableMismatch {
                        expected,
                        actual: cursor + entry.samples_per_chunk as u64,
                    });
                }
                let length: u64 = (cursor..cursor + entry.samples_per_chunk as u64)
                    .map(|sample| sample_size.at(sample as u32) as u64)
                    .sum();
                let data = offset
                    .checked_add(length)
                    .filter(|&end| end <= buffer.len() as u64)
                    .map(|end| &buffer[offset as usize..end as usize])
                    .ok_or(Error::MalformedContainer("chunk past end of buffer"))?;
                chunks.push(Chunk {
                    data,
                    first_sample: cursor as u32,
                    sample_count: entry.samples_per_chunk,
                });
                cursor += entry.samples_per_chunk as u64;
            }
        }
        if cursor != expected {
            return Err(Error::SampleTableMismatch {
                expected,
                actual: cursor,
            });
        }
        Ok(chunks)
    }
}
