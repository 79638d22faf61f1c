//! Minimal WebM (Matroska) writer for a single Opus audio track.
//!
//! Output is streamable: the Segment has an unknown size and every cluster is
//! self-contained, so the header and the clusters can be emitted as separate
//! data segments and simply concatenated.

/// EBML element IDs, including their length marker bits.
mod id {
    pub const EBML: &[u8] = &[0x1A, 0x45, 0xDF, 0xA3];
    pub const EBML_VERSION: &[u8] = &[0x42, 0x86];
    pub const EBML_READ_VERSION: &[u8] = &[0x42, 0xF7];
    pub const EBML_MAX_ID_LENGTH: &[u8] = &[0x42, 0xF2];
    pub const EBML_MAX_SIZE_LENGTH: &[u8] = &[0x42, 0xF3];
    pub const DOC_TYPE: &[u8] = &[0x42, 0x82];
    pub const DOC_TYPE_VERSION: &[u8] = &[0x42, 0x87];
    pub const DOC_TYPE_READ_VERSION: &[u8] = &[0x42, 0x85];

    pub const SEGMENT: &[u8] = &[0x18, 0x53, 0x80, 0x67];
    pub const INFO: &[u8] = &[0x15, 0x49, 0xA9, 0x66];
    pub const TIMECODE_SCALE: &[u8] = &[0x2A, 0xD7, 0xB1];
    pub const MUXING_APP: &[u8] = &[0x4D, 0x80];
    pub const WRITING_APP: &[u8] = &[0x57, 0x41];

    pub const TRACKS: &[u8] = &[0x16, 0x54, 0xAE, 0x6B];
    pub const TRACK_ENTRY: &[u8] = &[0xAE];
    pub const TRACK_NUMBER: &[u8] = &[0xD7];
    pub const TRACK_UID: &[u8] = &[0x73, 0xC5];
    pub const TRACK_TYPE: &[u8] = &[0x83];
    pub const CODEC_ID: &[u8] = &[0x86];
    pub const CODEC_PRIVATE: &[u8] = &[0x63, 0xA2];
    pub const CODEC_DELAY: &[u8] = &[0x56, 0xAA];
    pub const AUDIO: &[u8] = &[0xE1];
    pub const SAMPLING_FREQUENCY: &[u8] = &[0xB5];
    pub const CHANNELS: &[u8] = &[0x9F];

    pub const CLUSTER: &[u8] = &[0x1F, 0x43, 0xB6, 0x75];
    pub const TIMECODE: &[u8] = &[0xE7];
    pub const SIMPLE_BLOCK: &[u8] = &[0xA3];
}

/// Size field meaning "unknown, read until the parent ends".
const UNKNOWN_SIZE: [u8; 8] = [0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

const TRACK_TYPE_AUDIO: u64 = 2;
const AUDIO_TRACK_NUMBER: u8 = 1;
const KEYFRAME_FLAG: u8 = 0x80;

/// One encoded Opus packet and its presentation time in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub timestamp_ms: u64,
    pub data: Vec<u8>,
}

pub struct WebmMuxer {
    sample_rate: u32,
    channels: u8,
    pre_skip: u16,
}

impl WebmMuxer {
    pub fn new(sample_rate: u32, channels: u8, pre_skip: u16) -> Self {
        Self {
            sample_rate,
            channels,
            pre_skip,
        }
    }

    /// EBML header, open Segment, Info and Tracks.
    pub fn header(&self) -> Vec<u8> {
        let ebml = element(
            id::EBML,
            &[
                uint_element(id::EBML_VERSION, 1),
                uint_element(id::EBML_READ_VERSION, 1),
                uint_element(id::EBML_MAX_ID_LENGTH, 4),
                uint_element(id::EBML_MAX_SIZE_LENGTH, 8),
                string_element(id::DOC_TYPE, "webm"),
                uint_element(id::DOC_TYPE_VERSION, 4),
                uint_element(id::DOC_TYPE_READ_VERSION, 2),
            ]
            .concat(),
        );

        let app = concat!("interview-recorder ", env!("CARGO_PKG_VERSION"));
        let info = element(
            id::INFO,
            &[
                uint_element(id::TIMECODE_SCALE, 1_000_000),
                string_element(id::MUXING_APP, app),
                string_element(id::WRITING_APP, app),
            ]
            .concat(),
        );

        let audio = element(
            id::AUDIO,
            &[
                float_element(id::SAMPLING_FREQUENCY, self.sample_rate as f64),
                uint_element(id::CHANNELS, self.channels as u64),
            ]
            .concat(),
        );
        let codec_delay_ns = self.pre_skip as u64 * 1_000_000_000 / self.sample_rate as u64;
        let track = element(
            id::TRACK_ENTRY,
            &[
                uint_element(id::TRACK_NUMBER, AUDIO_TRACK_NUMBER as u64),
                uint_element(id::TRACK_UID, 1),
                uint_element(id::TRACK_TYPE, TRACK_TYPE_AUDIO),
                string_element(id::CODEC_ID, "A_OPUS"),
                element(id::CODEC_PRIVATE, &self.opus_head()),
                uint_element(id::CODEC_DELAY, codec_delay_ns),
                audio,
            ]
            .concat(),
        );
        let tracks = element(id::TRACKS, &track);

        let mut out = ebml;
        out.extend_from_slice(id::SEGMENT);
        out.extend_from_slice(&UNKNOWN_SIZE);
        out.extend(info);
        out.extend(tracks);
        out
    }

    /// Clusters for `packets`, starting a new cluster whenever a block's
    /// relative timecode would overflow its 16-bit field.
    pub fn clusters(&self, packets: &[Packet]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut start = 0;
        while start < packets.len() {
            let base = packets[start].timestamp_ms;
            let end = packets[start..]
                .iter()
                .position(|p| p.timestamp_ms - base > i16::MAX as u64)
                .map(|offset| start + offset)
                .unwrap_or(packets.len());

            let mut body = uint_element(id::TIMECODE, base);
            for packet in &packets[start..end] {
                body.extend(simple_block(packet, base));
            }
            out.extend(element(id::CLUSTER, &body));
            start = end;
        }
        out
    }

    /// Opus identification header (RFC 7845 section 5.1).
    fn opus_head(&self) -> Vec<u8> {
        let mut head = Vec::with_capacity(19);
        head.extend_from_slice(b"OpusHead");
        head.push(1);
        head.push(self.channels);
        head.extend_from_slice(&self.pre_skip.to_le_bytes());
        head.extend_from_slice(&self.sample_rate.to_le_bytes());
        head.extend_from_slice(&0i16.to_le_bytes());
        head.push(0);
        head
    }
}

fn simple_block(packet: &Packet, cluster_base_ms: u64) -> Vec<u8> {
    let relative = (packet.timestamp_ms - cluster_base_ms) as i16;
    let mut payload = Vec::with_capacity(packet.data.len() + 4);
    payload.push(0x80 | AUDIO_TRACK_NUMBER);
    payload.extend_from_slice(&relative.to_be_bytes());
    payload.push(KEYFRAME_FLAG);
    payload.extend_from_slice(&packet.data);
    element(id::SIMPLE_BLOCK, &payload)
}

/// 8-byte EBML variable-length size.
pub fn encode_size(len: u64) -> [u8; 8] {
    let mut out = len.to_be_bytes();
    out[0] = 0x01;
    out
}

fn element(id: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(id.len() + 8 + payload.len());
    out.extend_from_slice(id);
    out.extend_from_slice(&encode_size(payload.len() as u64));
    out.extend_from_slice(payload);
    out
}

fn uint_element(id: &[u8], value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    element(id, &bytes[first..])
}

fn float_element(id: &[u8], value: f64) -> Vec<u8> {
    element(id, &value.to_be_bytes())
}

fn string_element(id: &[u8], value: &str) -> Vec<u8> {
    element(id, value.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_encode_size() {
        assert_eq!(encode_size(5), [0x01, 0, 0, 0, 0, 0, 0, 5]);
        assert_eq!(encode_size(0x0102), [0x01, 0, 0, 0, 0, 0, 0x01, 0x02]);
    }

    #[test]
    fn test_uint_element_is_minimal() {
        assert_eq!(uint_element(&[0xD7], 1), vec![0xD7, 0x01, 0, 0, 0, 0, 0, 0, 1, 1]);
        assert_eq!(uint_element(&[0xD7], 0).len(), 1 + 8 + 1);
        assert_eq!(uint_element(&[0xD7], 1_000_000).len(), 1 + 8 + 3);
    }

    #[test]
    fn test_header_layout() {
        let header = WebmMuxer::new(48_000, 1, 312).header();
        assert!(header.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]));
        assert!(contains(&header, b"webm"));
        assert!(contains(&header, b"A_OPUS"));
        assert!(contains(&header, b"OpusHead"));

        let mut segment = id::SEGMENT.to_vec();
        segment.extend_from_slice(&UNKNOWN_SIZE);
        assert!(contains(&header, &segment));
    }

    #[test]
    fn test_opus_head() {
        let head = WebmMuxer::new(48_000, 1, 312).opus_head();
        assert_eq!(head.len(), 19);
        assert_eq!(&head[..8], b"OpusHead");
        assert_eq!(head[9], 1);
        assert_eq!(u16::from_le_bytes([head[10], head[11]]), 312);
        assert_eq!(
            u32::from_le_bytes([head[12], head[13], head[14], head[15]]),
            48_000
        );
    }

    #[test]
    fn test_cluster_blocks() {
        let muxer = WebmMuxer::new(48_000, 1, 312);
        let packets = vec![
            Packet {
                timestamp_ms: 1000,
                data: vec![0xAA],
            },
            Packet {
                timestamp_ms: 1020,
                data: vec![0xBB, 0xCC],
            },
        ];
        let cluster = muxer.clusters(&packets);
        assert!(cluster.starts_with(id::CLUSTER));
        // Second block: track 1, +20ms, keyframe, payload.
        assert!(contains(&cluster, &[0x81, 0x00, 0x14, 0x80, 0xBB, 0xCC]));
    }

    #[test]
    fn test_clusters_split_on_timecode_overflow() {
        let muxer = WebmMuxer::new(48_000, 1, 312);
        let packets = vec![
            Packet {
                timestamp_ms: 0,
                data: vec![1],
            },
            Packet {
                timestamp_ms: 40_000,
                data: vec![2],
            },
        ];
        let out = muxer.clusters(&packets);
        let count = out.windows(4).filter(|w| *w == id::CLUSTER).count();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_no_packets_no_clusters() {
        assert!(WebmMuxer::new(48_000, 1, 312).clusters(&[]).is_empty());
    }

    /// Leading-bit length of an EBML variable-size integer.
    fn vint_len(first: u8) -> usize {
        first.leading_zeros() as usize + 1
    }

    /// Walk `data` as a sequence of elements, descending into masters.
    /// Returns the IDs seen, depth-first. Panics if any size is inconsistent.
    fn walk(data: &[u8], seen: &mut Vec<Vec<u8>>) {
        const MASTERS: [&[u8]; 7] = [
            id::EBML,
            id::SEGMENT,
            id::INFO,
            id::TRACKS,
            id::TRACK_ENTRY,
            id::AUDIO,
            id::CLUSTER,
        ];
        let mut pos = 0;
        while pos < data.len() {
            let id_len = vint_len(data[pos]);
            let element_id = data[pos..pos + id_len].to_vec();
            pos += id_len;

            let size_len = vint_len(data[pos]);
            let size_bytes = &data[pos..pos + size_len];
            pos += size_len;

            let payload_end = if size_bytes == UNKNOWN_SIZE {
                data.len()
            } else {
                let mut size = size_bytes[0] as u64 & (0xFF_u64 >> size_len);
                for b in &size_bytes[1..] {
                    size = (size << 8) | *b as u64;
                }
                pos + size as usize
            };
            assert!(payload_end <= data.len(), "element overruns its parent");

            seen.push(element_id.clone());
            if MASTERS.iter().any(|m| *m == element_id.as_slice()) {
                walk(&data[pos..payload_end], seen);
            }
            pos = payload_end;
        }
        assert_eq!(pos, data.len(), "children do not fill their parent");
    }

    #[test]
    fn test_stream_parses_as_nested_elements() {
        let muxer = WebmMuxer::new(48_000, 1, 312);
        let mut stream = muxer.header();
        let first: Vec<Packet> = (0..3)
            .map(|i| Packet {
                timestamp_ms: i * 20,
                data: vec![0xF8; 40 + i as usize],
            })
            .collect();
        stream.extend(muxer.clusters(&first));
        stream.extend(muxer.clusters(&[Packet {
            timestamp_ms: 60,
            data: vec![0xF8; 7],
        }]));

        let mut seen = Vec::new();
        walk(&stream, &mut seen);

        let count = |target: &[u8]| seen.iter().filter(|s| s.as_slice() == target).count();
        assert_eq!(count(id::EBML), 1);
        assert_eq!(count(id::SEGMENT), 1);
        assert_eq!(count(id::TRACK_ENTRY), 1);
        assert_eq!(count(id::CODEC_PRIVATE), 1);
        assert_eq!(count(id::CLUSTER), 2);
        assert_eq!(count(id::SIMPLE_BLOCK), 4);
        // Clusters are children of the open Segment, after Info and Tracks.
        let segment_at = seen.iter().position(|s| s == id::SEGMENT).unwrap();
        let tracks_at = seen.iter().position(|s| s == id::TRACKS).unwrap();
        let cluster_at = seen.iter().position(|s| s == id::CLUSTER).unwrap();
        assert!(segment_at < tracks_at && tracks_at < cluster_at);
    }
}
