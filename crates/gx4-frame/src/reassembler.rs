use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::codec::{checksum, Frame, CHECKSUM_SIZE, HEADER_SIZE, MAX_FRAME_SIZE, SYNC};

/// Counters kept by the [`Reassembler`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblerStats {
    /// Frames emitted with a valid checksum.
    pub frames: u64,
    /// Candidate frames dropped for a checksum mismatch.
    pub checksum_failures: u64,
    /// Bytes skipped while looking for a sync marker.
    pub discarded_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Looking for the sync marker. A trailing `0x75` is kept as a partial match.
    Scanning,
    /// `buf` starts with the sync marker; collecting header, payload and checksum.
    Accumulating,
}

/// Rebuilds checksum-verified frames from an arbitrarily chunked byte stream.
///
/// Bytes can be pushed in chunks of any size, down to one byte per call.
/// Frames come out in the order their bytes arrived. A candidate frame with
/// a bad checksum is dropped and scanning resumes one byte after its sync
/// marker, so a real frame hidden inside the corrupted span is still found.
pub struct Reassembler {
    state: State,
    buf: BytesMut,
    stats: ReassemblerStats,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self {
            state: State::Scanning,
            buf: BytesMut::with_capacity(2 * MAX_FRAME_SIZE),
            stats: ReassemblerStats::default(),
        }
    }

    /// Append newly received bytes without parsing them yet.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append `bytes` and return every frame that became complete, in order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        self.push(bytes);
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame() {
            frames.push(frame);
        }
        frames
    }

    /// Advance the state machine over buffered bytes.
    ///
    /// Returns `None` once more input is needed. Never blocks.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            match self.state {
                State::Scanning => {
                    match self.buf.windows(SYNC.len()).position(|w| w == SYNC) {
                        Some(pos) => {
                            self.discard(pos);
                            self.state = State::Accumulating;
                        }
                        None => {
                            let keep = usize::from(self.buf.last() == Some(&SYNC[0]));
                            self.discard(self.buf.len() - keep);
                            return None;
                        }
                    }
                }
                State::Accumulating => {
                    if self.buf.len() < HEADER_SIZE {
                        return None;
                    }
                    let body_end = HEADER_SIZE + self.buf[3] as usize;
                    let total = body_end + CHECKSUM_SIZE;
                    if self.buf.len() < total {
                        return None;
                    }

                    self.state = State::Scanning;
                    let expected = checksum(&self.buf[..body_end]);
                    let carried = u16::from_be_bytes([self.buf[body_end], self.buf[body_end + 1]]);
                    if expected != carried {
                        self.stats.checksum_failures += 1;
                        debug!(
                            descriptor = self.buf[2],
                            expected, carried, "checksum mismatch, resynchronising"
                        );
                        // Drop only the first sync byte and rescan.
                        self.discard(1);
                        continue;
                    }

                    let wire: Bytes = self.buf.split_to(total).freeze();
                    let frame = Frame {
                        descriptor: wire[2],
                        payload: wire.slice(HEADER_SIZE..body_end),
                    };
                    self.stats.frames += 1;
                    trace!(
                        descriptor = frame.descriptor,
                        len = frame.payload.len(),
                        "frame reassembled"
                    );
                    return Some(frame);
                }
            }
        }
    }

    /// Drop all buffered bytes and start scanning again.
    pub fn reset(&mut self) {
        self.discard(self.buf.len());
        self.state = State::Scanning;
    }

    /// Bytes buffered but not yet emitted as part of a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// True while a sync marker has been seen and the frame is still incomplete.
    pub fn in_frame(&self) -> bool {
        self.state == State::Accumulating
    }

    pub fn stats(&self) -> ReassemblerStats {
        self.stats
    }

    fn discard(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        self.buf.advance(n);
        self.stats.discarded_bytes += n as u64;
    }
}

impl std::fmt::Debug for Reassembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reassembler")
            .field("state", &self.state)
            .field("buffered", &self.buf.len())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode;

    fn ping_ack() -> Vec<u8> {
        encode(0x01, &[0x04, 0xF1, 0x01, 0x00]).unwrap().to_vec()
    }

    fn imu_frame() -> Vec<u8> {
        let payload: Vec<u8> = (0u8..38).collect();
        encode(0x80, &payload).unwrap().to_vec()
    }

    #[test]
    fn whole_frame_in_one_chunk() {
        let mut reassembler = Reassembler::new();
        let frames = reassembler.feed(&ping_ack());

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].descriptor, 0x01);
        assert_eq!(frames[0].payload.as_ref(), &[0x04, 0xF1, 0x01, 0x00]);
        assert_eq!(reassembler.buffered(), 0);
        assert!(!reassembler.in_frame());
    }

    #[test]
    fn one_byte_chunks_yield_identical_frame() {
        let wire = imu_frame();
        let whole = Reassembler::new().feed(&wire);

        let mut reassembler = Reassembler::new();
        let mut trickled = Vec::new();
        for byte in &wire {
            trickled.extend(reassembler.feed(std::slice::from_ref(byte)));
        }

        assert_eq!(whole.len(), 1);
        assert_eq!(trickled, whole);
    }

    #[test]
    fn every_split_point_yields_identical_frame() {
        let wire = ping_ack();
        let expected = Reassembler::new().feed(&wire);

        for split in 0..=wire.len() {
            let mut reassembler = Reassembler::new();
            let mut frames = reassembler.feed(&wire[..split]);
            frames.extend(reassembler.feed(&wire[split..]));
            assert_eq!(frames, expected, "split at {split}");
        }
    }

    #[test]
    fn garbage_before_sync_is_skipped() {
        let mut stream = vec![0x13];
        stream.extend(ping_ack());

        let mut reassembler = Reassembler::new();
        let frames = reassembler.feed(&stream);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].descriptor, 0x01);
        assert_eq!(reassembler.stats().discarded_bytes, 1);
        assert_eq!(reassembler.stats().checksum_failures, 0);
    }

    #[test]
    fn stray_sync_byte_before_marker() {
        let mut stream = vec![0x75];
        stream.extend(ping_ack());

        let frames = Reassembler::new().feed(&stream);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn sync_marker_split_across_chunks() {
        let wire = ping_ack();
        let mut reassembler = Reassembler::new();

        assert!(reassembler.feed(&[0xAA, 0xBB, wire[0]]).is_empty());
        assert_eq!(reassembler.buffered(), 1);

        let frames = reassembler.feed(&wire[1..]);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn corrupted_frame_is_dropped_next_frame_survives() {
        let mut bad = ping_ack();
        bad[5] ^= 0x40;
        let mut stream = bad;
        stream.extend(imu_frame());

        let mut reassembler = Reassembler::new();
        let frames = reassembler.feed(&stream);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].descriptor, 0x80);
        assert_eq!(reassembler.stats().checksum_failures, 1);
    }

    #[test]
    fn frame_hidden_behind_corrupted_length_is_recovered() {
        // A lone sync marker whose "length" swallows the real frame that follows.
        let mut stream = vec![0x75, 0x65, 0x80, 0x20];
        stream.extend(ping_ack());
        stream.extend(vec![0x00; 40]);

        let mut reassembler = Reassembler::new();
        let frames = reassembler.feed(&stream);

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_ref(), &[0x04, 0xF1, 0x01, 0x00]);
        assert_eq!(reassembler.stats().checksum_failures, 1);
    }

    #[test]
    fn frames_come_out_in_arrival_order() {
        let mut stream = imu_frame();
        stream.extend(ping_ack());
        stream.extend(encode(0x82, &[]).unwrap());

        let frames = Reassembler::new().feed(&stream);
        let descriptors: Vec<u8> = frames.iter().map(|f| f.descriptor).collect();
        assert_eq!(descriptors, vec![0x80, 0x01, 0x82]);
    }

    #[test]
    fn incomplete_frame_waits_for_more_bytes() {
        let wire = imu_frame();
        let mut reassembler = Reassembler::new();

        assert!(reassembler.feed(&wire[..10]).is_empty());
        assert!(reassembler.in_frame());
        assert_eq!(reassembler.feed(&wire[10..]).len(), 1);
    }

    #[test]
    fn reset_discards_partial_frame() {
        let wire = imu_frame();
        let mut reassembler = Reassembler::new();
        reassembler.feed(&wire[..10]);

        reassembler.reset();
        assert_eq!(reassembler.buffered(), 0);
        assert!(reassembler.feed(&wire[10..]).is_empty());
        assert_eq!(reassembler.feed(&ping_ack()).len(), 1);
    }

    #[test]
    fn pure_noise_emits_nothing() {
        let noise: Vec<u8> = (0..512u32).map(|i| (i * 31 % 251) as u8).collect();
        let mut reassembler = Reassembler::new();
        let frames = reassembler.feed(&noise);
        assert!(frames.is_empty());
        assert!(reassembler.buffered() < MAX_FRAME_SIZE);
    }

    #[test]
    fn empty_payload_frame() {
        let frames = Reassembler::new().feed(&encode(0x01, &[]).unwrap());
        assert_eq!(frames.len(), 1);
        assert!(frames[0].payload.is_empty());
    }
}
