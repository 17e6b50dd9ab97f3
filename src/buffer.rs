// wave-frames -- Reading wave PCM input into fixed-size encoder frames.
// Copyright (c) 2016 Kevin Brothaler and the riff-wave project authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! An elastic two-channel sample buffer.
//!
//! The reader produces samples in bursts of whatever size it managed to read;
//! the encoder wants them in frames of a fixed size. [`FrameBuffer`] sits in
//! between and also applies the [`SkipWindow`]: the first `start` samples fed
//! are dropped, and the last `end` samples held are never handed out.

use super::SkipWindow;

/// Buffered samples for a left and a right channel, kept in step.
///
/// Storage grows to exactly what is needed and is never released while the
/// buffer lives, so a stream that is fed and drained at a steady rate stops
/// allocating after the first few frames.
#[derive(Debug, Clone, Default)]
pub struct FrameBuffer<S> {
    channels: [Vec<S>; 2],
    // Samples still to be dropped from the front of the next feeds.
    skip_start: usize,
    // Samples at the back that are never taken.
    skip_end: usize,
}

impl<S: Copy> FrameBuffer<S> {
    pub fn new(window: SkipWindow) -> FrameBuffer<S> {
        FrameBuffer {
            channels: [Vec::new(), Vec::new()],
            skip_start: window.start,
            skip_end: window.end,
        }
    }

    /// Appends samples to both channels and returns the number of samples
    /// available to [`take`](FrameBuffer::take).
    ///
    /// While part of the start window remains, samples are dropped from the
    /// front of the input instead of being stored. The window may span any
    /// number of calls. If the channels differ in length, only the common
    /// length is used.
    pub fn feed(&mut self, left: &[S], right: &[S]) -> usize {
        let count = left.len().min(right.len());

        if self.skip_start >= count {
            self.skip_start -= count;
            return self.available();
        }
        let skip = self.skip_start;
        self.skip_start = 0;

        for (channel, input) in self.channels.iter_mut().zip([left, right]) {
            channel.reserve_exact(count - skip);
            channel.extend_from_slice(&input[skip..count]);
        }

        self.available()
    }

    /// The number of samples that [`take`](FrameBuffer::take) can return,
    /// excluding the reserved end window.
    pub fn available(&self) -> usize {
        self.len().saturating_sub(self.skip_end)
    }

    /// Moves up to `want` samples from the front of the buffer into the
    /// requested channels and returns the number moved.
    ///
    /// A channel passed as `None` is still advanced, its samples are simply
    /// dropped. Fewer than `want` samples are moved if fewer are available or
    /// if an output is shorter; the outputs are never padded.
    pub fn take(&mut self, left: Option<&mut [S]>, right: Option<&mut [S]>, want: usize) -> usize {
        let mut count = want.min(self.available());
        for out in [&left, &right].into_iter().flatten() {
            count = count.min(out.len());
        }
        if count == 0 {
            return 0;
        }

        for (channel, out) in self.channels.iter_mut().zip([left, right]) {
            if let Some(out) = out {
                out[..count].copy_from_slice(&channel[..count]);
            }
            // Shifts what is left to the front; the allocation is kept.
            channel.drain(..count);
        }

        count
    }

    /// The number of samples held, including the reserved end window.
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of samples each channel can hold without growing.
    pub fn capacity(&self) -> usize {
        self.channels[0].capacity().min(self.channels[1].capacity())
    }

    /// The part of the start window not yet dropped.
    pub fn pending_skip(&self) -> usize {
        self.skip_start
    }
}

#[cfg(test)]
mod tests {
    use super::FrameBuffer;
    use crate::SkipWindow;

    fn ramp(count: usize) -> (Vec<i32>, Vec<i32>) {
        let left = (0..count as i32).collect();
        let right = (0..count as i32).map(|x| -x).collect();
        (left, right)
    }

    // Feeds `total` samples in chunks of `chunk`, taking a few after every
    // feed, then drains the buffer. Returns everything taken from the left
    // and right channels.
    fn run(total: usize, chunk: usize, window: SkipWindow) -> (Vec<i32>, Vec<i32>, FrameBuffer<i32>) {
        let (left, right) = ramp(total);
        let mut buffer = FrameBuffer::new(window);
        let mut taken_left = Vec::new();
        let mut taken_right = Vec::new();
        let mut out_left = [0; 5];
        let mut out_right = [0; 5];

        for (l, r) in left.chunks(chunk).zip(right.chunks(chunk)) {
            buffer.feed(l, r);
            let n = buffer.take(Some(&mut out_left[..]), Some(&mut out_right[..]), 3);
            taken_left.extend_from_slice(&out_left[..n]);
            taken_right.extend_from_slice(&out_right[..n]);
        }
        loop {
            let n = buffer.take(Some(&mut out_left[..]), Some(&mut out_right[..]), 5);
            if n == 0 {
                break;
            }
            taken_left.extend_from_slice(&out_left[..n]);
            taken_right.extend_from_slice(&out_right[..n]);
        }

        (taken_left, taken_right, buffer)
    }

    #[test]
    fn test_skip_window_is_conserved_for_any_chunking() {
        let total = 100;
        let windows = [(0, 0), (10, 5), (1, 1), (37, 63), (100, 0), (0, 100)];

        for &(start, end) in &windows {
            for &chunk in &[1, 7, total] {
                let (left, right, buffer) = run(total, chunk, SkipWindow::new(start, end));

                assert_eq!(total - start - end, left.len(),
                           "window ({}, {}), chunk {}", start, end, chunk);
                assert_eq!(left.len(), right.len());
                // The end window stays behind.
                assert_eq!(end, buffer.len());
                assert_eq!(0, buffer.available());
            }
        }
    }

    #[test]
    fn test_samples_come_out_in_order() {
        for &chunk in &[1, 7, 100] {
            let (left, right, _) = run(100, chunk, SkipWindow::new(10, 5));
            let expected_left: Vec<i32> = (10..95).collect();
            let expected_right: Vec<i32> = (10..95).map(|x| -x).collect();
            assert_eq!(expected_left, left);
            assert_eq!(expected_right, right);
        }
    }

    #[test]
    fn test_start_window_spans_feeds() {
        let mut buffer = FrameBuffer::new(SkipWindow::new(10, 0));
        assert_eq!(0, buffer.feed(&[1, 2, 3, 4], &[1, 2, 3, 4]));
        assert_eq!(6, buffer.pending_skip());
        assert_eq!(0, buffer.feed(&[5, 6, 7, 8], &[5, 6, 7, 8]));
        assert_eq!(2, buffer.pending_skip());
        assert!(buffer.is_empty());
        assert_eq!(2, buffer.feed(&[9, 10, 11, 12], &[9, 10, 11, 12]));
        assert_eq!(0, buffer.pending_skip());

        // Once used up, the window never comes back.
        assert_eq!(6, buffer.feed(&[13, 14, 15, 16], &[13, 14, 15, 16]));

        let mut out = [0; 8];
        assert_eq!(6, buffer.take(Some(&mut out[..]), None, 8));
        assert_eq!([11, 12, 13, 14, 15, 16], out[..6]);
    }

    #[test]
    fn test_end_window_is_never_taken() {
        let mut buffer = FrameBuffer::new(SkipWindow::new(0, 3));
        assert_eq!(0, buffer.feed(&[1, 2], &[1, 2]));
        assert_eq!(2, buffer.feed(&[3, 4, 5], &[3, 4, 5]));

        let mut out = [0; 8];
        assert_eq!(2, buffer.take(Some(&mut out[..]), None, 8));
        assert_eq!([1, 2], out[..2]);
        assert_eq!(0, buffer.take(Some(&mut out[..]), None, 8));
        assert_eq!(3, buffer.len());
    }

    #[test]
    fn test_available_does_not_change_the_buffer() {
        let mut buffer = FrameBuffer::new(SkipWindow::new(2, 1));
        buffer.feed(&[1, 2, 3, 4, 5], &[1, 2, 3, 4, 5]);
        assert_eq!(2, buffer.available());
        assert_eq!(2, buffer.available());
        assert_eq!(3, buffer.len());
    }

    #[test]
    fn test_take_never_pads() {
        let mut buffer = FrameBuffer::new(SkipWindow::default());
        buffer.feed(&[1, 2, 3], &[4, 5, 6]);

        let mut left = [99; 8];
        let mut right = [99; 8];
        assert_eq!(3, buffer.take(Some(&mut left[..]), Some(&mut right[..]), 8));
        assert_eq!([1, 2, 3, 99, 99, 99, 99, 99], left);
        assert_eq!([4, 5, 6, 99, 99, 99, 99, 99], right);
        assert_eq!(0, buffer.take(Some(&mut left[..]), Some(&mut right[..]), 8));
    }

    #[test]
    fn test_take_single_channel_advances_both() {
        let mut buffer = FrameBuffer::new(SkipWindow::default());
        buffer.feed(&[1, 2, 3, 4], &[5, 6, 7, 8]);

        let mut right = [0; 2];
        assert_eq!(2, buffer.take(None, Some(&mut right[..]), 2));
        assert_eq!([7, 8], right[..]);

        let mut left = [0; 2];
        assert_eq!(2, buffer.take(Some(&mut left[..]), None, 2));
        assert_eq!([3, 4], left);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_take_is_limited_by_output_length() {
        let mut buffer = FrameBuffer::new(SkipWindow::default());
        buffer.feed(&[1, 2, 3, 4], &[1, 2, 3, 4]);

        let mut left = [0; 2];
        let mut right = [0; 4];
        assert_eq!(2, buffer.take(Some(&mut left[..]), Some(&mut right[..]), 4));
        assert_eq!(2, buffer.len());
    }

    #[test]
    fn test_growth_keeps_buffered_bytes() {
        let input: Vec<u8> = (0..1000u32).map(|x| (x * 7 % 251) as u8).collect();
        let mut buffer = FrameBuffer::new(SkipWindow::default());
        let mut fed = 0;
        let mut last_capacity = 0;

        for chunk in input.chunks(3) {
            buffer.feed(chunk, chunk);
            fed += chunk.len();

            assert!(buffer.capacity() >= last_capacity);
            last_capacity = buffer.capacity();
            assert_eq!(&input[..fed], &buffer.channels[0][..]);
            assert_eq!(&input[..fed], &buffer.channels[1][..]);
        }

        // Draining keeps the allocation.
        let mut out = vec![0u8; 1000];
        assert_eq!(1000, buffer.take(Some(&mut out[..]), None, 1000));
        assert_eq!(input, out);
        assert_eq!(last_capacity, buffer.capacity());
    }

    #[test]
    fn test_growth_is_exact() {
        let mut buffer: FrameBuffer<i32> = FrameBuffer::new(SkipWindow::default());
        buffer.feed(&[0; 10], &[0; 10]);
        assert_eq!(10, buffer.capacity());

        let mut out = [0; 4];
        buffer.take(Some(&mut out[..]), None, 4);
        // 6 held plus 4 more fits without growing.
        buffer.feed(&[0; 4], &[0; 4]);
        assert_eq!(10, buffer.capacity());
    }
}
