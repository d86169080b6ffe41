//! Delay effect: stereo delay line with feedback and mix control.

/// Longest delay the line can hold, in seconds.
pub const MAX_DELAY_SECONDS: f32 = 2.0;
/// Feedback ceiling; keeps the loop gain below unity.
pub const MAX_FEEDBACK: f32 = 0.95;

/// A stereo feedback delay.
///
/// The delay time is quantised down to whole samples and is never shorter
/// than one sample, so a read never lands on the slot being written.
#[derive(Debug, Clone)]
pub struct Delay {
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
    sample_rate: f32,
}

impl Delay {
    pub fn new(sample_rate: f32) -> Self {
        let buffer_size = (sample_rate * MAX_DELAY_SECONDS) as usize + 1;
        Self {
            buffer_l: vec![0.0; buffer_size],
            buffer_r: vec![0.0; buffer_size],
            write_pos: 0,
            sample_rate,
        }
    }

    /// Process a stereo sample pair.
    ///
    /// `time` in seconds, `feedback` in [0, 0.95], `mix` blends dry and wet
    /// linearly. With `mix == 0` the line is bypassed and left untouched.
    #[inline]
    pub fn process(&mut self, left: f32, right: f32, time: f32, feedback: f32, mix: f32) -> (f32, f32) {
        if mix <= 0.0 {
            return (left, right);
        }
        let buffer_len = self.buffer_l.len();
        let delay_samples = ((time * self.sample_rate).floor().max(1.0) as usize).min(buffer_len - 1);
        let read_pos = (self.write_pos + buffer_len - delay_samples) % buffer_len;

        let delayed_l = self.buffer_l[read_pos];
        let delayed_r = self.buffer_r[read_pos];

        let feedback = feedback.clamp(0.0, MAX_FEEDBACK);
        self.buffer_l[self.write_pos] = left + delayed_l * feedback;
        self.buffer_r[self.write_pos] = right + delayed_r * feedback;
        self.write_pos = (self.write_pos + 1) % buffer_len;

        let mix = mix.min(1.0);
        (left * (1.0 - mix) + delayed_l * mix, right * (1.0 - mix) + delayed_r * mix)
    }

    /// Clear the delay buffers.
    pub fn clear(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
    }
}
