use crate::shared::sample_buffer::SampleBuffer;

/// Receives every sample a video-data output delivers.
///
/// Called on the output's dedicated delivery thread, one sample at a time.
pub trait SampleBufferDelegate: Send {
    fn did_output(&mut self, sample: SampleBuffer);
}
