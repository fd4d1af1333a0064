/// Common trait for per-sample filter stages
///
/// Implemented by the notch, high-pass and band-pass stages. Samples must be
/// fed in arrival order; the recursive state cannot detect reordering.
pub trait Filter {
    /// Process a single sample through the filter
    fn process(&mut self, sample: f64) -> f64;

    /// Process a buffer of samples in-place
    fn process_buffer(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.process(*sample);
        }
    }
}
