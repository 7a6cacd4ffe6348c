use ndarray::Array1;

/// A dense vector of real components: an iterate, a gradient or a step.
///
/// Anything that can report its length and read and write individual `f64`
/// components can be handed to the gradient estimator. Implementations are
/// provided for `ndarray::Array1<f64>`, `Vec<f64>` and fixed-size arrays.
pub trait Point: Clone {
    /// Number of components.
    fn dimension(&self) -> usize;

    /// Reads component `index`. Panics if `index >= dimension()`.
    fn component(&self, index: usize) -> f64;

    /// Overwrites component `index`. Panics if `index >= dimension()`.
    fn set_component(&mut self, index: usize, value: f64);
}

impl Point for Array1<f64> {
    fn dimension(&self) -> usize {
        self.len()
    }

    fn component(&self, index: usize) -> f64 {
        self[index]
    }

    fn set_component(&mut self, index: usize, value: f64) {
        self[index] = value;
    }
}

impl Point for Vec<f64> {
    fn dimension(&self) -> usize {
        self.len()
    }

    fn component(&self, index: usize) -> f64 {
        self[index]
    }

    fn set_component(&mut self, index: usize, value: f64) {
        self[index] = value;
    }
}

impl<const N: usize> Point for [f64; N] {
    fn dimension(&self) -> usize {
        N
    }

    fn component(&self, index: usize) -> f64 {
        self[index]
    }

    fn set_component(&mut self, index: usize, value: f64) {
        self[index] = value;
    }
}
