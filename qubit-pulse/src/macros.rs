/// Construct a [`num_complex::Complex64`] with no imaginary part.
#[macro_export]
macro_rules! real {
    ($value:expr) => {{
        ::num_complex::Complex64::new($value, 0f64)
    }};
}

/// Construct a purely imaginary [`num_complex::Complex64`].
#[macro_export]
macro_rules! imag {
    ($value:expr) => {{
        ::num_complex::Complex64::new(0f64, $value)
    }};
}
