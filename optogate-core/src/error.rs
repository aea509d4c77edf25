#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid gater settings: {0}")]
    InvalidConfig(String),
    #[error("frame shape mismatch: expected {expected_h}x{expected_w}, got {got_h}x{got_w}")]
    ShapeMismatch {
        expected_h: usize,
        expected_w: usize,
        got_h: usize,
        got_w: usize,
    },
    #[error("frame timestamp {new} did not increase past previous timestamp {last}")]
    OutOfOrderTimestamp { last: f64, new: f64 },
}

pub type Result<T> = std::result::Result<T, Error>;
