mod buffered;
mod stream;

pub use buffered::BufferedStream;
pub use stream::{FileStream, MemoryStream, RandomAccessStream};
