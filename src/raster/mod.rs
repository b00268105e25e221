mod descriptor;
mod file;
mod packet;

pub use descriptor::{
    DataFlag, Granularity, Palette, ResolutionDescriptor, SharedDescriptor,
};
pub use file::{monitor_for, AccessMode, RasterFile, RegionLock};
pub use packet::{RleCodec, RlePacket};
