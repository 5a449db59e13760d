mod blocks;
#[cfg(feature = "unet")]
mod unet;

pub use blocks::{
    ConvBlock, ConvBlockConfig, DecoderBlock, DecoderBlockConfig, EncoderBlock, EncoderBlockConfig,
};

#[cfg(feature = "unet")]
pub use unet::{UNet, UNetConfig};
