//! Neural Codec Adapter - SNAC 解码服务客户端

mod http_snac_decoder;

pub use http_snac_decoder::{HttpSnacDecoder, HttpSnacDecoderConfig};
