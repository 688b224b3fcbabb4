//! SNAC 编码帧解包
//!
//! 语音描述模型输出一串扁平 token，其中每 7 个 codec token 构成一帧，
//! 分别对应 SNAC 的三个层级：
//!
//! ```text
//! slot:   0    1    2    3    4    5    6
//! level:  L1   L2   L3   L3   L2   L3   L3
//! ```
//!
//! 每个 token 的码本下标为 `(token - CODE_TOKEN_OFFSET) mod 4096`。

use serde::Serialize;

/// 音频段开始 token
pub const CODE_START_TOKEN_ID: u32 = 128_257;

/// 音频段结束 token，之后的 token 全部丢弃
pub const CODE_END_TOKEN_ID: u32 = 128_258;

/// codec token 的起始偏移
pub const CODE_TOKEN_OFFSET: u32 = 128_266;

/// 合法 codec token 的闭区间
pub const SNAC_MIN_ID: u32 = 128_266;
pub const SNAC_MAX_ID: u32 = 156_937;

/// 每帧 token 数
pub const SNAC_TOKENS_PER_FRAME: usize = 7;

/// 单层码本大小
pub const CODEBOOK_SIZE: u32 = 4096;

/// 解码器预热产生的前导样本数，解码后丢弃
pub const DECODER_WARMUP_SAMPLES: usize = 2048;

/// 三层码本序列
///
/// 不变量: level2 长度为 level1 的 2 倍，level3 为 4 倍
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CodecLevels {
    pub level1: Vec<u32>,
    pub level2: Vec<u32>,
    pub level3: Vec<u32>,
}

impl CodecLevels {
    fn with_capacity(frames: usize) -> Self {
        Self {
            level1: Vec::with_capacity(frames),
            level2: Vec::with_capacity(frames * 2),
            level3: Vec::with_capacity(frames * 4),
        }
    }

    /// 帧数
    pub fn frame_count(&self) -> usize {
        self.level1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.level1.is_empty()
    }
}

/// 是否为合法的 SNAC codec token
#[inline]
pub fn is_codec_token(token: u32) -> bool {
    (SNAC_MIN_ID..=SNAC_MAX_ID).contains(&token)
}

/// 截断到第一个结束 token，并过滤出 codec token
pub fn extract_codec_tokens(token_ids: &[u32]) -> Vec<u32> {
    let end = token_ids
        .iter()
        .position(|&t| t == CODE_END_TOKEN_ID)
        .unwrap_or(token_ids.len());

    token_ids[..end]
        .iter()
        .copied()
        .filter(|&t| is_codec_token(t))
        .collect()
}

#[inline]
fn codebook_index(token: u32) -> u32 {
    // 对偏移以下的 token 同样得到非负余数
    token.wrapping_sub(CODE_TOKEN_OFFSET) % CODEBOOK_SIZE
}

/// 将 codec token 按帧解包为三层码本，不足一帧的尾部丢弃
pub fn unpack_frames(codec_tokens: &[u32]) -> CodecLevels {
    let frames = codec_tokens.len() / SNAC_TOKENS_PER_FRAME;
    let mut levels = CodecLevels::with_capacity(frames);

    for frame in codec_tokens.chunks_exact(SNAC_TOKENS_PER_FRAME) {
        levels.level1.push(codebook_index(frame[0]));
        levels
            .level2
            .extend([codebook_index(frame[1]), codebook_index(frame[4])]);
        levels.level3.extend([
            codebook_index(frame[2]),
            codebook_index(frame[3]),
            codebook_index(frame[5]),
            codebook_index(frame[6]),
        ]);
    }

    levels
}

/// 丢弃解码器预热样本（长度不超过预热长度时原样返回）
pub fn trim_warmup(mut samples: Vec<f32>) -> Vec<f32> {
    if samples.len() > DECODER_WARMUP_SAMPLES {
        samples.drain(..DECODER_WARMUP_SAMPLES);
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(code: u32) -> u32 {
        CODE_TOKEN_OFFSET + code
    }

    #[test]
    fn test_extract_stops_at_end_token() {
        let ids = vec![
            1,
            CODE_START_TOKEN_ID,
            token(1),
            token(2),
            CODE_END_TOKEN_ID,
            token(3),
        ];
        assert_eq!(extract_codec_tokens(&ids), vec![token(1), token(2)]);
    }

    #[test]
    fn test_extract_filters_out_of_range() {
        let ids = vec![SNAC_MIN_ID - 1, SNAC_MIN_ID, SNAC_MAX_ID, SNAC_MAX_ID + 1];
        assert_eq!(extract_codec_tokens(&ids), vec![SNAC_MIN_ID, SNAC_MAX_ID]);
    }

    #[test]
    fn test_unpack_slot_mapping() {
        let tokens: Vec<u32> = (0..7).map(|i| token(i * 10)).collect();
        let levels = unpack_frames(&tokens);
        assert_eq!(levels.level1, vec![0]);
        assert_eq!(levels.level2, vec![10, 40]);
        assert_eq!(levels.level3, vec![20, 30, 50, 60]);
    }

    #[test]
    fn test_unpack_applies_modulus() {
        let tokens: Vec<u32> = (0..7).map(|i| token(4096 + i)).collect();
        let levels = unpack_frames(&tokens);
        assert_eq!(levels.level1, vec![0]);
        assert_eq!(levels.level2, vec![1, 4]);
        assert_eq!(levels.level3, vec![2, 3, 5, 6]);
    }

    #[test]
    fn test_partial_frame_dropped() {
        let tokens: Vec<u32> = (0..13).map(token).collect();
        let levels = unpack_frames(&tokens);
        assert_eq!(levels.frame_count(), 1);
        assert_eq!(levels.level2.len(), 2);
        assert_eq!(levels.level3.len(), 4);
    }

    #[test]
    fn test_fewer_than_one_frame_is_empty() {
        let tokens: Vec<u32> = (0..6).map(token).collect();
        assert!(unpack_frames(&tokens).is_empty());
    }

    #[test]
    fn test_level_lengths_follow_frame_count() {
        let tokens: Vec<u32> = (0..7 * 5 + 3).map(|i| token(i % 4096)).collect();
        let levels = unpack_frames(&tokens);
        assert_eq!(levels.frame_count(), 5);
        assert_eq!(levels.level2.len(), 10);
        assert_eq!(levels.level3.len(), 20);
    }

    #[test]
    fn test_trim_warmup() {
        assert_eq!(trim_warmup(vec![0.5; 3000]).len(), 3000 - DECODER_WARMUP_SAMPLES);
        assert_eq!(trim_warmup(vec![0.5; 2048]).len(), 2048);
        assert_eq!(trim_warmup(vec![0.5; 100]).len(), 100);
    }
}
