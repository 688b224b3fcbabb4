//! WAV 字节解码（symphonia），多声道下混为单声道

use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use crate::domain::Waveform;

#[derive(Debug, Error)]
pub enum WavDecodeError {
    #[error("Probe failed: {0}")]
    Probe(String),

    #[error("No audio track found")]
    NoTrack,

    #[error("Unknown {0}")]
    MissingParam(&'static str),

    #[error("Decoder creation failed: {0}")]
    Decoder(String),

    #[error("Packet read error: {0}")]
    Packet(String),
}

/// 解码 WAV 字节为单声道波形
pub fn decode_wav(data: Vec<u8>) -> Result<Waveform, WavDecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("wav");

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| WavDecodeError::Probe(e.to_string()))?;

    let mut format = probed.format;
    let track = format.default_track().ok_or(WavDecodeError::NoTrack)?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(WavDecodeError::MissingParam("sample rate"))?;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .ok_or(WavDecodeError::MissingParam("channel count"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| WavDecodeError::Decoder(e.to_string()))?;

    let track_id = track.id;
    let mut interleaved: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(WavDecodeError::Packet(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("Decode error (skipping packet): {}", e);
                continue;
            }
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();
        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let actual = num_frames * spec.channels.count();
        interleaved.extend(&sample_buf.samples()[..actual]);
    }

    Ok(Waveform::new(downmix(interleaved, channels), sample_rate))
}

/// 交错多声道样本取平均
fn downmix(interleaved: Vec<f32>, channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved;
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
