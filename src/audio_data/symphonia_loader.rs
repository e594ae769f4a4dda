use crate::{
    audio_data::{LoadOptions, PetalSonicAudioData},
    error::{PetalSonicError, Result},
};
use std::fs::File;
use std::path::Path;
use symphonia::{
    core::{
        audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
        io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
    },
    default::{get_codecs, get_probe},
};

/// Decode an audio file into interleaved `f32` samples.
///
/// Container and codec support is whatever symphonia's default registry
/// provides.
pub fn load_audio_file(path: impl AsRef<Path>, options: &LoadOptions) -> Result<PetalSonicAudioData> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| {
            PetalSonicError::AudioLoading(format!("Failed to probe audio format: {:?}", e))
        })?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| PetalSonicError::AudioLoading("No default audio track found".to_string()))?;
    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| PetalSonicError::AudioLoading("Sample rate not found".to_string()))?;
    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| PetalSonicError::AudioLoading("Channel count not found".to_string()))?
        .count();

    if let Some(channel) = options.mono_channel {
        if channel >= channels {
            return Err(PetalSonicError::AudioFormat(format!(
                "Channel {} out of range (max: {})",
                channel,
                channels - 1
            )));
        }
    }

    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| PetalSonicError::AudioLoading(format!("Failed to create decoder: {:?}", e)))?;

    let max_frames = options
        .max_duration
        .map(|d| (d.as_secs_f64() * sample_rate as f64) as usize)
        .unwrap_or(usize::MAX);

    let mut samples: Vec<f32> = Vec::new();
    let mut frames_decoded = 0;

    while frames_decoded < max_frames {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // end of stream
            Err(Error::IoError(_)) => break,
            Err(e) => {
                return Err(PetalSonicError::AudioLoading(format!(
                    "Error reading packet: {:?}",
                    e
                )));
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(Error::IoError(_)) => break,
            Err(Error::DecodeError(e)) => {
                log::warn!("Skipping corrupt packet in {}: {}", path.display(), e);
                continue;
            }
            Err(e) => {
                return Err(PetalSonicError::AudioLoading(format!(
                    "Error decoding packet: {:?}",
                    e
                )));
            }
        };

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);

        let frames = buffer.samples().len() / channels;
        let take = frames.min(max_frames - frames_decoded);
        samples.extend_from_slice(&buffer.samples()[..take * channels]);
        frames_decoded += take;
    }

    let (samples, channels) = if options.convert_to_mono && channels > 1 {
        (downmix(&samples, channels, options.mono_channel), 1)
    } else {
        (samples, channels)
    };

    log::info!(
        "Loaded {} ({} frames, {} Hz, {} ch)",
        path.display(),
        samples.len() / channels,
        sample_rate,
        channels
    );

    PetalSonicAudioData::new(samples, sample_rate, channels as u16)
}

fn downmix(samples: &[f32], channels: usize, pick: Option<usize>) -> Vec<f32> {
    samples
        .chunks_exact(channels)
        .map(|frame| match pick {
            Some(channel) => frame[channel],
            None => frame.iter().sum::<f32>() / channels as f32,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_average_and_pick() {
        let stereo = [1.0, 0.0, 0.25, 0.75];
        assert_eq!(downmix(&stereo, 2, None), vec![0.5, 0.5]);
        assert_eq!(downmix(&stereo, 2, Some(1)), vec![0.0, 0.75]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = load_audio_file("does/not/exist.wav", &LoadOptions::default());
        assert!(matches!(result, Err(PetalSonicError::Io(_))));
    }
}
