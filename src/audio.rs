use anyhow::Context;
use hound::{SampleFormat, WavReader};
use std::io::Read;
use std::path::Path;

/// First channel of a wav file, normalized to roughly [-1.0, 1.0].
#[derive(Debug, Clone)]
pub struct DecodedWav {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f64>,
}

pub fn load_first_channel(path: &Path) -> anyhow::Result<DecodedWav> {
    let reader = WavReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    read_first_channel(reader)
}

pub fn decode_first_channel<R: Read>(input: R) -> anyhow::Result<DecodedWav> {
    read_first_channel(WavReader::new(input)?)
}

fn read_first_channel<R: Read>(reader: WavReader<R>) -> anyhow::Result<DecodedWav> {
    let spec = reader.spec();
    if spec.channels == 0 {
        anyhow::bail!("wav header declares zero channels");
    }
    let stride = spec.channels as usize;

    let samples = match spec.sample_format {
        SampleFormat::Int => {
            let full_scale = (1_i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .into_samples::<i32>()
                .step_by(stride)
                .map(|s| s.map(|v| v as f64 / full_scale))
                .collect::<Result<Vec<_>, _>>()?
        }
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .step_by(stride)
            .map(|s| s.map(f64::from))
            .collect::<Result<Vec<_>, _>>()?,
    };

    Ok(DecodedWav {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        samples,
    })
}
