use anyhow::Context;
use audio3d::device::{AudioOutFormat, AudioOutParam, AudioOutPortType, StreamParams};
use audio3d::{
    Attribute, Audio3dDesc, Audio3dManager, AudioOutDevice, BedFormat, Blocking, PortParameters,
};

const SAMPLE_RATE: u32 = 48000;
const FREQUENCY: f32 = 440.0;
const SECONDS: u32 = 2;

/// Queues a 440Hz tone as stereo beds and object PCM, then pushes it all out.
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    #[cfg(feature = "cpal-output")]
    let device = audio3d::CpalAudioOut::new();
    #[cfg(not(feature = "cpal-output"))]
    let device = audio3d::MemoryAudioOut::new();

    run(device)
}

fn run<D: AudioOutDevice>(device: D) -> anyhow::Result<()> {
    let mut manager = Audio3dManager::new(Audio3dDesc::default(), device);
    manager.initialize(0).context("initializing Audio3d")?;

    let parameters = PortParameters::new().granularity(512).queue_depth(4);
    let port = manager
        .port_open(1, &parameters)
        .context("opening port")?;
    let handle = manager
        .audio_out_open(
            port,
            StreamParams {
                user_id: 1,
                port_type: AudioOutPortType::Main,
                index: 0,
                len: parameters.granularity,
                freq: SAMPLE_RATE,
                param: AudioOutParam::from_format(AudioOutFormat::FloatStereo),
            },
        )
        .context("opening audio out")?;
    println!("Port {} bound to {}", port, handle);

    let object = manager.object_reserve(port)?;
    let granularity = parameters.granularity as usize;
    let blocks = (SAMPLE_RATE * SECONDS) as usize / granularity;
    let mut phase = 0.0f32;

    for block in 0..blocks {
        // Float beds must start on a 4-byte boundary.
        let len = granularity * 2 * 4;
        let mut storage = vec![0u8; len + 4];
        let offset = storage.as_ptr().align_offset(4);
        let pcm = &mut storage[offset..offset + len];
        for frame in pcm.chunks_exact_mut(8) {
            let sample = ((phase * 2.0 * std::f32::consts::PI).sin() * 0.1).to_le_bytes();
            frame[..4].copy_from_slice(&sample);
            frame[4..].copy_from_slice(&sample);
            phase = (phase + FREQUENCY / SAMPLE_RATE as f32).fract();
        }
        let pcm = &*pcm;

        // Alternate between the bed path and the object path.
        if block % 2 == 0 {
            manager.bed_write(port, 2, BedFormat::Float, pcm, parameters.granularity)?;
        } else {
            manager.object_set_attributes(
                port,
                object,
                &[Attribute::gain(1.0), Attribute::pcm(pcm)],
            )?;
        }

        let level = manager.port_get_queue_level(port)?;
        log::debug!("Queue level {} ({} available)", level.level, level.available);
        manager.port_push(port, Blocking::Sync)?;
    }

    println!("Pushed {} blocks of {} frames", blocks, granularity);

    manager.object_unreserve(port, object)?;
    manager.port_close(port)?;
    manager.terminate()?;
    println!("✓ Done");
    Ok(())
}
