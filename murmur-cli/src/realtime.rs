//! Live output through cpal.
//!
//! The player stays on the main thread: it polls timers and queued work
//! (including WAV decodes), then renders ahead into a ring buffer. The audio
//! callback only pops from the ring, so a slow decode eats into the
//! [`RING_MS`] of headroom instead of stalling the device.

use std::error::Error;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use murmur_engine::{AssetLoader, Player, Scheduler, SystemScheduler};
use ringbuf::traits::*;
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tracing::{info, warn};

use crate::SessionArgs;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Rendered-ahead audio held between the player and the device.
const RING_MS: u32 = 400;

/// Frames rendered per push.
const BLOCK_FRAMES: usize = 256;

pub fn list_output_devices() -> Result<(), Box<dyn Error>> {
    let host = cpal::default_host();
    println!("Available output devices:");
    for dev in host.output_devices()? {
        println!("- {}", dev.name()?);
    }
    Ok(())
}

fn pick_device(name: Option<&str>) -> Result<cpal::Device, Box<dyn Error>> {
    let host = cpal::default_host();
    if let Some(name) = name {
        for d in host.output_devices()? {
            if d.name()? == name {
                return Ok(d);
            }
        }
        return Err(format!("requested device not found: {name}").into());
    }
    host.default_output_device().ok_or_else(|| "no default output device".into())
}

fn build_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    mut cons: HeapCons<f32>,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, Box<dyn Error>>
where
    T: cpal::Sample + cpal::FromSample<f32> + cpal::SizedSample + Send + 'static,
{
    let channels = usize::from(cfg.channels).max(1);

    let stream = device.build_output_stream(
        cfg,
        move |output: &mut [T], _| {
            for frame in output.chunks_mut(channels) {
                // underrun plays silence
                let l = cons.try_pop().unwrap_or(0.0);
                let r = cons.try_pop().unwrap_or(0.0);
                match frame {
                    [mono] => *mono = T::from_sample(0.5 * (l + r)),
                    [fl, fr, rest @ ..] => {
                        *fl = T::from_sample(l);
                        *fr = T::from_sample(r);
                        for ch in rest {
                            *ch = T::from_sample(0.0_f32);
                        }
                    }
                    [] => {}
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Render whole blocks into the ring until it is full.
fn fill_ring<L: AssetLoader, S: Scheduler>(player: &mut Player<L, S>, prod: &mut HeapProd<f32>, block: &mut [f32]) {
    while prod.vacant_len() >= block.len() {
        player.render(block);
        prod.push_slice(block);
    }
}

pub fn play(session: &SessionArgs, device: Option<&str>, duration_secs: Option<u64>) -> Result<(), Box<dyn Error>> {
    let device = pick_device(device)?;
    let sup_cfg = device.default_output_config()?;
    let sample_format = sup_cfg.sample_format();
    let cfg = sup_cfg.config();
    let sample_rate = cfg.sample_rate.0;

    let mut player = session.build_player(sample_rate, SystemScheduler::new())?;

    let ring_frames = (sample_rate * RING_MS / 1000) as usize;
    let (mut prod, cons) = HeapRb::<f32>::new(ring_frames.max(BLOCK_FRAMES) * 2).split();
    let mut block = vec![0.0_f32; BLOCK_FRAMES * 2];
    player.poll();
    fill_ring(&mut player, &mut prod, &mut block);

    info!(device = %device.name()?, config = ?cfg, ?sample_format, ring_ms = RING_MS, "opening output");

    let err_fn = |e: cpal::StreamError| warn!(error = %e, "stream error");
    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &cfg, cons, err_fn)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &cfg, cons, err_fn)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &cfg, cons, err_fn)?,
        other => return Err(format!("unsupported device sample format: {other:?}").into()),
    };
    stream.play()?;
    println!("Playing. Press Ctrl+C to stop…");

    let deadline = duration_secs.map(|d| Instant::now() + Duration::from_secs(d));
    let mut last = None;
    loop {
        player.poll();
        fill_ring(&mut player, &mut prod, &mut block);
        let current = player.status().current;
        if current != last {
            info!(asset = current.as_deref().unwrap_or("-"), "now playing");
            last = current;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    // keep feeding the device until the stop fade has played out
    player.stop();
    let tail_end = Instant::now() + Duration::from_millis(700 + u64::from(RING_MS));
    while Instant::now() < tail_end {
        fill_ring(&mut player, &mut prod, &mut block);
        std::thread::sleep(POLL_INTERVAL);
    }
    Ok(())
}
