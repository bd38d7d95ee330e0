use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct AudioBuffer {
    pub samples: Vec<f32>, // interleaved
    pub channels: u16,
    pub sample_rate: u32,
    pub duration_sec: f64,
}

struct Mixer {
    device_sr: u32,
    playing: bool,
    // anchor: narration time when device_frame_cursor == 0
    anchor_sec: f64,
    device_frame_cursor: u64,
    track: Option<Arc<AudioBuffer>>,
}

impl Mixer {
    fn position(&self) -> f64 {
        self.anchor_sec + self.device_frame_cursor as f64 / self.device_sr as f64
    }
}

/// Output stream for the narration track. The device callback owns the
/// authoritative playhead: `position()` is derived from the frame cursor, so
/// the UI clock never drifts from what is audible.
pub struct AudioEngine {
    _stream: cpal::Stream,
    mixer: Arc<Mutex<Mixer>>,
}

impl AudioEngine {
    pub fn new() -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow::anyhow!("no audio output device"))?;
        let mut config = device.default_output_config()?.config();
        config.channels = 2;
        let device_sr = config.sample_rate.0;

        let mixer = Arc::new(Mutex::new(Mixer {
            device_sr,
            playing: false,
            anchor_sec: 0.0,
            device_frame_cursor: 0,
            track: None,
        }));

        let mix_clone = mixer.clone();
        let stream = device.build_output_stream(
            &config,
            move |data: &mut [f32], _| {
                let mut m = mix_clone.lock();
                let ch = 2usize;
                let frames = data.len() / ch;
                for i in 0..frames {
                    let mut l = 0.0f32;
                    let mut r = 0.0f32;
                    if m.playing {
                        let t = m.position();
                        if let Some(track) = &m.track {
                            if t < track.duration_sec {
                                let (sl, sr) = sample_stereo(track, t as f32);
                                l = sl;
                                r = sr;
                            } else {
                                m.playing = false;
                            }
                        }
                        m.device_frame_cursor += 1;
                    }
                    let idx = i * ch;
                    data[idx] = l;
                    data[idx + 1] = r;
                }
            },
            move |err| warn!(error = %err, "audio stream error"),
            None,
        )?;
        stream.play()?;

        Ok(Self {
            _stream: stream,
            mixer,
        })
    }

    pub fn set_track(&self, buf: Arc<AudioBuffer>) {
        let mut m = self.mixer.lock();
        m.track = Some(buf);
        m.anchor_sec = 0.0;
        m.device_frame_cursor = 0;
        m.playing = false;
    }

    pub fn clear_track(&self) {
        let mut m = self.mixer.lock();
        m.track = None;
        m.anchor_sec = 0.0;
        m.device_frame_cursor = 0;
        m.playing = false;
    }

    pub fn play(&self) {
        let mut m = self.mixer.lock();
        if m.track.is_some() {
            m.playing = true;
        }
    }

    pub fn pause(&self) {
        let mut m = self.mixer.lock();
        let pos = m.position();
        m.anchor_sec = pos;
        m.device_frame_cursor = 0;
        m.playing = false;
    }

    pub fn seek(&self, sec: f64) {
        let mut m = self.mixer.lock();
        let max = m.track.as_ref().map(|t| t.duration_sec).unwrap_or(0.0);
        m.anchor_sec = sec.clamp(0.0, max);
        m.device_frame_cursor = 0;
    }

    pub fn is_playing(&self) -> bool {
        self.mixer.lock().playing
    }

    /// Current narration time in seconds.
    pub fn position(&self) -> f64 {
        self.mixer.lock().position()
    }

    pub fn duration(&self) -> Option<f64> {
        self.mixer.lock().track.as_ref().map(|t| t.duration_sec)
    }
}

fn sample_stereo(buf: &AudioBuffer, t_sec: f32) -> (f32, f32) {
    if buf.samples.is_empty() {
        return (0.0, 0.0);
    }
    // linear interpolation at the buffer's own sample rate
    let t_in = t_sec * buf.sample_rate as f32;
    let i0 = (t_in.floor() as i64).max(0) as usize;
    let i1 = i0.saturating_add(1);
    let frac = t_in - i0 as f32;
    let ch = buf.channels as usize;

    let fetch = |frame: usize, c: usize| -> f32 {
        let f = frame.min((buf.samples.len() / ch).saturating_sub(1));
        buf.samples[f * ch + c]
    };
    let l0 = fetch(i0, 0);
    let r0 = fetch(i0, if ch > 1 { 1 } else { 0 });
    let l1 = fetch(i1, 0);
    let r1 = fetch(i1, if ch > 1 { 1 } else { 0 });
    (l0 + (l1 - l0) * frac, r0 + (r1 - r0) * frac)
}
