//! The closed set of synchronizable state objects
//!
//! Each variant serializes a full snapshot of itself into the shared buffer
//! and restores from it. The set is closed on purpose: dispatch happens
//! through the ordered registry, not through trait objects.

use std::collections::VecDeque;

use parallax_core::{ParallaxError, ParallaxResult};

use crate::SyncBuffer;

/// Per-entry tag written ahead of each encoding so a client can detect a
/// registry that disagrees with the host's
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum SyncTag {
    Camera = 0,
    Time = 1,
    Script = 2,
}

impl SyncTag {
    pub fn from_byte(b: u8) -> ParallaxResult<Self> {
        match b {
            0 => Ok(SyncTag::Camera),
            1 => Ok(SyncTag::Time),
            2 => Ok(SyncTag::Script),
            other => Err(ParallaxError::MalformedFrame(format!(
                "unknown sync tag: {other}"
            ))),
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Camera pose plus the scene node the camera is anchored to
#[derive(Clone, Debug, PartialEq)]
pub struct CameraState {
    pub position: [f64; 3],
    /// Orientation quaternion, xyzw
    pub rotation: [f64; 4],
    pub scale: f64,
    pub anchor: String,
}

impl Default for CameraState {
    fn default() -> Self {
        CameraState {
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: 1.0,
            anchor: String::new(),
        }
    }
}

impl CameraState {
    pub fn encode(&self, buf: &mut SyncBuffer) {
        for c in self.position {
            buf.write_f64(c);
        }
        for c in self.rotation {
            buf.write_f64(c);
        }
        buf.write_f64(self.scale);
        buf.write_string(&self.anchor);
    }

    pub fn decode(&mut self, buf: &mut SyncBuffer) -> ParallaxResult<()> {
        for c in &mut self.position {
            *c = buf.read_f64()?;
        }
        for c in &mut self.rotation {
            *c = buf.read_f64()?;
        }
        self.scale = buf.read_f64()?;
        self.anchor = buf.read_string()?;
        Ok(())
    }
}

/// The simulation clock
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct TimeState {
    /// Simulation time in seconds
    pub seconds: f64,
    /// Seconds of simulation time per second of wall time
    pub delta_seconds: f64,
    pub paused: bool,
}

impl TimeState {
    pub fn encode(&self, buf: &mut SyncBuffer) {
        buf.write_f64(self.seconds);
        buf.write_f64(self.delta_seconds);
        buf.write_bool(self.paused);
    }

    pub fn decode(&mut self, buf: &mut SyncBuffer) -> ParallaxResult<()> {
        self.seconds = buf.read_f64()?;
        self.delta_seconds = buf.read_f64()?;
        self.paused = buf.read_bool()?;
        Ok(())
    }
}

/// Scripts queued for the scripting engine
///
/// The host drains its pending list into each snapshot; clients append the
/// decoded scripts to their own list and the scripting engine consumes them
/// with [`ScriptQueue::take_pending`].
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ScriptQueue {
    pending: VecDeque<String>,
}

impl ScriptQueue {
    pub fn queue(&mut self, script: impl Into<String>) {
        self.pending.push_back(script.into());
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drain everything queued so far, in queue order
    pub fn take_pending(&mut self) -> Vec<String> {
        self.pending.drain(..).collect()
    }

    pub fn encode(&mut self, buf: &mut SyncBuffer) {
        buf.write_u32(self.pending.len() as u32);
        for script in self.pending.drain(..) {
            buf.write_string(&script);
        }
    }

    pub fn decode(&mut self, buf: &mut SyncBuffer) -> ParallaxResult<()> {
        let count = buf.read_u32()?;
        for _ in 0..count {
            let script = buf.read_string()?;
            self.pending.push_back(script);
        }
        Ok(())
    }
}

/// One synchronizable state object
#[derive(Clone, Debug, PartialEq)]
pub enum Syncable {
    Camera(CameraState),
    Time(TimeState),
    Script(ScriptQueue),
}

impl Syncable {
    pub fn tag(&self) -> SyncTag {
        match self {
            Syncable::Camera(_) => SyncTag::Camera,
            Syncable::Time(_) => SyncTag::Time,
            Syncable::Script(_) => SyncTag::Script,
        }
    }

    /// Append this object's full state to the buffer. Takes `&mut self`
    /// because the script queue drains what it encodes.
    pub fn encode(&mut self, buf: &mut SyncBuffer) {
        match self {
            Syncable::Camera(camera) => camera.encode(buf),
            Syncable::Time(time) => time.encode(buf),
            Syncable::Script(scripts) => scripts.encode(buf),
        }
    }

    /// Restore this object's state from the buffer
    pub fn decode(&mut self, buf: &mut SyncBuffer) -> ParallaxResult<()> {
        match self {
            Syncable::Camera(camera) => camera.decode(buf),
            Syncable::Time(time) => time.decode(buf),
            Syncable::Script(scripts) => scripts.decode(buf),
        }
    }

    pub fn as_camera(&self) -> Option<&CameraState> {
        match self {
            Syncable::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    pub fn as_camera_mut(&mut self) -> Option<&mut CameraState> {
        match self {
            Syncable::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<&TimeState> {
        match self {
            Syncable::Time(time) => Some(time),
            _ => None,
        }
    }

    pub fn as_time_mut(&mut self) -> Option<&mut TimeState> {
        match self {
            Syncable::Time(time) => Some(time),
            _ => None,
        }
    }

    pub fn as_script(&self) -> Option<&ScriptQueue> {
        match self {
            Syncable::Script(scripts) => Some(scripts),
            _ => None,
        }
    }

    pub fn as_script_mut(&mut self) -> Option<&mut ScriptQueue> {
        match self {
            Syncable::Script(scripts) => Some(scripts),
            _ => None,
        }
    }
}
