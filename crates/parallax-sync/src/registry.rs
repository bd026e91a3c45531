//! Ordered registry of syncables
//!
//! Registration order is fixed for the lifetime of a session: the registry
//! is append-only, and a snapshot whose tags disagree with the local order
//! fails fast instead of desyncing silently.

use parallax_core::{ParallaxError, ParallaxResult};

use crate::{Syncable, SyncBuffer};

/// Handle to a registered syncable, returned by [`SyncRegistry::register`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncSlot(usize);

/// Append-only ordered list of syncables
#[derive(Debug, Default)]
pub struct SyncRegistry {
    entries: Vec<Syncable>,
}

impl SyncRegistry {
    pub fn new() -> Self {
        SyncRegistry::default()
    }

    /// Append a syncable. There is no unregister: the order must match on
    /// every peer for the whole session.
    pub fn register(&mut self, syncable: Syncable) -> SyncSlot {
        self.entries.push(syncable);
        SyncSlot(self.entries.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, slot: SyncSlot) -> Option<&Syncable> {
        self.entries.get(slot.0)
    }

    pub fn get_mut(&mut self, slot: SyncSlot) -> Option<&mut Syncable> {
        self.entries.get_mut(slot.0)
    }

    /// First registered camera, if any. The rendering collaborator reads
    /// this once per frame after the snapshot is applied.
    pub fn camera(&self) -> Option<&crate::CameraState> {
        self.entries.iter().find_map(|e| e.as_camera())
    }

    pub fn camera_mut(&mut self) -> Option<&mut crate::CameraState> {
        self.entries.iter_mut().find_map(|e| e.as_camera_mut())
    }

    /// First registered clock, if any
    pub fn time(&self) -> Option<&crate::TimeState> {
        self.entries.iter().find_map(|e| e.as_time())
    }

    pub fn time_mut(&mut self) -> Option<&mut crate::TimeState> {
        self.entries.iter_mut().find_map(|e| e.as_time_mut())
    }

    /// First registered script queue, if any
    pub fn script(&self) -> Option<&crate::ScriptQueue> {
        self.entries.iter().find_map(|e| e.as_script())
    }

    pub fn script_mut(&mut self) -> Option<&mut crate::ScriptQueue> {
        self.entries.iter_mut().find_map(|e| e.as_script_mut())
    }

    /// Encode every entry in registration order into one snapshot buffer.
    /// Host-only: call during the pre-sync phase of a tick, before the
    /// state is used for local rendering.
    pub fn encode_snapshot(&mut self) -> SyncBuffer {
        let mut buf = SyncBuffer::new();
        for entry in &mut self.entries {
            buf.write_u8(entry.tag().to_byte());
            entry.encode(&mut buf);
        }
        buf
    }

    /// Apply a snapshot in registration order. A tag that disagrees with
    /// the local registry, a short buffer, or trailing bytes are all
    /// protocol errors: the caller must tear the connection down rather
    /// than continue on partially applied state.
    pub fn apply_snapshot(&mut self, buf: &mut SyncBuffer) -> ParallaxResult<()> {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            let expected = entry.tag().to_byte();
            let actual = buf.read_u8()?;
            if actual != expected {
                return Err(ParallaxError::SyncOrderMismatch {
                    index,
                    expected,
                    actual,
                });
            }
            entry.decode(buf)?;
        }

        if !buf.is_exhausted() {
            return Err(ParallaxError::TrailingSnapshotBytes {
                remaining: buf.remaining(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CameraState, ScriptQueue, TimeState};
    use proptest::prelude::*;

    fn host_registry() -> (SyncRegistry, SyncSlot, SyncSlot, SyncSlot) {
        let mut registry = SyncRegistry::new();
        let camera = registry.register(Syncable::Camera(CameraState::default()));
        let time = registry.register(Syncable::Time(TimeState::default()));
        let script = registry.register(Syncable::Script(ScriptQueue::default()));
        (registry, camera, time, script)
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let (mut host, camera, time, script) = host_registry();
        {
            let cam = host.get_mut(camera).unwrap().as_camera_mut().unwrap();
            cam.position = [1.0, 2.0, 3.0];
            cam.anchor = "moon".into();
        }
        {
            let clock = host.get_mut(time).unwrap().as_time_mut().unwrap();
            clock.seconds = 7.5e8;
            clock.delta_seconds = 100.0;
        }
        host.get_mut(script)
            .unwrap()
            .as_script_mut()
            .unwrap()
            .queue("scene.focus('moon')");

        let snapshot = host.encode_snapshot();

        let (mut client, c_camera, c_time, c_script) = host_registry();
        let mut buf = SyncBuffer::from_bytes(snapshot.into_bytes());
        client.apply_snapshot(&mut buf).unwrap();

        let cam = client.get(c_camera).unwrap().as_camera().unwrap();
        assert_eq!(cam.position[0].to_bits(), 1.0f64.to_bits());
        assert_eq!(cam.anchor, "moon");

        let clock = client.get(c_time).unwrap().as_time().unwrap();
        assert_eq!(clock.seconds.to_bits(), 7.5e8f64.to_bits());

        let scripts = client
            .get_mut(c_script)
            .unwrap()
            .as_script_mut()
            .unwrap()
            .take_pending();
        assert_eq!(scripts, vec!["scene.focus('moon')".to_string()]);
    }

    #[test]
    fn test_reordered_registry_fails_fast() {
        let (mut host, ..) = host_registry();
        let snapshot = host.encode_snapshot();

        // Client registered in a different order: protocol violation
        let mut client = SyncRegistry::new();
        client.register(Syncable::Time(TimeState::default()));
        client.register(Syncable::Camera(CameraState::default()));
        client.register(Syncable::Script(ScriptQueue::default()));

        let mut buf = SyncBuffer::from_bytes(snapshot.into_bytes());
        let err = client.apply_snapshot(&mut buf).unwrap_err();
        assert!(matches!(
            err,
            ParallaxError::SyncOrderMismatch { index: 0, .. }
        ));
    }

    #[test]
    fn test_short_snapshot_fails() {
        let (mut host, ..) = host_registry();
        let bytes = host.encode_snapshot().into_bytes();

        let (mut client, ..) = host_registry();
        let mut buf = SyncBuffer::from_bytes(bytes[..bytes.len() - 4].to_vec());
        assert!(matches!(
            client.apply_snapshot(&mut buf),
            Err(ParallaxError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_fail() {
        let (mut host, ..) = host_registry();
        let mut bytes = host.encode_snapshot().into_bytes();
        bytes.extend_from_slice(&[0xEE; 3]);

        let (mut client, ..) = host_registry();
        let mut buf = SyncBuffer::from_bytes(bytes);
        assert!(matches!(
            client.apply_snapshot(&mut buf),
            Err(ParallaxError::TrailingSnapshotBytes { remaining: 3 })
        ));
    }

    proptest! {
        #[test]
        fn prop_snapshot_roundtrip(
            position in proptest::array::uniform3(any::<f64>()),
            rotation in proptest::array::uniform4(any::<f64>()),
            scale in any::<f64>(),
            seconds in any::<f64>(),
            delta in any::<f64>(),
            paused in any::<bool>(),
        ) {
            let mut host = SyncRegistry::new();
            let camera = host.register(Syncable::Camera(CameraState {
                position,
                rotation,
                scale,
                anchor: "anchor".into(),
            }));
            let time = host.register(Syncable::Time(TimeState {
                seconds,
                delta_seconds: delta,
                paused,
            }));
            let snapshot = host.encode_snapshot();

            let mut client = SyncRegistry::new();
            let c_camera = client.register(Syncable::Camera(CameraState::default()));
            let c_time = client.register(Syncable::Time(TimeState::default()));

            let mut buf = SyncBuffer::from_bytes(snapshot.into_bytes());
            client.apply_snapshot(&mut buf).unwrap();

            let sent = host.get(camera).unwrap().as_camera().unwrap();
            let got = client.get(c_camera).unwrap().as_camera().unwrap();
            for i in 0..3 {
                prop_assert_eq!(got.position[i].to_bits(), sent.position[i].to_bits());
            }
            for i in 0..4 {
                prop_assert_eq!(got.rotation[i].to_bits(), sent.rotation[i].to_bits());
            }
            prop_assert_eq!(got.scale.to_bits(), sent.scale.to_bits());

            let sent_time = host.get(time).unwrap().as_time().unwrap();
            let got_time = client.get(c_time).unwrap().as_time().unwrap();
            prop_assert_eq!(got_time.seconds.to_bits(), sent_time.seconds.to_bits());
            prop_assert_eq!(got_time.delta_seconds.to_bits(), sent_time.delta_seconds.to_bits());
            prop_assert_eq!(got_time.paused, sent_time.paused);
        }
    }
}
