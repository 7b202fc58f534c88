//! Live MIDI input
//!
//! Connects to a MIDI input device via midir and forwards note-on events.
//! A note-on with velocity 0 is a note-off and is never forwarded.

use crate::error::{Error, Result};
use midir::{MidiInput, MidiInputConnection};

/// A note to play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    /// MIDI pitch (0-127)
    pub pitch: u8,
    /// MIDI velocity (1-127)
    pub velocity: u8,
}

/// MIDI message types relevant to playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note on event (channel 0-15, note 0-127, velocity 1-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Note off event (channel 0-15, note 0-127)
    NoteOff { channel: u8, note: u8 },
}

impl MidiMessage {
    /// Parse raw MIDI bytes into a MidiMessage.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let channel = status & 0x0F;

        match (status & 0xF0, data) {
            (0x90, [note, velocity, ..]) => {
                if *velocity == 0 {
                    // Note on with velocity 0 is treated as note off
                    Some(MidiMessage::NoteOff { channel, note: *note })
                } else {
                    Some(MidiMessage::NoteOn {
                        channel,
                        note: *note,
                        velocity: *velocity,
                    })
                }
            }
            (0x80, [note, _, ..]) => Some(MidiMessage::NoteOff { channel, note: *note }),
            _ => None,
        }
    }

    /// The note to play, for note-on messages
    pub fn note_event(&self) -> Option<NoteEvent> {
        match *self {
            MidiMessage::NoteOn { note, velocity, .. } => Some(NoteEvent {
                pitch: note & 0x7F,
                velocity: velocity & 0x7F,
            }),
            MidiMessage::NoteOff { .. } => None,
        }
    }
}

/// Information about a MIDI input device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiDeviceInfo {
    /// Device name (as reported by the system)
    pub name: String,
    /// Port index (for opening)
    pub port_index: usize,
}

/// List available MIDI input devices.
pub fn list_devices() -> Result<Vec<MidiDeviceInfo>> {
    let midi_in = MidiInput::new("shawzin-keys-probe")
        .map_err(|e| Error::Midi(format!("Failed to create MIDI input: {}", e)))?;

    let devices = midi_in
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| MidiDeviceInfo {
            name: midi_in
                .port_name(port)
                .unwrap_or_else(|_| format!("Unknown Device {}", index)),
            port_index: index,
        })
        .collect();

    Ok(devices)
}

/// Find a device by name (partial match, case-insensitive)
pub fn find_device<'a>(devices: &'a [MidiDeviceInfo], name: &str) -> Option<&'a MidiDeviceInfo> {
    let name_lower = name.to_lowercase();
    devices
        .iter()
        .find(|d| d.name.to_lowercase().contains(&name_lower))
}

/// An open MIDI input connection; notes stop arriving when dropped
pub struct LiveInput {
    device: MidiDeviceInfo,
    _connection: MidiInputConnection<()>,
}

impl LiveInput {
    /// Open a MIDI input device by name and call `on_note` for every note-on
    pub fn open<F>(name: &str, on_note: F) -> Result<Self>
    where
        F: FnMut(NoteEvent) + Send + 'static,
    {
        let devices = list_devices()?;
        let device = find_device(&devices, name)
            .cloned()
            .ok_or_else(|| Error::Midi(format!("No MIDI device found matching '{}'", name)))?;
        Self::open_device(device, on_note)
    }

    /// Open a MIDI input device by port info
    pub fn open_device<F>(device: MidiDeviceInfo, mut on_note: F) -> Result<Self>
    where
        F: FnMut(NoteEvent) + Send + 'static,
    {
        let midi_in = MidiInput::new("shawzin-keys")
            .map_err(|e| Error::Midi(format!("Failed to create MIDI input: {}", e)))?;

        let ports = midi_in.ports();
        let port = ports
            .get(device.port_index)
            .ok_or_else(|| Error::Midi(format!("Invalid MIDI port index: {}", device.port_index)))?;

        let connection = midi_in
            .connect(
                port,
                "shawzin-keys-input",
                move |timestamp, bytes, _| {
                    log::debug!("[MIDI RAW] timestamp={} bytes={:?}", timestamp, bytes);
                    if let Some(event) = MidiMessage::from_bytes(bytes).and_then(|m| m.note_event()) {
                        on_note(event);
                    }
                },
                (),
            )
            .map_err(|e| Error::Midi(format!("Failed to connect to MIDI device: {}", e)))?;

        log::info!("Connected to MIDI device: {} (port {})", device.name, device.port_index);

        Ok(Self {
            device,
            _connection: connection,
        })
    }

    /// The connected device
    pub fn device(&self) -> &MidiDeviceInfo {
        &self.device
    }
}
