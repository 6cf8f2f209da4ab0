//! Windows capture device enumeration via the MMDevice API.
//!
//! Wraps `IMMDeviceEnumerator` to list microphone endpoints with friendly
//! names and transport types, and to open an endpoint by ID.

use windows::core::PCWSTR;
use windows::Win32::Devices::FunctionDiscovery::*;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::StructuredStorage::PropVariantClear;
use windows::Win32::System::Com::*;
use windows::Win32::System::Variant::*;
use windows::Win32::Foundation::PROPERTYKEY;

use audio_rec_core::{AudioSource, AudioTransportType};

use crate::error::{WasapiError, WasapiResultExt};

/// Capture device enumerator using the Windows MMDevice API.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    /// Create a new device enumerator.
    ///
    /// Requires COM to be initialized on the calling thread.
    pub fn new() -> Result<Self, WasapiError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL).call("CoCreateInstance")?;
            Ok(Self { enumerator })
        }
    }

    /// Open the endpoint with `device_id`, or the default microphone.
    pub fn capture_device(&self, device_id: Option<&str>) -> Result<IMMDevice, WasapiError> {
        unsafe {
            let device = match device_id {
                Some(id) => {
                    let wide_id: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
                    self.enumerator.GetDevice(PCWSTR(wide_id.as_ptr()))
                }
                None => self.enumerator.GetDefaultAudioEndpoint(eCapture, eConsole),
            };
            device.map_err(|_| WasapiError::NoEndpoint)
        }
    }

    /// List active capture (microphone) devices.
    pub fn list_capture_devices(&self) -> Result<Vec<AudioSource>, WasapiError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(eCapture, DEVICE_STATE_ACTIVE)
                .call("EnumAudioEndpoints")?;
            let count = collection.GetCount().call("GetCount")?;

            let default_id = self
                .enumerator
                .GetDefaultAudioEndpoint(eCapture, eConsole)
                .ok()
                .and_then(|d| device_id(&d));

            let mut devices = Vec::new();
            for i in 0..count {
                let Ok(device) = collection.Item(i) else {
                    continue;
                };
                let Some(id) = device_id(&device) else {
                    continue;
                };
                devices.push(describe(&device, id, default_id.as_deref()));
            }
            Ok(devices)
        }
    }

    /// Describe the device `capture_device` would open.
    pub fn source_for(&self, device_id_hint: Option<&str>) -> Result<AudioSource, WasapiError> {
        let device = self.capture_device(device_id_hint)?;
        let default_id = unsafe {
            self.enumerator
                .GetDefaultAudioEndpoint(eCapture, eConsole)
                .ok()
                .and_then(|d| device_id(&d))
        };
        let id = device_id(&device).unwrap_or_else(|| "default-mic".into());
        Ok(describe(&device, id, default_id.as_deref()))
    }
}

fn device_id(device: &IMMDevice) -> Option<String> {
    unsafe { device.GetId().ok().and_then(|id| id.to_string().ok()) }
}

fn describe(device: &IMMDevice, id: String, default_id: Option<&str>) -> AudioSource {
    let name = read_string_property(device, &PKEY_Device_FriendlyName)
        .unwrap_or_else(|| "Microphone".into());
    AudioSource {
        is_default: default_id == Some(id.as_str()),
        id,
        name,
        transport_type: Some(detect_transport_type(device)),
    }
}

/// Read a string property such as `PKEY_Device_FriendlyName`.
fn read_string_property(device: &IMMDevice, key: &PROPERTYKEY) -> Option<String> {
    unsafe {
        let store = device.OpenPropertyStore(STGM_READ).ok()?;
        let mut prop = std::mem::zeroed::<PROPVARIANT>();
        store.GetValue(key, &mut prop).ok()?;

        let value = if prop.Anonymous.Anonymous.vt == VT_LPWSTR {
            let pwsz = prop.Anonymous.Anonymous.Anonymous.pwszVal;
            if pwsz.is_null() {
                None
            } else {
                let len = (0..).take_while(|&i| *pwsz.offset(i) != 0).count();
                Some(String::from_utf16_lossy(std::slice::from_raw_parts(pwsz, len)))
            }
        } else {
            None
        };

        PropVariantClear(&mut prop).ok();
        value
    }
}

fn detect_transport_type(device: &IMMDevice) -> AudioTransportType {
    match read_string_property(device, &PKEY_Device_EnumeratorName) {
        Some(name) => transport_from_enumerator_name(&name),
        None => AudioTransportType::Unknown,
    }
}

fn transport_from_enumerator_name(name: &str) -> AudioTransportType {
    if name.contains("BTHLEENUM") {
        AudioTransportType::BluetoothLE
    } else if name.contains("BTHENUM") {
        AudioTransportType::Bluetooth
    } else if name.contains("USB") {
        AudioTransportType::Usb
    } else if name.contains("SWD") || name.contains("ROOT") {
        AudioTransportType::Virtual
    } else {
        AudioTransportType::BuiltIn
    }
}
